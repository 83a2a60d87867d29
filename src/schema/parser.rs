//! Schema JSON parsing.
//!
//! Named types are registered as they are defined. A name used before its
//! definition completes (including a record naming itself) becomes an
//! [`AvroSchema::Named`] link, and links are checked once the whole document
//! has been read.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::{
    AvroSchema, EnumSchema, FieldSchema, FixedSchema, RecordSchema, SchemaResolutionContext,
};

/// Parse schema JSON in permissive mode.
///
/// ```
/// use avro_marshal::schema::{parse_schema, AvroSchema};
///
/// assert_eq!(parse_schema(r#""string""#).unwrap(), AvroSchema::String);
/// ```
pub fn parse_schema(json: &str) -> Result<AvroSchema, SchemaError> {
    parse_schema_with_options(json, false)
}

/// Parse schema JSON, optionally enforcing the naming and union rules.
///
/// With `strict` set, these are errors; otherwise they are logged with
/// `warn!` and parsing continues:
/// - duplicate branch types in a union
/// - a union directly inside a union
/// - names outside `[A-Za-z_][A-Za-z0-9_]*`
///
/// Redefining a named type and linking to an undefined name always fail.
///
/// ```
/// use avro_marshal::schema::parse_schema_with_options;
///
/// assert!(parse_schema_with_options(r#"["int", "int"]"#, false).is_ok());
/// assert!(parse_schema_with_options(r#"["int", "int"]"#, true).is_err());
/// ```
pub fn parse_schema_with_options(json: &str, strict: bool) -> Result<AvroSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;

    let mut parser = SchemaParser::new().with_strict(strict);
    let schema = parser.parse(&value)?;
    let context = parser.context();
    context.verify_links(&schema)?;
    context.verify_defaults(&schema)?;
    Ok(schema)
}

/// Naming attributes shared by records, enums and fixed types.
struct NamedHeader {
    name: String,
    namespace: Option<String>,
    fullname: String,
    aliases: Vec<String>,
}

/// Parser state: the named types defined so far and the enclosing namespace.
#[derive(Debug, Default)]
pub struct SchemaParser {
    named_types: HashMap<String, AvroSchema>,
    /// Namespace unqualified names resolve against
    current_namespace: Option<String>,
    strict_schema: bool,
}

impl SchemaParser {
    /// A permissive parser.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Parse one schema. Types it defines stay registered for later calls.
    pub fn parse(&mut self, value: &Value) -> Result<AvroSchema, SchemaError> {
        match value {
            Value::String(s) => self.parse_string_schema(s),
            Value::Object(obj) => self.parse_object_schema(obj),
            Value::Array(arr) => self.parse_union_schema(arr),
            _ => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                value
            ))),
        }
    }

    /// Snapshot of the named types registered so far, as a resolution context.
    pub fn context(&self) -> SchemaResolutionContext {
        SchemaResolutionContext::from_named_types(self.named_types.clone())
    }

    /// Parse a primitive type or named type reference from a string.
    fn parse_string_schema(&self, s: &str) -> Result<AvroSchema, SchemaError> {
        Ok(match s {
            "null" => AvroSchema::Null,
            "boolean" => AvroSchema::Boolean,
            "int" => AvroSchema::Int,
            "long" => AvroSchema::Long,
            "float" => AvroSchema::Float,
            "double" => AvroSchema::Double,
            "bytes" => AvroSchema::Bytes,
            "string" => AvroSchema::String,
            // Possibly a forward or recursive reference; links are verified after parsing.
            name => AvroSchema::Named(self.resolve_name(name)),
        })
    }

    /// Parse a complex type from a JSON object.
    ///
    /// `logicalType` annotations are ignored and the base type is returned.
    fn parse_object_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            // {"type": {...}} or {"type": [...]} wraps a full schema
            other => return self.parse(other),
        };

        match type_str {
            "record" | "error" => self.parse_record_schema(obj),
            "enum" => self.parse_enum_schema(obj),
            "array" => self.parse_array_schema(obj),
            "map" => self.parse_map_schema(obj),
            "fixed" => self.parse_fixed_schema(obj),
            // Primitives and named references
            other => self.parse_string_schema(other),
        }
    }

    /// Parse a union schema from a JSON array.
    fn parse_union_schema(&mut self, arr: &[Value]) -> Result<AvroSchema, SchemaError> {
        if arr.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Union schema cannot be empty".to_string(),
            ));
        }

        let variants = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;

        self.validate_union(&variants)?;

        Ok(AvroSchema::Union(variants))
    }

    /// Read the naming attributes of a record, enum or fixed and check the
    /// name is not already taken.
    fn parse_named_header(
        &self,
        obj: &Map<String, Value>,
        kind: &str,
    ) -> Result<NamedHeader, SchemaError> {
        let raw_name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema(format!("{} missing 'name' field", kind)))?;

        // A dotted name carries its own namespace and overrides the attribute.
        let (name, namespace) = match raw_name.rsplit_once('.') {
            Some((ns, short)) => (short.to_string(), Some(ns.to_string())),
            None => {
                let explicit = obj.get("namespace").and_then(|v| v.as_str());
                let namespace = match explicit {
                    Some(ns) => Some(ns.to_string()),
                    None => self.current_namespace.clone(),
                };
                (raw_name.to_string(), namespace.filter(|ns| !ns.is_empty()))
            }
        };

        self.validate_name(&name, kind)?;

        let fullname = match &namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name.clone(),
        };

        if self.named_types.contains_key(&fullname) {
            return Err(SchemaError::InvalidSchema(format!(
                "Duplicate definition of named type '{}'",
                fullname
            )));
        }

        Ok(NamedHeader {
            name,
            namespace,
            fullname,
            aliases: string_list_attr(obj, "aliases"),
        })
    }

    /// Parse a record schema.
    fn parse_record_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let header = self.parse_named_header(obj, "Record")?;

        let fields_value = obj
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                SchemaError::InvalidSchema(format!(
                    "Record '{}' missing 'fields' array",
                    header.fullname
                ))
            })?;

        // Register before parsing fields so recursive references resolve
        self.named_types.insert(
            header.fullname.clone(),
            AvroSchema::Named(header.fullname.clone()),
        );

        let prev_namespace =
            std::mem::replace(&mut self.current_namespace, header.namespace.clone());
        let fields = fields_value
            .iter()
            .map(|f| self.parse_field_schema(f))
            .collect::<Result<Vec<_>, _>>();
        self.current_namespace = prev_namespace;
        let fields = fields?;

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Record '{}' has duplicate field '{}'",
                    header.fullname, field.name
                )));
            }
        }

        let schema = AvroSchema::Record(RecordSchema {
            name: header.name,
            namespace: header.namespace,
            fields,
            aliases: header.aliases,
        });

        // Replace the placeholder with the actual schema
        self.named_types.insert(header.fullname, schema.clone());

        Ok(schema)
    }

    /// Parse a field schema within a record.
    fn parse_field_schema(&mut self, value: &Value) -> Result<FieldSchema, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();

        self.validate_name(&name, "Field")?;

        let type_value = obj.get("type").ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Field '{}' missing 'type'", name))
        })?;

        let schema = self.parse(type_value)?;

        Ok(FieldSchema {
            name,
            schema,
            default: obj.get("default").cloned(),
            aliases: string_list_attr(obj, "aliases"),
        })
    }

    /// Parse an enum schema.
    fn parse_enum_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let header = self.parse_named_header(obj, "Enum")?;

        let symbols = obj
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SchemaError::InvalidSchema("Enum missing 'symbols' array".to_string()))?
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::InvalidSchema(format!("Enum symbol must be a string: {}", v))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if symbols.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Enum must have at least one symbol".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
            if !seen.insert(symbol.as_str()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Enum '{}' has duplicate symbol '{}'",
                    header.fullname, symbol
                )));
            }
        }

        let default = string_attr(obj, "default");
        if let Some(default) = &default {
            if !symbols.contains(default) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Enum '{}' default '{}' is not one of its symbols",
                    header.fullname, default
                )));
            }
        }

        let schema = AvroSchema::Enum(EnumSchema {
            name: header.name,
            namespace: header.namespace,
            symbols,
            aliases: header.aliases,
            default,
        });
        self.named_types.insert(header.fullname, schema.clone());

        Ok(schema)
    }

    /// Parse an array schema.
    fn parse_array_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let items = obj
            .get("items")
            .ok_or_else(|| SchemaError::InvalidSchema("Array missing 'items' field".to_string()))?;

        Ok(AvroSchema::Array(Box::new(self.parse(items)?)))
    }

    /// Parse a map schema.
    fn parse_map_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let values = obj
            .get("values")
            .ok_or_else(|| SchemaError::InvalidSchema("Map missing 'values' field".to_string()))?;

        Ok(AvroSchema::Map(Box::new(self.parse(values)?)))
    }

    /// Parse a fixed schema.
    fn parse_fixed_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let header = self.parse_named_header(obj, "Fixed")?;

        let size = obj
            .get("size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SchemaError::InvalidSchema("Fixed missing 'size' field".to_string()))?;
        let size = usize::try_from(size)
            .map_err(|_| SchemaError::InvalidSchema(format!("Fixed size {} is too large", size)))?;

        let schema = AvroSchema::Fixed(FixedSchema {
            name: header.name,
            namespace: header.namespace,
            size,
            aliases: header.aliases,
        });
        self.named_types.insert(header.fullname, schema.clone());

        Ok(schema)
    }

    /// Resolve a type name to its fully qualified form.
    ///
    /// Unqualified names are looked up in the enclosing namespace first, then
    /// in the null namespace.
    fn resolve_name(&self, name: &str) -> String {
        if name.contains('.') {
            return name.to_string();
        }
        match &self.current_namespace {
            Some(ns) => {
                let qualified = format!("{}.{}", ns, name);
                if !self.named_types.contains_key(&qualified) && self.named_types.contains_key(name)
                {
                    name.to_string()
                } else {
                    qualified
                }
            }
            None => name.to_string(),
        }
    }

    /// Report a rule violation: an error in strict mode, a warning otherwise.
    fn violation(&self, msg: String) -> Result<(), SchemaError> {
        if self.strict_schema {
            Err(SchemaError::InvalidSchema(msg))
        } else {
            warn!("{}", msg);
            Ok(())
        }
    }

    /// Names are `[A-Za-z_][A-Za-z0-9_]*`.
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let mut chars = name.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return self.violation(format!("{} name cannot be empty", context)),
        };

        if !first.is_ascii_alphabetic() && first != '_' {
            return self.violation(format!(
                "{} name '{}' must start with a letter or underscore",
                context, name
            ));
        }

        if let Some(bad) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
            return self.violation(format!(
                "{} name '{}' contains invalid character '{}'",
                context, name, bad
            ));
        }

        Ok(())
    }

    /// No nested unions, and no two branches of the same type or name.
    fn validate_union(&self, variants: &[AvroSchema]) -> Result<(), SchemaError> {
        for (i, variant) in variants.iter().enumerate() {
            if matches!(variant, AvroSchema::Union(_)) {
                self.violation(format!(
                    "Union contains nested union at position {} (unions cannot be nested)",
                    i
                ))?;
            }
        }

        let mut seen_types = HashSet::new();
        for (i, variant) in variants.iter().enumerate() {
            let type_key = union_type_key(variant);
            if !seen_types.insert(type_key.clone()) {
                self.violation(format!(
                    "Union contains duplicate type '{}' at position {}",
                    type_key, i
                ))?;
            }
        }

        Ok(())
    }
}

/// Key used for duplicate detection among union branches.
fn union_type_key(schema: &AvroSchema) -> String {
    match schema.fullname() {
        Some(fullname) => fullname,
        None => schema.type_name().to_string(),
    }
}

fn string_attr(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn string_list_attr(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
