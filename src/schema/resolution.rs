//! Named type registry and the shareable [`Schema`] handle.
//!
//! Named types (records, enums, fixed) are referenced elsewhere in a schema
//! through `AvroSchema::Named` links. Links are never expanded in place; they
//! are looked up through a [`SchemaResolutionContext`] whenever the encoder,
//! decoder or projector reaches one, so recursive types stay finite.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::{json_to_avro_value, AvroSchema, SchemaParser};

/// Registry of the named types defined by one schema document, keyed by
/// fullname.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    by_fullname: HashMap<String, AvroSchema>,
}

impl SchemaResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_named_types(by_fullname: HashMap<String, AvroSchema>) -> Self {
        Self { by_fullname }
    }

    /// Add (or replace) the definition for `fullname`.
    pub fn register(&mut self, fullname: String, definition: AvroSchema) {
        self.by_fullname.insert(fullname, definition);
    }

    pub fn get(&self, fullname: &str) -> Option<&AvroSchema> {
        self.by_fullname.get(fullname)
    }

    pub fn contains(&self, fullname: &str) -> bool {
        self.by_fullname.contains_key(fullname)
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.by_fullname.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fullname.is_empty()
    }

    /// Collect every record, enum and fixed definition nested in `root`.
    ///
    /// Links are not followed; a tree built by hand must contain each
    /// definition inline at least once.
    pub fn build_from_schema(root: &AvroSchema) -> Self {
        let mut context = Self::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            if node.is_named() {
                if let Some(fullname) = node.fullname() {
                    context.register(fullname, node.clone());
                }
            }
            match node {
                AvroSchema::Record(record) => {
                    pending.extend(record.fields.iter().map(|field| &field.schema));
                }
                AvroSchema::Array(inner) | AvroSchema::Map(inner) => pending.push(inner),
                AvroSchema::Union(branches) => pending.extend(branches.iter()),
                _ => {}
            }
        }
        context
    }

    /// Follow `Named` links until a concrete schema is reached.
    ///
    /// Returns `None` when a link does not resolve.
    pub fn deref<'a>(&'a self, schema: &'a AvroSchema) -> Option<&'a AvroSchema> {
        let mut current = schema;
        // a hand-built registry may map a name to another link
        for _ in 0..=self.by_fullname.len() {
            match current {
                AvroSchema::Named(name) => current = self.by_fullname.get(name)?,
                other => return Some(other),
            }
        }
        None
    }

    /// Check that every `Named` link reachable from `schema` resolves.
    pub fn verify_links(&self, schema: &AvroSchema) -> Result<(), SchemaError> {
        match schema {
            AvroSchema::Named(name) => match self.deref(schema) {
                Some(_) => Ok(()),
                None => Err(SchemaError::InvalidSchema(format!(
                    "Unresolved named type reference: '{}'",
                    name
                ))),
            },
            AvroSchema::Record(record) => record
                .fields
                .iter()
                .try_for_each(|f| self.verify_links(&f.schema)),
            AvroSchema::Array(inner) | AvroSchema::Map(inner) => self.verify_links(inner),
            AvroSchema::Union(variants) => variants.iter().try_for_each(|v| self.verify_links(v)),
            _ => Ok(()),
        }
    }

    /// Check that every field default under `schema` is a valid value of
    /// the field's type. Links must already be verified.
    pub fn verify_defaults(&self, schema: &AvroSchema) -> Result<(), SchemaError> {
        match schema {
            AvroSchema::Record(record) => record.fields.iter().try_for_each(|field| {
                if let Some(default) = &field.default {
                    json_to_avro_value(default, &field.schema, self).map_err(|e| {
                        SchemaError::InvalidSchema(format!(
                            "Default of field '{}.{}' does not match its type: {}",
                            record.fullname(),
                            field.name,
                            e
                        ))
                    })?;
                }
                self.verify_defaults(&field.schema)
            }),
            AvroSchema::Array(inner) | AvroSchema::Map(inner) => self.verify_defaults(inner),
            AvroSchema::Union(variants) => variants.iter().try_for_each(|v| self.verify_defaults(v)),
            _ => Ok(()),
        }
    }
}

/// A parsed, validated schema document.
///
/// Bundles the root schema with the registry of the named types it defines.
/// Cloning is cheap and the handle can be shared across threads; readers,
/// writers and projections all hold one.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    root: AvroSchema,
    context: SchemaResolutionContext,
}

impl Schema {
    /// Parse schema JSON in permissive mode.
    ///
    /// # Example
    /// ```
    /// use avro_marshal::Schema;
    ///
    /// let schema = Schema::parse(r#"{"type": "array", "items": "long"}"#).unwrap();
    /// assert_eq!(schema.to_json(), r#"{"items":"long","type":"array"}"#);
    /// ```
    pub fn parse(json: &str) -> Result<Self, SchemaError> {
        Self::parse_with_options(json, false)
    }

    /// Parse schema JSON, rejecting invalid names and malformed unions.
    pub fn parse_strict(json: &str) -> Result<Self, SchemaError> {
        Self::parse_with_options(json, true)
    }

    /// Parse schema JSON with the given strictness.
    pub fn parse_with_options(json: &str, strict: bool) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;
        Self::from_json_value(&value, strict)
    }

    /// Build a schema from an already-parsed JSON document.
    pub fn from_json_value(value: &Value, strict: bool) -> Result<Self, SchemaError> {
        let mut parser = SchemaParser::new().with_strict(strict);
        let root = parser.parse(value)?;
        Self::with_context(root, parser.context())
    }

    /// Wrap a programmatically built schema tree.
    ///
    /// Named types are collected from the definitions inside the tree.
    pub fn new(root: AvroSchema) -> Result<Self, SchemaError> {
        let context = SchemaResolutionContext::build_from_schema(&root);
        Self::with_context(root, context)
    }

    fn with_context(root: AvroSchema, context: SchemaResolutionContext) -> Result<Self, SchemaError> {
        context.verify_links(&root)?;
        context.verify_defaults(&root)?;
        Ok(Self {
            inner: Arc::new(SchemaInner { root, context }),
        })
    }

    /// The root schema node.
    pub fn root(&self) -> &AvroSchema {
        &self.inner.root
    }

    /// The named type registry for this document.
    pub fn context(&self) -> &SchemaResolutionContext {
        &self.inner.context
    }

    /// Follow links from `schema`; every link in a `Schema` is known to resolve.
    pub fn resolve<'a>(&'a self, schema: &'a AvroSchema) -> &'a AvroSchema {
        self.inner.context.deref(schema).unwrap_or(schema)
    }

    /// Serialize the root schema back to JSON text.
    pub fn to_json(&self) -> String {
        self.inner.root.to_json()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schema").field(&self.inner.root).finish()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.root == other.inner.root
    }
}

impl FromStr for Schema {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumSchema, FieldSchema, FixedSchema, RecordSchema};

    #[test]
    fn test_build_context_from_nested_records() {
        let address = RecordSchema::new(
            "Address",
            vec![
                FieldSchema::new("street", AvroSchema::String),
                FieldSchema::new("city", AvroSchema::String),
            ],
        )
        .with_namespace("com.example");

        let person = RecordSchema::new(
            "Person",
            vec![
                FieldSchema::new("name", AvroSchema::String),
                FieldSchema::new("address", AvroSchema::Record(address)),
            ],
        )
        .with_namespace("com.example");

        let context = SchemaResolutionContext::build_from_schema(&AvroSchema::Record(person));

        assert!(context.contains("com.example.Person"));
        assert!(context.contains("com.example.Address"));
    }

    #[test]
    fn test_build_context_with_enum_and_fixed() {
        let color_enum = EnumSchema::new(
            "Color",
            vec!["RED".to_string(), "GREEN".to_string(), "BLUE".to_string()],
        );
        let hash_fixed = FixedSchema::new("Hash", 32);

        let record = RecordSchema::new(
            "Item",
            vec![
                FieldSchema::new("color", AvroSchema::Enum(color_enum)),
                FieldSchema::new(
                    "hash",
                    AvroSchema::Array(Box::new(AvroSchema::Fixed(hash_fixed))),
                ),
            ],
        );

        let context = SchemaResolutionContext::build_from_schema(&AvroSchema::Record(record));

        assert!(context.contains("Item"));
        assert!(context.contains("Color"));
        assert!(context.contains("Hash"));
    }

    #[test]
    fn test_deref_follows_link() {
        let user = RecordSchema::new("User", vec![FieldSchema::new("name", AvroSchema::String)]);
        let mut context = SchemaResolutionContext::new();
        context.register("User".to_string(), AvroSchema::Record(user));

        let link = AvroSchema::Named("User".to_string());
        assert!(matches!(context.deref(&link), Some(AvroSchema::Record(r)) if r.name == "User"));
        assert_eq!(context.deref(&AvroSchema::Int), Some(&AvroSchema::Int));
        assert!(context.deref(&AvroSchema::Named("Nope".into())).is_none());
    }

    #[test]
    fn test_recursive_schema_keeps_link() {
        let schema = Schema::parse(
            r#"{"type": "record", "name": "LinkedList", "fields": [
                {"name": "value", "type": "int"},
                {"name": "next", "type": ["null", "LinkedList"]}
            ]}"#,
        )
        .unwrap();

        match schema.root() {
            AvroSchema::Record(r) => {
                let link = &r.fields[1].schema;
                assert_eq!(
                    link,
                    &AvroSchema::Union(vec![
                        AvroSchema::Null,
                        AvroSchema::Named("LinkedList".to_string())
                    ])
                );
                if let AvroSchema::Union(branches) = link {
                    assert!(matches!(schema.resolve(&branches[1]), AvroSchema::Record(_)));
                }
            }
            other => panic!("Expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_new_rejects_dangling_link() {
        let root = AvroSchema::Array(Box::new(AvroSchema::Named("Ghost".into())));
        assert!(Schema::new(root).is_err());
    }

    #[test]
    fn test_schema_new_rejects_mistyped_default() {
        let bad = RecordSchema::new(
            "R",
            vec![FieldSchema::new("flag", AvroSchema::Boolean).with_default(serde_json::json!(1))],
        );
        assert!(matches!(
            Schema::new(AvroSchema::Record(bad)),
            Err(SchemaError::InvalidSchema(_))
        ));

        let good = RecordSchema::new(
            "R",
            vec![FieldSchema::new("flag", AvroSchema::Boolean).with_default(serde_json::json!(true))],
        );
        assert!(Schema::new(AvroSchema::Record(good)).is_ok());
    }

    #[test]
    fn test_schema_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
    }
}
