//! Schema node tree.
//!
//! Nodes are plain immutable data. Named types (records, enums, fixed) are
//! defined once and referenced elsewhere through [`AvroSchema::Named`]
//! links, which are looked up in a
//! [`SchemaResolutionContext`](super::SchemaResolutionContext). Logical type
//! annotations are not modelled; values use the underlying base type.

use serde_json::{json, Map, Value};

/// One node of an Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Boolean,
    /// 32-bit signed integer, zigzag varint on the wire.
    Int,
    /// 64-bit signed integer, zigzag varint on the wire.
    Long,
    /// 4-byte little-endian IEEE 754.
    Float,
    /// 8-byte little-endian IEEE 754.
    Double,
    Bytes,
    String,

    /// Fields are encoded in declaration order with no framing.
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(Box<AvroSchema>),
    /// String keys, values of one schema.
    Map(Box<AvroSchema>),
    /// Branch position is the on-wire branch index.
    Union(Vec<AvroSchema>),
    Fixed(FixedSchema),

    /// Link to a named type by fullname, which is how recursive types terminate.
    Named(String),
}

/// A record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    /// Fields in encoding order.
    pub fields: Vec<FieldSchema>,
    pub aliases: Vec<String>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            fields,
            aliases: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// `namespace.name`, or just `name` without a namespace.
    pub fn fullname(&self) -> String {
        qualify(&self.name, self.namespace.as_deref())
    }

    /// Field by its declared name. Aliases are not consulted.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn to_json_value(&self) -> Value {
        let mut obj = named_json("record", &self.name, self.namespace.as_deref(), &self.aliases);
        obj.insert(
            "fields".to_string(),
            self.fields.iter().map(FieldSchema::to_json_value).collect(),
        );
        Value::Object(obj)
    }
}

/// A record field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub schema: AvroSchema,
    /// Default as written in the schema JSON. Converted against `schema`
    /// when a reader or writer needs it.
    pub default: Option<Value>,
    pub aliases: Vec<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            aliases: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Whether `name` is this field's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(self.name));
        obj.insert("type".to_string(), self.schema.to_json_value());
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if !self.aliases.is_empty() {
            obj.insert("aliases".to_string(), json!(self.aliases));
        }
        Value::Object(obj)
    }
}

/// An enumeration. A symbol's position is its on-wire index.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub symbols: Vec<String>,
    pub aliases: Vec<String>,
    /// Symbol a reader substitutes for writer symbols it does not know.
    pub default: Option<String>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            symbols,
            aliases: Vec::new(),
            default: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_default(mut self, symbol: impl Into<String>) -> Self {
        self.default = Some(symbol.into());
        self
    }

    pub fn fullname(&self) -> String {
        qualify(&self.name, self.namespace.as_deref())
    }

    /// On-wire index of `symbol`.
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    fn to_json_value(&self) -> Value {
        let mut obj = named_json("enum", &self.name, self.namespace.as_deref(), &self.aliases);
        obj.insert("symbols".to_string(), json!(self.symbols));
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), json!(default));
        }
        Value::Object(obj)
    }
}

/// A fixed-length byte string.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub size: usize,
    pub aliases: Vec<String>,
}

impl FixedSchema {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            size,
            aliases: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn fullname(&self) -> String {
        qualify(&self.name, self.namespace.as_deref())
    }

    fn to_json_value(&self) -> Value {
        let mut obj = named_json("fixed", &self.name, self.namespace.as_deref(), &self.aliases);
        obj.insert("size".to_string(), json!(self.size));
        Value::Object(obj)
    }
}

fn qualify(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

/// Attributes every named type serializes.
fn named_json(kind: &str, name: &str, namespace: Option<&str>, aliases: &[String]) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(kind));
    obj.insert("name".to_string(), json!(name));
    if let Some(ns) = namespace {
        obj.insert("namespace".to_string(), json!(ns));
    }
    if !aliases.is_empty() {
        obj.insert("aliases".to_string(), json!(aliases));
    }
    obj
}

impl AvroSchema {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            AvroSchema::Null
                | AvroSchema::Boolean
                | AvroSchema::Int
                | AvroSchema::Long
                | AvroSchema::Float
                | AvroSchema::Double
                | AvroSchema::Bytes
                | AvroSchema::String
        )
    }

    /// Records, enums and fixed types. Links are not counted.
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            AvroSchema::Record(_) | AvroSchema::Enum(_) | AvroSchema::Fixed(_)
        )
    }

    /// Short name of a named type or link.
    pub fn name(&self) -> Option<&str> {
        match self {
            AvroSchema::Record(r) => Some(&r.name),
            AvroSchema::Enum(e) => Some(&e.name),
            AvroSchema::Fixed(f) => Some(&f.name),
            AvroSchema::Named(n) => Some(n),
            _ => None,
        }
    }

    /// Fullname of a named type or link.
    pub fn fullname(&self) -> Option<String> {
        match self {
            AvroSchema::Record(r) => Some(r.fullname()),
            AvroSchema::Enum(e) => Some(e.fullname()),
            AvroSchema::Fixed(f) => Some(f.fullname()),
            AvroSchema::Named(n) => Some(n.clone()),
            _ => None,
        }
    }

    /// Aliases of a named type, empty for everything else.
    pub fn aliases(&self) -> &[String] {
        match self {
            AvroSchema::Record(r) => &r.aliases,
            AvroSchema::Enum(e) => &e.aliases,
            AvroSchema::Fixed(f) => &f.aliases,
            _ => &[],
        }
    }

    /// Lowercase kind name for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AvroSchema::Null => "null",
            AvroSchema::Boolean => "boolean",
            AvroSchema::Int => "int",
            AvroSchema::Long => "long",
            AvroSchema::Float => "float",
            AvroSchema::Double => "double",
            AvroSchema::Bytes => "bytes",
            AvroSchema::String => "string",
            AvroSchema::Record(_) => "record",
            AvroSchema::Enum(_) => "enum",
            AvroSchema::Array(_) => "array",
            AvroSchema::Map(_) => "map",
            AvroSchema::Union(_) => "union",
            AvroSchema::Fixed(_) => "fixed",
            AvroSchema::Named(_) => "named",
        }
    }

    /// Index of the `null` branch of a union.
    pub fn null_branch(&self) -> Option<usize> {
        match self {
            AvroSchema::Union(branches) => branches.iter().position(|b| *b == AvroSchema::Null),
            _ => None,
        }
    }

    /// Whether a null can be encoded against this schema as is.
    pub fn accepts_null(&self) -> bool {
        *self == AvroSchema::Null || self.null_branch().is_some()
    }

    /// Schema JSON that parses back to an equal tree.
    ///
    /// # Example
    /// ```
    /// use avro_marshal::schema::AvroSchema;
    ///
    /// let schema = AvroSchema::Array(Box::new(AvroSchema::String));
    /// assert_eq!(schema.to_json(), r#"{"items":"string","type":"array"}"#);
    /// ```
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Schema JSON as a value, for embedding in larger documents.
    pub fn to_json_value(&self) -> Value {
        match self {
            AvroSchema::Record(r) => r.to_json_value(),
            AvroSchema::Enum(e) => e.to_json_value(),
            AvroSchema::Fixed(f) => f.to_json_value(),
            AvroSchema::Array(items) => json!({"type": "array", "items": items.to_json_value()}),
            AvroSchema::Map(values) => json!({"type": "map", "values": values.to_json_value()}),
            AvroSchema::Union(branches) => branches.iter().map(AvroSchema::to_json_value).collect(),
            AvroSchema::Named(name) => json!(name),
            primitive => json!(primitive.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullname_with_namespace() {
        let record = RecordSchema::new("User", vec![]).with_namespace("com.example");
        assert_eq!(record.fullname(), "com.example.User");

        let empty_ns = EnumSchema::new("Color", vec!["RED".into()]).with_namespace("");
        assert_eq!(empty_ns.fullname(), "Color");
    }

    #[test]
    fn test_null_branch() {
        let union = AvroSchema::Union(vec![AvroSchema::String, AvroSchema::Null]);
        assert_eq!(union.null_branch(), Some(1));
        assert!(union.accepts_null());
        assert!(AvroSchema::Null.accepts_null());
        assert_eq!(AvroSchema::Null.null_branch(), None);
        assert!(!AvroSchema::Union(vec![AvroSchema::String, AvroSchema::Int]).accepts_null());
        assert!(!AvroSchema::Long.accepts_null());
    }

    #[test]
    fn test_field_answers_to_alias() {
        let field = FieldSchema::new("user_name", AvroSchema::String)
            .with_aliases(vec!["name".to_string()]);
        assert!(field.answers_to("user_name"));
        assert!(field.answers_to("name"));
        assert!(!field.answers_to("username"));
    }

    #[test]
    fn test_named_types_to_json() {
        let record = RecordSchema::new(
            "R",
            vec![FieldSchema::new("c", AvroSchema::Long).with_default(json!(0))],
        )
        .with_namespace("ns");
        let value = AvroSchema::Record(record).to_json_value();
        assert_eq!(value["namespace"], json!("ns"));
        assert_eq!(value["fields"][0]["default"], json!(0));
        assert_eq!(value["fields"][0]["type"], json!("long"));

        let fixed = AvroSchema::Fixed(FixedSchema::new("H", 4)).to_json_value();
        assert_eq!(fixed, json!({"type": "fixed", "name": "H", "size": 4}));

        let suit = EnumSchema::new("Suit", vec!["A".into(), "B".into()]).with_default("B");
        assert_eq!(AvroSchema::Enum(suit).to_json_value()["default"], json!("B"));
    }
}
