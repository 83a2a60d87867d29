//! Host-side value model seen by the encoder.
//!
//! The encoder never depends on a concrete object model. It reads values
//! through the [`NativeValue`] trait, which exposes just enough to classify a
//! value, read scalars, walk sequences and mappings, and look up record
//! fields by name.
//!
//! Three implementations ship with the crate:
//! - [`NativeObject`], a small owned dynamic object model
//! - `serde_json::Value`, so JSON documents can be written directly
//! - [`AvroValue`], so decoded values can be written back out unchanged

use serde_json::Value;

use crate::reader::AvroValue;

/// Broad classification of a native value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
    Bytes,
    /// A symbol of a named enumeration.
    Symbol,
    Sequence,
    Mapping,
}

impl NativeKind {
    /// Lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            NativeKind::Null => "null",
            NativeKind::Boolean => "boolean",
            NativeKind::Integer => "integer",
            NativeKind::Float => "float",
            NativeKind::Text => "text",
            NativeKind::Bytes => "bytes",
            NativeKind::Symbol => "symbol",
            NativeKind::Sequence => "sequence",
            NativeKind::Mapping => "mapping",
        }
    }
}

/// A borrowed scalar extracted from a native value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(&'a str),
    Bytes(&'a [u8]),
    Symbol(&'a str),
}

/// Iterator over the items of a native sequence.
pub type SequenceIter<'a> = Box<dyn ExactSizeIterator<Item = &'a dyn NativeValue> + 'a>;

/// Iterator over the entries of a native mapping.
pub type EntryIter<'a> = Box<dyn ExactSizeIterator<Item = (&'a str, &'a dyn NativeValue)> + 'a>;

/// Read-only view of a host value.
///
/// Implementations must be consistent: `kind()` decides which of the other
/// accessors return something. Scalars answer `as_scalar`, sequences answer
/// `iter_sequence`, mappings answer `iter_entries` and `lookup_field`.
pub trait NativeValue {
    /// Classify the value.
    fn kind(&self) -> NativeKind;

    /// The scalar payload, for scalar kinds.
    fn as_scalar(&self) -> Option<Scalar<'_>>;

    /// The items of a sequence.
    fn iter_sequence(&self) -> Option<SequenceIter<'_>> {
        None
    }

    /// The entries of a mapping, in the mapping's own order.
    fn iter_entries(&self) -> Option<EntryIter<'_>> {
        None
    }

    /// A mapping entry by key. `None` for absent keys and non-mappings.
    fn lookup_field(&self, _name: &str) -> Option<&dyn NativeValue> {
        None
    }

    /// Name of the host type, consulted when a union has several named
    /// branches a value could fit.
    fn type_tag(&self) -> Option<&str> {
        None
    }

    /// Union branch the value was originally decoded from, if known.
    fn preferred_branch(&self) -> Option<usize> {
        None
    }
}

// ============================================================================
// NativeObject
// ============================================================================

/// Owned dynamic value, a minimal host object model.
///
/// # Example
/// ```
/// use avro_marshal::NativeObject;
///
/// let person = NativeObject::map([
///     ("name", NativeObject::from("Larry")),
///     ("age", NativeObject::from(21)),
/// ]);
/// assert!(person.get("age").is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum NativeObject {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<NativeObject>),
    /// Ordered key/value pairs. Lookups return the first matching key.
    Map(Vec<(String, NativeObject)>),
    /// A symbol of the enumeration called `name`.
    Enum { name: String, symbol: String },
    /// A value carrying the name of its host type.
    Tagged { tag: String, value: Box<NativeObject> },
}

impl NativeObject {
    /// Build a mapping from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, NativeObject)>,
    {
        NativeObject::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list.
    pub fn list<I: IntoIterator<Item = NativeObject>>(items: I) -> Self {
        NativeObject::List(items.into_iter().collect())
    }

    /// Build an enum symbol.
    pub fn symbol(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        NativeObject::Enum {
            name: name.into(),
            symbol: symbol.into(),
        }
    }

    /// Attach a host type name.
    pub fn tagged(tag: impl Into<String>, value: NativeObject) -> Self {
        NativeObject::Tagged {
            tag: tag.into(),
            value: Box::new(value),
        }
    }

    /// Mapping entry by key.
    pub fn get(&self, key: &str) -> Option<&NativeObject> {
        match self {
            NativeObject::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            NativeObject::Tagged { value, .. } => value.get(key),
            _ => None,
        }
    }
}

impl NativeValue for NativeObject {
    fn kind(&self) -> NativeKind {
        match self {
            NativeObject::Null => NativeKind::Null,
            NativeObject::Bool(_) => NativeKind::Boolean,
            NativeObject::Int(_) => NativeKind::Integer,
            NativeObject::Float(_) => NativeKind::Float,
            NativeObject::Str(_) => NativeKind::Text,
            NativeObject::Bytes(_) => NativeKind::Bytes,
            NativeObject::List(_) => NativeKind::Sequence,
            NativeObject::Map(_) => NativeKind::Mapping,
            NativeObject::Enum { .. } => NativeKind::Symbol,
            NativeObject::Tagged { value, .. } => value.kind(),
        }
    }

    fn as_scalar(&self) -> Option<Scalar<'_>> {
        match self {
            NativeObject::Null => Some(Scalar::Null),
            NativeObject::Bool(b) => Some(Scalar::Boolean(*b)),
            NativeObject::Int(i) => Some(Scalar::Integer(*i)),
            NativeObject::Float(f) => Some(Scalar::Float(*f)),
            NativeObject::Str(s) => Some(Scalar::Text(s)),
            NativeObject::Bytes(b) => Some(Scalar::Bytes(b)),
            NativeObject::Enum { symbol, .. } => Some(Scalar::Symbol(symbol)),
            NativeObject::Tagged { value, .. } => value.as_scalar(),
            NativeObject::List(_) | NativeObject::Map(_) => None,
        }
    }

    fn iter_sequence(&self) -> Option<SequenceIter<'_>> {
        match self {
            NativeObject::List(items) => {
                Some(Box::new(items.iter().map(|v| v as &dyn NativeValue)))
            }
            NativeObject::Tagged { value, .. } => value.iter_sequence(),
            _ => None,
        }
    }

    fn iter_entries(&self) -> Option<EntryIter<'_>> {
        match self {
            NativeObject::Map(entries) => Some(Box::new(
                entries.iter().map(|(k, v)| (k.as_str(), v as &dyn NativeValue)),
            )),
            NativeObject::Tagged { value, .. } => value.iter_entries(),
            _ => None,
        }
    }

    fn lookup_field(&self, name: &str) -> Option<&dyn NativeValue> {
        self.get(name).map(|v| v as &dyn NativeValue)
    }

    fn type_tag(&self) -> Option<&str> {
        match self {
            NativeObject::Enum { name, .. } => Some(name),
            NativeObject::Tagged { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

impl From<bool> for NativeObject {
    fn from(v: bool) -> Self {
        NativeObject::Bool(v)
    }
}

impl From<i32> for NativeObject {
    fn from(v: i32) -> Self {
        NativeObject::Int(v as i64)
    }
}

impl From<i64> for NativeObject {
    fn from(v: i64) -> Self {
        NativeObject::Int(v)
    }
}

impl From<f64> for NativeObject {
    fn from(v: f64) -> Self {
        NativeObject::Float(v)
    }
}

impl From<&str> for NativeObject {
    fn from(v: &str) -> Self {
        NativeObject::Str(v.to_string())
    }
}

impl From<String> for NativeObject {
    fn from(v: String) -> Self {
        NativeObject::Str(v)
    }
}

impl From<Vec<u8>> for NativeObject {
    fn from(v: Vec<u8>) -> Self {
        NativeObject::Bytes(v)
    }
}

impl<T: Into<NativeObject>> From<Option<T>> for NativeObject {
    fn from(v: Option<T>) -> Self {
        v.map_or(NativeObject::Null, Into::into)
    }
}

// ============================================================================
// serde_json::Value
// ============================================================================

/// JSON documents as native values. JSON has no bytes type, so `bytes`,
/// `fixed` and enum fields take strings.
impl NativeValue for Value {
    fn kind(&self) -> NativeKind {
        match self {
            Value::Null => NativeKind::Null,
            Value::Bool(_) => NativeKind::Boolean,
            Value::Number(n) if n.is_i64() => NativeKind::Integer,
            Value::Number(_) => NativeKind::Float,
            Value::String(_) => NativeKind::Text,
            Value::Array(_) => NativeKind::Sequence,
            Value::Object(_) => NativeKind::Mapping,
        }
    }

    fn as_scalar(&self) -> Option<Scalar<'_>> {
        match self {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Integer(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            Value::String(s) => Some(Scalar::Text(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn iter_sequence(&self) -> Option<SequenceIter<'_>> {
        match self {
            Value::Array(items) => Some(Box::new(items.iter().map(|v| v as &dyn NativeValue))),
            _ => None,
        }
    }

    fn iter_entries(&self) -> Option<EntryIter<'_>> {
        match self {
            Value::Object(map) => Some(Box::new(
                map.iter().map(|(k, v)| (k.as_str(), v as &dyn NativeValue)),
            )),
            _ => None,
        }
    }

    fn lookup_field(&self, name: &str) -> Option<&dyn NativeValue> {
        match self {
            Value::Object(map) => map.get(name).map(|v| v as &dyn NativeValue),
            _ => None,
        }
    }
}

// ============================================================================
// AvroValue
// ============================================================================

/// Decoded values, so a read value can be written again. A decoded union
/// reports its branch through `preferred_branch`, which makes re-encoding
/// reproduce the original bytes.
impl NativeValue for AvroValue {
    fn kind(&self) -> NativeKind {
        match self {
            AvroValue::Null => NativeKind::Null,
            AvroValue::Boolean(_) => NativeKind::Boolean,
            AvroValue::Int(_) | AvroValue::Long(_) => NativeKind::Integer,
            AvroValue::Float(_) | AvroValue::Double(_) => NativeKind::Float,
            AvroValue::Bytes(_) | AvroValue::Fixed(_) => NativeKind::Bytes,
            AvroValue::String(_) => NativeKind::Text,
            AvroValue::Enum(..) => NativeKind::Symbol,
            AvroValue::Array(_) => NativeKind::Sequence,
            AvroValue::Map(_) | AvroValue::Record(_) => NativeKind::Mapping,
            AvroValue::Union(_, inner) => inner.kind(),
        }
    }

    fn as_scalar(&self) -> Option<Scalar<'_>> {
        match self {
            AvroValue::Null => Some(Scalar::Null),
            AvroValue::Boolean(b) => Some(Scalar::Boolean(*b)),
            AvroValue::Int(i) => Some(Scalar::Integer(*i as i64)),
            AvroValue::Long(l) => Some(Scalar::Integer(*l)),
            AvroValue::Float(f) => Some(Scalar::Float(*f as f64)),
            AvroValue::Double(d) => Some(Scalar::Float(*d)),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => Some(Scalar::Bytes(b)),
            AvroValue::String(s) => Some(Scalar::Text(s)),
            AvroValue::Enum(_, symbol) => Some(Scalar::Symbol(symbol)),
            AvroValue::Union(_, inner) => inner.as_scalar(),
            AvroValue::Array(_) | AvroValue::Map(_) | AvroValue::Record(_) => None,
        }
    }

    fn iter_sequence(&self) -> Option<SequenceIter<'_>> {
        match self {
            AvroValue::Array(items) => Some(Box::new(items.iter().map(|v| v as &dyn NativeValue))),
            AvroValue::Union(_, inner) => inner.iter_sequence(),
            _ => None,
        }
    }

    fn iter_entries(&self) -> Option<EntryIter<'_>> {
        match self {
            AvroValue::Map(entries) | AvroValue::Record(entries) => Some(Box::new(
                entries.iter().map(|(k, v)| (k.as_str(), v as &dyn NativeValue)),
            )),
            AvroValue::Union(_, inner) => inner.iter_entries(),
            _ => None,
        }
    }

    fn lookup_field(&self, name: &str) -> Option<&dyn NativeValue> {
        match self {
            AvroValue::Map(entries) | AvroValue::Record(entries) => entries
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v as &dyn NativeValue),
            AvroValue::Union(_, inner) => inner.lookup_field(name),
            _ => None,
        }
    }

    fn preferred_branch(&self) -> Option<usize> {
        match self {
            AvroValue::Union(index, _) => usize::try_from(*index).ok(),
            _ => None,
        }
    }
}
