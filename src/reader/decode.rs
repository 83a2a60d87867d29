//! Schema-driven decoding into [`AvroValue`]s.
//!
//! Every function takes a `&mut &[u8]` cursor and advances it past exactly
//! what it consumed. Running out of input mid-value is
//! [`DecodeError::TruncatedInput`]; an enum or union index outside its table
//! is rejected before anything is looked up.

use base64::Engine;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::schema::{AvroSchema, EnumSchema, RecordSchema, SchemaResolutionContext};

use super::varint;

/// Split `len` bytes off the front of the cursor.
#[inline]
fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::TruncatedInput);
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}

/// One byte, 0 or 1. Anything else is invalid.
#[inline]
pub fn decode_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    match take(data, 1)?[0] {
        0 => Ok(false),
        1 => Ok(true),
        byte => Err(DecodeError::InvalidData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

/// A zigzag varint that must fit 32 bits.
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let long = decode_long(data)?;
    i32::try_from(long).map_err(|_| {
        DecodeError::InvalidData(format!("Integer overflow: {} does not fit in i32", long))
    })
}

#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    varint::decode_zigzag(data)
}

#[inline]
pub fn decode_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = take(data, 4)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn decode_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let bytes = take(data, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(buf))
}

/// Read a length prefix, rejecting negative values.
#[inline]
fn decode_length(data: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = decode_long(data)?;
    usize::try_from(len)
        .map_err(|_| DecodeError::InvalidData(format!("Negative length: {}", len)))
}

/// A length-prefixed byte run, borrowed from the input.
#[inline]
pub fn decode_bytes_ref<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_length(data)?;
    take(data, len)
}

#[inline]
pub fn decode_bytes(data: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_bytes_ref(data).map(<[u8]>::to_vec)
}

/// Length-prefixed UTF-8.
#[inline]
pub fn decode_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = decode_bytes(data)?;
    String::from_utf8(bytes).map_err(DecodeError::from)
}

#[inline]
pub fn decode_fixed(data: &mut &[u8], size: usize) -> Result<Vec<u8>, DecodeError> {
    take(data, size).map(<[u8]>::to_vec)
}

/// Decode an enum index and check it against the symbol table.
#[inline]
pub fn decode_enum_index(data: &mut &[u8], num_symbols: usize) -> Result<usize, DecodeError> {
    let index = decode_long(data)?;
    match usize::try_from(index) {
        Ok(i) if i < num_symbols => Ok(i),
        _ => Err(DecodeError::InvalidEnumIndex {
            index,
            symbols: num_symbols,
        }),
    }
}

/// Decode an enum value as `(index, symbol)`.
pub fn decode_enum(data: &mut &[u8], schema: &EnumSchema) -> Result<(i32, String), DecodeError> {
    let index = decode_enum_index(data, schema.symbols.len())?;
    Ok((index as i32, schema.symbols[index].clone()))
}

/// Decode a union branch index and check it against the branch count.
#[inline]
pub fn decode_union_index(data: &mut &[u8], num_branches: usize) -> Result<usize, DecodeError> {
    let index = decode_long(data)?;
    match usize::try_from(index) {
        Ok(i) if i < num_branches => Ok(i),
        _ => Err(DecodeError::InvalidUnionIndex {
            index,
            branches: num_branches,
        }),
    }
}

/// Read the header of the next array/map block.
///
/// Returns the item count, zero at the end of the sequence. A negative count
/// is followed by the block's byte size, which is read and discarded.
#[inline]
pub fn decode_block_count(data: &mut &[u8]) -> Result<usize, DecodeError> {
    let count = decode_long(data)?;
    if count < 0 {
        let _byte_size = decode_long(data)?;
    }
    usize::try_from(count.unsigned_abs())
        .map_err(|_| DecodeError::InvalidData(format!("Block count too large: {}", count)))
}

/// A decoded value, tagged with the schema type it was read as.
///
/// Records hold their fields in schema order and maps their entries in wire
/// order. A union keeps the branch index it was decoded from, which lets the
/// value be written back under the same branch.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Record(Vec<(String, AvroValue)>),
    /// Symbol index and symbol.
    Enum(i32, String),
    Array(Vec<AvroValue>),
    Map(Vec<(String, AvroValue)>),
    /// Branch index and branch value.
    Union(i32, Box<AvroValue>),
    Fixed(Vec<u8>),
}

impl AvroValue {
    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self {
            AvroValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            AvroValue::Union(_, inner) => inner.field(name),
            _ => None,
        }
    }

    /// The value inside a union, or the value itself.
    pub fn unwrap_union(&self) -> &AvroValue {
        match self {
            AvroValue::Union(_, inner) => inner.unwrap_union(),
            other => other,
        }
    }

    /// Render as JSON: bytes and fixed as base64, enums as their symbol,
    /// unions as the branch value. Non-finite floats become null.
    pub fn to_json(&self) -> Value {
        match self {
            AvroValue::Null => Value::Null,
            AvroValue::Boolean(b) => Value::Bool(*b),
            AvroValue::Int(i) => Value::Number((*i).into()),
            AvroValue::Long(l) => Value::Number((*l).into()),
            AvroValue::Float(f) => serde_json::Number::from_f64(*f as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AvroValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            AvroValue::String(s) => Value::String(s.clone()),
            AvroValue::Record(entries) | AvroValue::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                Value::Object(map)
            }
            AvroValue::Enum(_index, symbol) => Value::String(symbol.clone()),
            AvroValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            AvroValue::Union(_index, value) => value.to_json(),
        }
    }
}

/// Default bound on nested records, arrays, maps and unions.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default bound on the entries of one array or map.
pub const DEFAULT_MAX_ITEMS: usize = 1 << 24;

/// Bounds on what one encoded value may make the decoder do.
///
/// Block counts come straight from the input, and a recursive schema spends
/// one byte per nesting level, so neither is bounded by the input length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Deepest nesting of records, arrays, maps and unions.
    pub max_depth: usize,
    /// Most entries one array or map may hold, summed over its blocks.
    pub max_items: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// Decoding state threaded through one value: the named types, the limits
/// and how deep the walk currently is.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    names: &'a SchemaResolutionContext,
    limits: DecodeLimits,
    depth: usize,
}

impl<'a> DecodeContext<'a> {
    pub fn new(names: &'a SchemaResolutionContext) -> Self {
        Self {
            names,
            limits: DecodeLimits::default(),
            depth: 0,
        }
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn names(&self) -> &'a SchemaResolutionContext {
        self.names
    }

    /// The context one composite level further down.
    pub(crate) fn nested(&self) -> Result<Self, DecodeError> {
        if self.depth >= self.limits.max_depth {
            return Err(DecodeError::DepthLimitExceeded {
                limit: self.limits.max_depth,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..*self
        })
    }

    /// Add a block of `count` entries to the `seen` entries of one container.
    pub(crate) fn admit_items(&self, seen: usize, count: usize) -> Result<usize, DecodeError> {
        seen.checked_add(count)
            .filter(|total| *total <= self.limits.max_items)
            .ok_or(DecodeError::ItemLimitExceeded {
                limit: self.limits.max_items,
            })
    }

    fn lookup(&self, name: &str) -> Result<&'a AvroSchema, DecodeError> {
        self.names.get(name).ok_or_else(|| {
            DecodeError::TypeMismatch(format!("Unresolved named type reference: '{}'", name))
        })
    }
}

/// Decode one value of `schema`, following `Named` links through `context`,
/// under the default [`DecodeLimits`].
pub fn decode_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, DecodeError> {
    decode_value_in(data, schema, &DecodeContext::new(context))
}

/// Decode one value of `schema` within `ctx`.
pub fn decode_value_in(
    data: &mut &[u8],
    schema: &AvroSchema,
    ctx: &DecodeContext<'_>,
) -> Result<AvroValue, DecodeError> {
    let schema = match schema {
        AvroSchema::Named(name) => ctx.lookup(name)?,
        other => other,
    };

    Ok(match schema {
        AvroSchema::Null => AvroValue::Null,
        AvroSchema::Boolean => AvroValue::Boolean(decode_boolean(data)?),
        AvroSchema::Int => AvroValue::Int(decode_int(data)?),
        AvroSchema::Long => AvroValue::Long(decode_long(data)?),
        AvroSchema::Float => AvroValue::Float(decode_float(data)?),
        AvroSchema::Double => AvroValue::Double(decode_double(data)?),
        AvroSchema::Bytes => AvroValue::Bytes(decode_bytes(data)?),
        AvroSchema::String => AvroValue::String(decode_string(data)?),

        AvroSchema::Record(record_schema) => {
            AvroValue::Record(record_fields(data, record_schema, &ctx.nested()?)?)
        }
        AvroSchema::Enum(enum_schema) => {
            let (index, symbol) = decode_enum(data, enum_schema)?;
            AvroValue::Enum(index, symbol)
        }
        AvroSchema::Array(item_schema) => {
            AvroValue::Array(array_items(data, item_schema, &ctx.nested()?)?)
        }
        AvroSchema::Map(value_schema) => {
            AvroValue::Map(map_entries(data, value_schema, &ctx.nested()?)?)
        }
        AvroSchema::Union(variants) => {
            let index = decode_union_index(data, variants.len())?;
            let value = decode_value_in(data, &variants[index], &ctx.nested()?)?;
            AvroValue::Union(index as i32, Box::new(value))
        }
        AvroSchema::Fixed(fixed_schema) => AvroValue::Fixed(decode_fixed(data, fixed_schema.size)?),

        AvroSchema::Named(name) => {
            return Err(DecodeError::TypeMismatch(format!(
                "Named type '{}' links to another link",
                name
            )))
        }
    })
}

/// Decode a record's fields in schema order.
pub fn decode_record(
    data: &mut &[u8],
    schema: &RecordSchema,
    context: &SchemaResolutionContext,
) -> Result<Vec<(String, AvroValue)>, DecodeError> {
    record_fields(data, schema, &DecodeContext::new(context))
}

fn record_fields(
    data: &mut &[u8],
    schema: &RecordSchema,
    ctx: &DecodeContext<'_>,
) -> Result<Vec<(String, AvroValue)>, DecodeError> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let value = decode_value_in(data, &field.schema, ctx)?;
        fields.push((field.name.clone(), value));
    }
    Ok(fields)
}

/// Decode an array of values.
pub fn decode_array(
    data: &mut &[u8],
    item_schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<Vec<AvroValue>, DecodeError> {
    array_items(data, item_schema, &DecodeContext::new(context))
}

fn array_items(
    data: &mut &[u8],
    item_schema: &AvroSchema,
    ctx: &DecodeContext<'_>,
) -> Result<Vec<AvroValue>, DecodeError> {
    let mut items = Vec::new();
    loop {
        let count = decode_block_count(data)?;
        if count == 0 {
            return Ok(items);
        }
        ctx.admit_items(items.len(), count)?;
        // Bound the reservation by what the input could possibly hold
        items.reserve(count.min(data.len()));
        for _ in 0..count {
            items.push(decode_value_in(data, item_schema, ctx)?);
        }
    }
}

/// Decode a map with string keys, preserving wire order.
pub fn decode_map(
    data: &mut &[u8],
    value_schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<Vec<(String, AvroValue)>, DecodeError> {
    map_entries(data, value_schema, &DecodeContext::new(context))
}

fn map_entries(
    data: &mut &[u8],
    value_schema: &AvroSchema,
    ctx: &DecodeContext<'_>,
) -> Result<Vec<(String, AvroValue)>, DecodeError> {
    let mut entries = Vec::new();
    loop {
        let count = decode_block_count(data)?;
        if count == 0 {
            return Ok(entries);
        }
        ctx.admit_items(entries.len(), count)?;
        entries.reserve(count.min(data.len()));
        for _ in 0..count {
            let key = decode_string(data)?;
            let value = decode_value_in(data, value_schema, ctx)?;
            entries.push((key, value));
        }
    }
}

#[inline]
pub fn skip_fixed(data: &mut &[u8], size: usize) -> Result<(), DecodeError> {
    take(data, size).map(|_| ())
}

#[inline]
pub fn skip_bytes(data: &mut &[u8]) -> Result<(), DecodeError> {
    decode_bytes_ref(data).map(|_| ())
}

/// Skip the blocks of an array or map, calling `skip_item` per entry.
///
/// Blocks that carry a byte size are jumped over without looking at items.
fn skip_blocks<F>(data: &mut &[u8], ctx: &DecodeContext<'_>, mut skip_item: F) -> Result<(), DecodeError>
where
    F: FnMut(&mut &[u8]) -> Result<(), DecodeError>,
{
    let mut seen = 0;
    loop {
        let count = decode_long(data)?;
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            let byte_size = decode_length(data)?;
            skip_fixed(data, byte_size)?;
            continue;
        }
        let count = usize::try_from(count)
            .map_err(|_| DecodeError::InvalidData(format!("Block count too large: {}", count)))?;
        seen = ctx.admit_items(seen, count)?;
        for _ in 0..count {
            skip_item(data)?;
        }
    }
}

/// Advance past one value of `schema` without building it, under the
/// default [`DecodeLimits`]. Used for writer fields a reader schema drops.
pub fn skip_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<(), DecodeError> {
    skip_value_in(data, schema, &DecodeContext::new(context))
}

/// Advance past one value of `schema` within `ctx`.
pub fn skip_value_in(
    data: &mut &[u8],
    schema: &AvroSchema,
    ctx: &DecodeContext<'_>,
) -> Result<(), DecodeError> {
    let schema = match schema {
        AvroSchema::Named(name) => ctx.lookup(name)?,
        other => other,
    };

    match schema {
        AvroSchema::Null => Ok(()),
        AvroSchema::Boolean => skip_fixed(data, 1),
        AvroSchema::Int | AvroSchema::Long | AvroSchema::Enum(_) => varint::skip_varint(data),
        AvroSchema::Float => skip_fixed(data, 4),
        AvroSchema::Double => skip_fixed(data, 8),
        AvroSchema::Bytes | AvroSchema::String => skip_bytes(data),
        AvroSchema::Fixed(fixed_schema) => skip_fixed(data, fixed_schema.size),
        AvroSchema::Array(item_schema) => {
            let inner = ctx.nested()?;
            skip_blocks(data, ctx, |d| skip_value_in(d, item_schema, &inner))
        }
        AvroSchema::Map(value_schema) => {
            let inner = ctx.nested()?;
            skip_blocks(data, ctx, |d| {
                skip_bytes(d)?;
                skip_value_in(d, value_schema, &inner)
            })
        }
        AvroSchema::Union(variants) => {
            let index = decode_union_index(data, variants.len())?;
            skip_value_in(data, &variants[index], &ctx.nested()?)
        }
        AvroSchema::Record(record_schema) => {
            let inner = ctx.nested()?;
            record_schema
                .fields
                .iter()
                .try_for_each(|field| skip_value_in(data, &field.schema, &inner))
        }
        AvroSchema::Named(name) => Err(DecodeError::TypeMismatch(format!(
            "Named type '{}' links to another link",
            name
        ))),
    }
}
