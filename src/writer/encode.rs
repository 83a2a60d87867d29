//! Schema-driven binary encoding of native values.
//!
//! [`encode_value`] walks the schema and the value together and writes the
//! Avro binary form into a [`ByteSink`]. Records are written strictly in
//! schema field order; arrays and maps are written as a single block holding
//! every item followed by the zero terminator.

use crate::error::EncodeError;
use crate::native::{NativeKind, NativeValue, Scalar};
use crate::reader::{AvroValue, DEFAULT_MAX_DEPTH};
use crate::schema::{json_to_avro_value, AvroSchema, EnumSchema, FieldSchema, RecordSchema, SchemaResolutionContext};

use super::buffer::ByteSink;
use super::union::resolve_union_branch;

/// What to do when a record value lacks one of the schema's fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingFieldPolicy {
    /// Use the field default; failing that, null if the field accepts null.
    #[default]
    UseDefault,
    /// Every field must be present.
    Strict,
}

/// Per-call encoding state: the named-type registry, the missing field
/// policy and how deep the current value sits.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub names: &'a SchemaResolutionContext,
    pub missing_fields: MissingFieldPolicy,
    pub max_depth: usize,
    depth: usize,
}

impl<'a> EncodeContext<'a> {
    pub fn new(names: &'a SchemaResolutionContext) -> Self {
        Self {
            names,
            missing_fields: MissingFieldPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    pub fn with_missing_fields(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_fields = policy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Context for one level further down a record, array, map or union.
    pub(crate) fn nested(&self) -> Result<Self, EncodeError> {
        if self.depth >= self.max_depth {
            return Err(EncodeError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..*self
        })
    }

    /// Follow named-type links to a concrete schema.
    pub(crate) fn resolve<'s>(&self, schema: &'s AvroSchema) -> Result<&'s AvroSchema, EncodeError>
    where
        'a: 's,
    {
        self.names.deref(schema).ok_or_else(|| {
            EncodeError::UnresolvedType(schema.name().unwrap_or_default().to_string())
        })
    }
}

/// Encode `value` as `schema` into `sink`.
///
/// # Errors
/// - `EncodeError::TypeMismatch` when the value's shape does not fit the schema
/// - `EncodeError::ValueOutOfRange` for integers outside the `int` range
/// - `EncodeError::UnknownSymbol` / `SizeMismatch` for bad enum and fixed values
/// - `EncodeError::MissingField` per [`MissingFieldPolicy`]
/// - `EncodeError::NoMatchingUnionBranch` when no union branch accepts the value
/// - `EncodeError::DepthLimitExceeded` past [`EncodeContext::max_depth`]
/// - `EncodeError::InsufficientSpace` from a bounded sink
pub fn encode_value<S: ByteSink + ?Sized>(
    sink: &mut S,
    schema: &AvroSchema,
    value: &dyn NativeValue,
    ctx: &EncodeContext<'_>,
) -> Result<(), EncodeError> {
    let schema = ctx.resolve(schema)?;

    match schema {
        AvroSchema::Null => match value.as_scalar() {
            Some(Scalar::Null) => Ok(()),
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Boolean => match value.as_scalar() {
            Some(Scalar::Boolean(b)) => sink.write_byte(b as u8),
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Int => match value.as_scalar() {
            Some(Scalar::Integer(i)) => {
                let i = i32::try_from(i).map_err(|_| {
                    EncodeError::ValueOutOfRange(format!("{} does not fit in an int", i))
                })?;
                sink.write_long(i as i64)
            }
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Long => match value.as_scalar() {
            Some(Scalar::Integer(i)) => sink.write_long(i),
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Float => match value.as_scalar() {
            Some(Scalar::Integer(i)) => sink.write_float(i as f32),
            Some(Scalar::Float(f)) => sink.write_float(f as f32),
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Double => match value.as_scalar() {
            Some(Scalar::Integer(i)) => sink.write_double(i as f64),
            Some(Scalar::Float(f)) => sink.write_double(f),
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Bytes => match value.as_scalar() {
            Some(Scalar::Bytes(b)) => sink.write_length_prefixed(b),
            Some(Scalar::Text(s)) => sink.write_length_prefixed(s.as_bytes()),
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::String => match value.as_scalar() {
            Some(Scalar::Text(s)) => sink.write_length_prefixed(s.as_bytes()),
            Some(Scalar::Bytes(b)) => {
                let s = std::str::from_utf8(b).map_err(|e| {
                    EncodeError::TypeMismatch(format!("bytes are not valid UTF-8: {}", e))
                })?;
                sink.write_length_prefixed(s.as_bytes())
            }
            _ => Err(mismatch(schema, value)),
        },
        AvroSchema::Fixed(fixed) => {
            let bytes = match value.as_scalar() {
                Some(Scalar::Bytes(b)) => b,
                Some(Scalar::Text(s)) => s.as_bytes(),
                _ => return Err(mismatch(schema, value)),
            };
            if bytes.len() != fixed.size {
                return Err(EncodeError::SizeMismatch {
                    expected: fixed.size,
                    actual: bytes.len(),
                });
            }
            sink.write_bytes(bytes)
        }
        AvroSchema::Enum(enum_schema) => {
            let index = enum_index(enum_schema, value)?;
            sink.write_long(index as i64)
        }
        AvroSchema::Array(items) => {
            let iter = value.iter_sequence().ok_or_else(|| mismatch(schema, value))?;
            let inner = ctx.nested()?;
            if iter.len() > 0 {
                sink.write_long(iter.len() as i64)?;
                for item in iter {
                    encode_value(sink, items, item, &inner)?;
                }
            }
            sink.write_byte(0)
        }
        AvroSchema::Map(values) => {
            let iter = value.iter_entries().ok_or_else(|| mismatch(schema, value))?;
            let inner = ctx.nested()?;
            if iter.len() > 0 {
                sink.write_long(iter.len() as i64)?;
                for (key, item) in iter {
                    sink.write_length_prefixed(key.as_bytes())?;
                    encode_value(sink, values, item, &inner)?;
                }
            }
            sink.write_byte(0)
        }
        AvroSchema::Record(record) => encode_record(sink, record, value, &ctx.nested()?),
        AvroSchema::Union(branches) => {
            let inner = ctx.nested()?;
            let index = resolve_union_branch(branches, value, &inner)?;
            sink.write_long(index as i64)?;
            encode_value(sink, &branches[index], value, &inner)
        }
        AvroSchema::Named(name) => Err(EncodeError::UnresolvedType(name.clone())),
    }
}

fn encode_record<S: ByteSink + ?Sized>(
    sink: &mut S,
    record: &RecordSchema,
    value: &dyn NativeValue,
    ctx: &EncodeContext<'_>,
) -> Result<(), EncodeError> {
    if value.kind() != NativeKind::Mapping {
        return Err(EncodeError::TypeMismatch(format!(
            "record '{}' needs a mapping, got {}",
            record.name,
            value.kind().name()
        )));
    }

    for field in &record.fields {
        match value.lookup_field(&field.name) {
            Some(field_value) => encode_value(sink, &field.schema, field_value, ctx)?,
            None => encode_missing_field(sink, record, field, ctx)?,
        }
    }
    Ok(())
}

fn encode_missing_field<S: ByteSink + ?Sized>(
    sink: &mut S,
    record: &RecordSchema,
    field: &FieldSchema,
    ctx: &EncodeContext<'_>,
) -> Result<(), EncodeError> {
    let missing = || EncodeError::MissingField {
        record: record.fullname(),
        field: field.name.clone(),
    };

    if ctx.missing_fields == MissingFieldPolicy::Strict {
        return Err(missing());
    }

    if let Some(default) = &field.default {
        let default = json_to_avro_value(default, &field.schema, ctx.names).map_err(|e| {
            EncodeError::TypeMismatch(format!(
                "default of field '{}.{}': {}",
                record.name, field.name, e
            ))
        })?;
        return encode_value(sink, &field.schema, &default, ctx);
    }

    if ctx.resolve(&field.schema)?.accepts_null() {
        return encode_value(sink, &field.schema, &AvroValue::Null, ctx);
    }

    Err(missing())
}

fn enum_index(schema: &EnumSchema, value: &dyn NativeValue) -> Result<usize, EncodeError> {
    let unknown = |symbol: String| EncodeError::UnknownSymbol {
        enum_name: schema.fullname(),
        symbol,
    };

    match value.as_scalar() {
        Some(Scalar::Symbol(s)) | Some(Scalar::Text(s)) => {
            schema.symbol_index(s).ok_or_else(|| unknown(s.to_string()))
        }
        Some(Scalar::Integer(i)) => usize::try_from(i)
            .ok()
            .filter(|idx| *idx < schema.symbols.len())
            .ok_or_else(|| unknown(i.to_string())),
        _ => Err(EncodeError::TypeMismatch(format!(
            "enum '{}' needs a symbol, got {}",
            schema.name,
            value.kind().name()
        ))),
    }
}

fn mismatch(schema: &AvroSchema, value: &dyn NativeValue) -> EncodeError {
    EncodeError::TypeMismatch(format!(
        "cannot encode {} value as {}",
        value.kind().name(),
        schema.type_name()
    ))
}
