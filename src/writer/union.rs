//! Union branch selection for encoding.
//!
//! A native value carries no Avro type, so the branch a union value is
//! written under is chosen by checking the value against each branch. The
//! order is fixed, so the same value always selects the same branch:
//! 1. the branch the value says it came from ([`NativeValue::preferred_branch`])
//! 2. a named branch whose name matches the value's [`NativeValue::type_tag`]
//! 3. the first branch in declaration order the value fits

use crate::error::EncodeError;
use crate::native::{NativeKind, NativeValue, Scalar};
use crate::schema::AvroSchema;

use super::encode::{EncodeContext, MissingFieldPolicy};

/// Pick the union branch `value` is encoded under.
///
/// # Errors
/// `EncodeError::NoMatchingUnionBranch` when no branch accepts the value.
pub fn resolve_union_branch(
    branches: &[AvroSchema],
    value: &dyn NativeValue,
    ctx: &EncodeContext<'_>,
) -> Result<usize, EncodeError> {
    if let Some(index) = value.preferred_branch() {
        if let Some(branch) = branches.get(index) {
            if fits(branch, value, ctx)? {
                return Ok(index);
            }
        }
    }

    if let Some(tag) = value.type_tag() {
        for (index, branch) in branches.iter().enumerate() {
            let tagged = ctx
                .names
                .deref(branch)
                .is_some_and(|resolved| answers_to_tag(resolved, tag));
            if tagged && fits(branch, value, ctx)? {
                return Ok(index);
            }
        }
    }

    for (index, branch) in branches.iter().enumerate() {
        if fits(branch, value, ctx)? {
            return Ok(index);
        }
    }

    Err(EncodeError::NoMatchingUnionBranch(format!(
        "{} value fits none of [{}]",
        value.kind().name(),
        branches
            .iter()
            .map(|b| b.name().unwrap_or(b.type_name()))
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

fn answers_to_tag(schema: &AvroSchema, tag: &str) -> bool {
    schema.is_named()
        && (schema.name() == Some(tag)
            || schema.fullname().as_deref() == Some(tag)
            || schema.aliases().iter().any(|a| a == tag))
}

/// Whether `value` can be encoded as `schema` without error.
///
/// `bytes` and `fixed` only take native bytes here, although the encoder
/// also takes text for them, so text in a `["bytes", "string"]` union
/// picks `string`. A value nested past the context's depth limit does not fit.
pub fn validate_native(schema: &AvroSchema, value: &dyn NativeValue, ctx: &EncodeContext<'_>) -> bool {
    fits(schema, value, ctx).unwrap_or(false)
}

// Only the depth limit is an error; every other misfit is `Ok(false)`.
fn fits(schema: &AvroSchema, value: &dyn NativeValue, ctx: &EncodeContext<'_>) -> Result<bool, EncodeError> {
    let Some(schema) = ctx.names.deref(schema) else {
        return Ok(false);
    };

    let fit = match schema {
        AvroSchema::Null => value.kind() == NativeKind::Null,
        AvroSchema::Boolean => value.kind() == NativeKind::Boolean,
        AvroSchema::Int => {
            matches!(value.as_scalar(), Some(Scalar::Integer(i)) if i32::try_from(i).is_ok())
        }
        AvroSchema::Long => value.kind() == NativeKind::Integer,
        AvroSchema::Float | AvroSchema::Double => {
            matches!(value.kind(), NativeKind::Integer | NativeKind::Float)
        }
        AvroSchema::Bytes => value.kind() == NativeKind::Bytes,
        AvroSchema::String => value.kind() == NativeKind::Text,
        AvroSchema::Fixed(fixed) => {
            matches!(value.as_scalar(), Some(Scalar::Bytes(b)) if b.len() == fixed.size)
        }
        AvroSchema::Enum(enum_schema) => match value.as_scalar() {
            Some(Scalar::Symbol(s)) | Some(Scalar::Text(s)) => enum_schema.symbol_index(s).is_some(),
            _ => false,
        },
        AvroSchema::Array(items) => {
            let Some(iter) = value.iter_sequence() else {
                return Ok(false);
            };
            let inner = ctx.nested()?;
            for item in iter {
                if !fits(items, item, &inner)? {
                    return Ok(false);
                }
            }
            true
        }
        AvroSchema::Map(values) => {
            let Some(iter) = value.iter_entries() else {
                return Ok(false);
            };
            let inner = ctx.nested()?;
            for (_, item) in iter {
                if !fits(values, item, &inner)? {
                    return Ok(false);
                }
            }
            true
        }
        AvroSchema::Record(record) => {
            if value.kind() != NativeKind::Mapping {
                return Ok(false);
            }
            let inner = ctx.nested()?;
            for field in &record.fields {
                let ok = match value.lookup_field(&field.name) {
                    Some(field_value) => fits(&field.schema, field_value, &inner)?,
                    None => {
                        inner.missing_fields == MissingFieldPolicy::UseDefault
                            && (field.default.is_some()
                                || inner
                                    .names
                                    .deref(&field.schema)
                                    .is_some_and(AvroSchema::accepts_null))
                    }
                };
                if !ok {
                    return Ok(false);
                }
            }
            true
        }
        AvroSchema::Union(branches) => {
            let inner = ctx.nested()?;
            for branch in branches {
                if fits(branch, value, &inner)? {
                    return Ok(true);
                }
            }
            false
        }
        AvroSchema::Named(_) => false,
    };
    Ok(fit)
}
