//! Schema resolution for reader/writer schema evolution.
//!
//! A [`ReaderWriterResolution`] is built once per (writer, reader) schema pair.
//! It walks both schema trees and records, for every position, how bytes
//! written under the writer schema turn into a value shaped by the reader
//! schema:
//! - record fields are matched by name or reader alias, reordered, skipped
//!   when only the writer has them, and defaulted when only the reader has them
//! - primitives are promoted (int→long/float/double, long→float/double,
//!   float→double, string↔bytes)
//! - enum symbols are remapped, falling back to the reader's default symbol
//! - union branches are mapped in both directions
//!
//! Every incompatibility is reported while building, so decoding never has
//! to second-guess the plan. Record pairs are kept in an arena keyed by their
//! names, which is what terminates recursive schemas.

use std::collections::HashMap;
use std::mem::discriminant;

use serde_json::Value;
use tracing::debug;

use crate::error::{DecodeError, SchemaError};
use crate::reader::decode::{
    decode_block_count, decode_enum_index, decode_string, decode_union_index, decode_value_in,
    skip_value_in, AvroValue, DecodeContext, DecodeLimits,
};
use crate::schema::{AvroSchema, EnumSchema, RecordSchema, Schema, SchemaResolutionContext};

/// Type promotions supported by Avro schema resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePromotion {
    /// int → long
    IntToLong,
    /// int → float
    IntToFloat,
    /// int → double
    IntToDouble,
    /// long → float
    LongToFloat,
    /// long → double
    LongToDouble,
    /// float → double
    FloatToDouble,
    /// string → bytes
    StringToBytes,
    /// bytes → string
    BytesToString,
}

impl TypePromotion {
    /// Determine the promotion between two primitive types.
    ///
    /// Returns `Ok(None)` for identical types, `Ok(Some(promotion))` when the
    /// writer type promotes to the reader type, and an error otherwise.
    pub fn from_schemas(
        writer: &AvroSchema,
        reader: &AvroSchema,
    ) -> Result<Option<Self>, SchemaError> {
        use AvroSchema as S;

        match (writer, reader) {
            (S::Null, S::Null)
            | (S::Boolean, S::Boolean)
            | (S::Int, S::Int)
            | (S::Long, S::Long)
            | (S::Float, S::Float)
            | (S::Double, S::Double)
            | (S::Bytes, S::Bytes)
            | (S::String, S::String) => Ok(None),

            (S::Int, S::Long) => Ok(Some(TypePromotion::IntToLong)),
            (S::Int, S::Float) => Ok(Some(TypePromotion::IntToFloat)),
            (S::Int, S::Double) => Ok(Some(TypePromotion::IntToDouble)),
            (S::Long, S::Float) => Ok(Some(TypePromotion::LongToFloat)),
            (S::Long, S::Double) => Ok(Some(TypePromotion::LongToDouble)),
            (S::Float, S::Double) => Ok(Some(TypePromotion::FloatToDouble)),
            (S::String, S::Bytes) => Ok(Some(TypePromotion::StringToBytes)),
            (S::Bytes, S::String) => Ok(Some(TypePromotion::BytesToString)),

            _ => Err(SchemaError::IncompatibleSchema(format!(
                "Cannot promote {} to {}",
                writer.type_name(),
                reader.type_name()
            ))),
        }
    }

    /// The writer-side type this promotion reads.
    pub fn source(&self) -> AvroSchema {
        match self {
            TypePromotion::IntToLong | TypePromotion::IntToFloat | TypePromotion::IntToDouble => {
                AvroSchema::Int
            }
            TypePromotion::LongToFloat | TypePromotion::LongToDouble => AvroSchema::Long,
            TypePromotion::FloatToDouble => AvroSchema::Float,
            TypePromotion::StringToBytes => AvroSchema::String,
            TypePromotion::BytesToString => AvroSchema::Bytes,
        }
    }
}

/// Apply a type promotion to a decoded value.
pub fn apply_promotion(value: AvroValue, promotion: TypePromotion) -> Result<AvroValue, DecodeError> {
    match (value, promotion) {
        (AvroValue::Int(v), TypePromotion::IntToLong) => Ok(AvroValue::Long(v as i64)),
        (AvroValue::Int(v), TypePromotion::IntToFloat) => Ok(AvroValue::Float(v as f32)),
        (AvroValue::Int(v), TypePromotion::IntToDouble) => Ok(AvroValue::Double(v as f64)),
        (AvroValue::Long(v), TypePromotion::LongToFloat) => Ok(AvroValue::Float(v as f32)),
        (AvroValue::Long(v), TypePromotion::LongToDouble) => Ok(AvroValue::Double(v as f64)),
        (AvroValue::Float(v), TypePromotion::FloatToDouble) => Ok(AvroValue::Double(v as f64)),
        (AvroValue::String(s), TypePromotion::StringToBytes) => Ok(AvroValue::Bytes(s.into_bytes())),
        (AvroValue::Bytes(b), TypePromotion::BytesToString) => {
            String::from_utf8(b).map(AvroValue::String).map_err(DecodeError::from)
        }
        (value, promotion) => Err(DecodeError::TypeMismatch(format!(
            "Cannot apply {:?} promotion to {:?}",
            promotion, value
        ))),
    }
}

/// How one position of the writer schema becomes a reader value.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Writer and reader agree; decode with this writer schema as-is.
    Direct(AvroSchema),
    /// Decode the writer primitive and widen it.
    Promote(TypePromotion),
    /// Reader `(index, symbol)` for each writer symbol index.
    Enum(Vec<(i32, String)>),
    Array(Box<Resolution>),
    Map(Box<Resolution>),
    /// Index into [`ReaderWriterResolution::records`].
    Record(usize),
    /// The writer wrote a union; one resolution per writer branch.
    WriterUnion(Vec<Resolution>),
    /// The reader expects a union; the value lands in `branch`.
    ReaderUnion {
        branch: usize,
        inner: Box<Resolution>,
    },
}

/// What to do with a writer field while decoding a record.
#[derive(Debug, Clone)]
pub enum WriterFieldAction {
    /// Decode into the reader field at `reader_index`.
    Read {
        reader_index: usize,
        resolution: Resolution,
    },
    /// The reader has no such field; skip the bytes.
    Skip(AvroSchema),
}

/// Where a reader field's value comes from.
#[derive(Debug, Clone)]
pub enum ResolvedField {
    /// Field exists in both schemas
    Present {
        /// Index of the field in the writer schema
        writer_index: usize,
        /// Type promotion applied, if any
        promotion: Option<TypePromotion>,
    },
    /// Field missing in writer - use the reader default
    Default {
        /// The default, already converted for the reader field schema
        default_value: AvroValue,
    },
}

/// Decoding plan for one (writer record, reader record) pair.
#[derive(Debug, Clone)]
pub struct RecordResolution {
    /// Full name of the reader record
    pub reader_name: String,
    /// Reader field names, in reader order
    pub field_names: Vec<String>,
    /// One action per writer field, in writer order
    pub writer_fields: Vec<WriterFieldAction>,
    /// One source per reader field, in reader order
    pub resolved_fields: Vec<ResolvedField>,
}

impl RecordResolution {
    /// Check if any field reordering is needed.
    ///
    /// Returns true if the writer fields appear in a different order
    /// than the reader expects them.
    pub fn needs_reordering(&self) -> bool {
        let mut last_writer_idx = None;
        for field in &self.resolved_fields {
            if let ResolvedField::Present { writer_index, .. } = field {
                if matches!(last_writer_idx, Some(last) if *writer_index < last) {
                    return true;
                }
                last_writer_idx = Some(*writer_index);
            }
        }
        false
    }

    /// Check if any type promotions are needed.
    pub fn needs_promotions(&self) -> bool {
        self.resolved_fields.iter().any(|f| {
            matches!(
                f,
                ResolvedField::Present {
                    promotion: Some(_),
                    ..
                }
            )
        })
    }

    /// Check if any default values are needed.
    pub fn needs_defaults(&self) -> bool {
        self.resolved_fields
            .iter()
            .any(|f| matches!(f, ResolvedField::Default { .. }))
    }

    /// Indices of writer fields the reader does not have.
    pub fn writer_fields_to_skip(&self) -> Vec<usize> {
        self.writer_fields
            .iter()
            .enumerate()
            .filter(|(_, action)| matches!(action, WriterFieldAction::Skip(_)))
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Compiled mapping from a writer schema to a reader schema.
///
/// Immutable once built and safe to share between threads.
#[derive(Debug, Clone)]
pub struct ReaderWriterResolution {
    writer: Schema,
    reader: Schema,
    root: Resolution,
    records: Vec<RecordResolution>,
}

impl ReaderWriterResolution {
    /// Build the resolution between `writer` and `reader`.
    ///
    /// # Errors
    /// - `SchemaError::IncompatibleSchema` when a writer position cannot be
    ///   read as the corresponding reader position
    /// - `SchemaError::MissingDefault` when a reader-only field has no default
    /// - `SchemaError::InvalidSchema` when a reader default does not fit its field
    pub fn new(writer: &Schema, reader: &Schema) -> Result<Self, SchemaError> {
        let mut builder = ResolutionBuilder {
            writer: writer.context(),
            reader: reader.context(),
            records: Vec::new(),
            memo: HashMap::new(),
        };

        let root = builder.resolve(writer.root(), reader.root())?;
        let records = builder
            .records
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                SchemaError::InvalidSchema("Record resolution left incomplete".to_string())
            })?;

        debug!(
            records = records.len(),
            defaults = records.iter().filter(|r| r.needs_defaults()).count(),
            "built reader/writer schema resolution"
        );

        Ok(Self {
            writer: writer.clone(),
            reader: reader.clone(),
            root,
            records,
        })
    }

    /// The schema the data was written with.
    pub fn writer_schema(&self) -> &Schema {
        &self.writer
    }

    /// The schema values are decoded into.
    pub fn reader_schema(&self) -> &Schema {
        &self.reader
    }

    /// Resolution of the root schema.
    pub fn root(&self) -> &Resolution {
        &self.root
    }

    /// All record plans, indexed by [`Resolution::Record`].
    pub fn records(&self) -> &[RecordResolution] {
        &self.records
    }

    /// Plan for the root record, if the root is a record.
    pub fn root_record(&self) -> Option<&RecordResolution> {
        match self.root {
            Resolution::Record(idx) => self.records.get(idx),
            _ => None,
        }
    }

    /// Decode one writer-encoded value into the reader's shape.
    pub fn decode(&self, data: &mut &[u8]) -> Result<AvroValue, DecodeError> {
        self.decode_with_limits(data, DecodeLimits::default())
    }

    /// [`decode`](Self::decode) under explicit limits.
    pub fn decode_with_limits(
        &self,
        data: &mut &[u8],
        limits: DecodeLimits,
    ) -> Result<AvroValue, DecodeError> {
        let ctx = DecodeContext::new(self.writer.context()).with_limits(limits);
        self.decode_resolved(data, &self.root, &ctx)
    }

    fn decode_resolved(
        &self,
        data: &mut &[u8],
        resolution: &Resolution,
        ctx: &DecodeContext<'_>,
    ) -> Result<AvroValue, DecodeError> {
        match resolution {
            Resolution::Direct(schema) => decode_value_in(data, schema, ctx),
            Resolution::Promote(promotion) => {
                let value = decode_value_in(data, &promotion.source(), ctx)?;
                apply_promotion(value, *promotion)
            }
            Resolution::Enum(table) => {
                let index = decode_enum_index(data, table.len())?;
                let (reader_index, symbol) = &table[index];
                Ok(AvroValue::Enum(*reader_index, symbol.clone()))
            }
            Resolution::Array(items) => {
                let inner = ctx.nested()?;
                let mut values = Vec::new();
                loop {
                    let count = decode_block_count(data)?;
                    if count == 0 {
                        return Ok(AvroValue::Array(values));
                    }
                    ctx.admit_items(values.len(), count)?;
                    for _ in 0..count {
                        values.push(self.decode_resolved(data, items, &inner)?);
                    }
                }
            }
            Resolution::Map(values) => {
                let inner = ctx.nested()?;
                let mut entries = Vec::new();
                loop {
                    let count = decode_block_count(data)?;
                    if count == 0 {
                        return Ok(AvroValue::Map(entries));
                    }
                    ctx.admit_items(entries.len(), count)?;
                    for _ in 0..count {
                        let key = decode_string(data)?;
                        entries.push((key, self.decode_resolved(data, values, &inner)?));
                    }
                }
            }
            Resolution::Record(idx) => {
                let plan = self.records.get(*idx).ok_or_else(|| {
                    DecodeError::InvalidData(format!("No record resolution at index {}", idx))
                })?;
                self.decode_record(data, plan, &ctx.nested()?)
            }
            Resolution::WriterUnion(branches) => {
                let index = decode_union_index(data, branches.len())?;
                self.decode_resolved(data, &branches[index], &ctx.nested()?)
            }
            Resolution::ReaderUnion { branch, inner } => Ok(AvroValue::Union(
                *branch as i32,
                Box::new(self.decode_resolved(data, inner, &ctx.nested()?)?),
            )),
        }
    }

    fn decode_record(
        &self,
        data: &mut &[u8],
        plan: &RecordResolution,
        ctx: &DecodeContext<'_>,
    ) -> Result<AvroValue, DecodeError> {
        let mut slots: Vec<Option<AvroValue>> = vec![None; plan.field_names.len()];

        for action in &plan.writer_fields {
            match action {
                WriterFieldAction::Skip(schema) => skip_value_in(data, schema, ctx)?,
                WriterFieldAction::Read {
                    reader_index,
                    resolution,
                } => slots[*reader_index] = Some(self.decode_resolved(data, resolution, ctx)?),
            }
        }

        let mut fields = Vec::with_capacity(slots.len());
        for ((name, slot), resolved) in plan.field_names.iter().zip(slots).zip(&plan.resolved_fields) {
            let value = match (slot, resolved) {
                (Some(value), _) => value,
                (None, ResolvedField::Default { default_value }) => default_value.clone(),
                (None, ResolvedField::Present { writer_index, .. }) => {
                    return Err(DecodeError::InvalidData(format!(
                        "Writer field {} was not decoded",
                        writer_index
                    )))
                }
            };
            fields.push((name.clone(), value));
        }
        Ok(AvroValue::Record(fields))
    }
}

struct ResolutionBuilder<'a> {
    writer: &'a SchemaResolutionContext,
    reader: &'a SchemaResolutionContext,
    /// `None` while a record pair is still being resolved
    records: Vec<Option<RecordResolution>>,
    memo: HashMap<(String, String), usize>,
}

impl ResolutionBuilder<'_> {
    fn resolve(&mut self, writer: &AvroSchema, reader: &AvroSchema) -> Result<Resolution, SchemaError> {
        let writer = deref(self.writer, writer)?;
        let reader = deref(self.reader, reader)?;

        match (writer, reader) {
            (AvroSchema::Union(branches), _) => {
                let table = branches
                    .iter()
                    .enumerate()
                    .map(|(i, branch)| {
                        self.resolve(branch, reader)
                            .map_err(within(format!("writer union branch {}", i)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Resolution::WriterUnion(table))
            }
            (_, AvroSchema::Union(branches)) => self.resolve_into_union(writer, branches),
            (AvroSchema::Record(w), AvroSchema::Record(r)) => self.resolve_record(w, r),
            (AvroSchema::Enum(w), AvroSchema::Enum(r)) => resolve_enum(w, r),
            (AvroSchema::Fixed(w), AvroSchema::Fixed(r)) => {
                if !names_match(writer, reader) {
                    return Err(name_mismatch(writer, reader));
                }
                if w.size != r.size {
                    return Err(SchemaError::IncompatibleSchema(format!(
                        "Fixed '{}' has size {} but reader expects {}",
                        w.fullname(),
                        w.size,
                        r.size
                    )));
                }
                Ok(Resolution::Direct(writer.clone()))
            }
            (AvroSchema::Array(w), AvroSchema::Array(r)) => Ok(Resolution::Array(Box::new(
                self.resolve(w, r).map_err(within("array items".to_string()))?,
            ))),
            (AvroSchema::Map(w), AvroSchema::Map(r)) => Ok(Resolution::Map(Box::new(
                self.resolve(w, r).map_err(within("map values".to_string()))?,
            ))),
            (w, r) if w.is_primitive() && r.is_primitive() => {
                Ok(match TypePromotion::from_schemas(w, r)? {
                    Some(promotion) => Resolution::Promote(promotion),
                    None => Resolution::Direct(w.clone()),
                })
            }
            (w, r) => Err(SchemaError::IncompatibleSchema(format!(
                "Cannot read {} as {}",
                describe(w),
                describe(r)
            ))),
        }
    }

    /// Resolve a non-union writer against a reader union: the first branch of
    /// the same kind wins, then the first branch reachable by promotion.
    fn resolve_into_union(
        &mut self,
        writer: &AvroSchema,
        branches: &[AvroSchema],
    ) -> Result<Resolution, SchemaError> {
        for (i, branch) in branches.iter().enumerate() {
            let target = deref(self.reader, branch)?;
            if same_kind(writer, target) {
                if let Ok(inner) = self.attempt(writer, branch) {
                    return Ok(Resolution::ReaderUnion {
                        branch: i,
                        inner: Box::new(inner),
                    });
                }
            }
        }

        for (i, branch) in branches.iter().enumerate() {
            if let Ok(inner) = self.attempt(writer, branch) {
                return Ok(Resolution::ReaderUnion {
                    branch: i,
                    inner: Box::new(inner),
                });
            }
        }

        Err(SchemaError::IncompatibleSchema(format!(
            "No branch of the reader union can read {}",
            describe(writer)
        )))
    }

    /// Resolve speculatively, discarding any record plans created by a failed attempt.
    fn attempt(&mut self, writer: &AvroSchema, reader: &AvroSchema) -> Result<Resolution, SchemaError> {
        let checkpoint = self.records.len();
        let result = self.resolve(writer, reader);
        if result.is_err() {
            self.records.truncate(checkpoint);
            self.memo.retain(|_, idx| *idx < checkpoint);
        }
        result
    }

    fn resolve_record(
        &mut self,
        writer: &RecordSchema,
        reader: &RecordSchema,
    ) -> Result<Resolution, SchemaError> {
        if !record_names_match(writer, reader) {
            return Err(SchemaError::IncompatibleSchema(format!(
                "Record '{}' cannot be read as '{}'",
                writer.fullname(),
                reader.fullname()
            )));
        }

        let key = (writer.fullname(), reader.fullname());
        if let Some(&idx) = self.memo.get(&key) {
            return Ok(Resolution::Record(idx));
        }
        let idx = self.records.len();
        self.records.push(None);
        self.memo.insert(key, idx);

        let reader_name = reader.fullname();
        let mut actions: Vec<Option<WriterFieldAction>> = vec![None; writer.fields.len()];
        let mut resolved_fields = Vec::with_capacity(reader.fields.len());

        for (reader_index, reader_field) in reader.fields.iter().enumerate() {
            // Exact name first, then the reader field's aliases
            let writer_index = writer
                .fields
                .iter()
                .position(|f| f.name == reader_field.name)
                .or_else(|| {
                    writer
                        .fields
                        .iter()
                        .position(|f| reader_field.aliases.contains(&f.name))
                });

            match writer_index {
                Some(writer_index) if actions[writer_index].is_none() => {
                    let writer_field = &writer.fields[writer_index];
                    let resolution = self
                        .resolve(&writer_field.schema, &reader_field.schema)
                        .map_err(within(format!(
                            "field '{}.{}'",
                            reader_name, reader_field.name
                        )))?;
                    let promotion = match resolution {
                        Resolution::Promote(p) => Some(p),
                        _ => None,
                    };
                    actions[writer_index] = Some(WriterFieldAction::Read {
                        reader_index,
                        resolution,
                    });
                    resolved_fields.push(ResolvedField::Present {
                        writer_index,
                        promotion,
                    });
                }
                Some(writer_index) => {
                    return Err(SchemaError::IncompatibleSchema(format!(
                        "Writer field '{}' matches more than one field of '{}'",
                        writer.fields[writer_index].name, reader_name
                    )));
                }
                None => {
                    let path = format!("{}.{}", reader_name, reader_field.name);
                    let default = reader_field
                        .default
                        .as_ref()
                        .ok_or_else(|| SchemaError::MissingDefault(path.clone()))?;
                    let default_value = json_to_avro_value(default, &reader_field.schema, self.reader)
                        .map_err(|e| {
                            SchemaError::InvalidSchema(format!("Default of field '{}': {}", path, e))
                        })?;
                    resolved_fields.push(ResolvedField::Default { default_value });
                }
            }
        }

        let writer_fields = actions
            .into_iter()
            .zip(&writer.fields)
            .map(|(action, field)| {
                action.unwrap_or_else(|| WriterFieldAction::Skip(field.schema.clone()))
            })
            .collect();

        self.records[idx] = Some(RecordResolution {
            field_names: reader.fields.iter().map(|f| f.name.clone()).collect(),
            reader_name,
            writer_fields,
            resolved_fields,
        });

        Ok(Resolution::Record(idx))
    }
}

fn resolve_enum(writer: &EnumSchema, reader: &EnumSchema) -> Result<Resolution, SchemaError> {
    if !(writer.name == reader.name
        || writer.fullname() == reader.fullname()
        || reader.aliases.iter().any(|a| *a == writer.name || *a == writer.fullname()))
    {
        return Err(SchemaError::IncompatibleSchema(format!(
            "Enum '{}' cannot be read as '{}'",
            writer.fullname(),
            reader.fullname()
        )));
    }

    let fallback = reader
        .default
        .as_ref()
        .and_then(|d| reader.symbol_index(d).map(|i| (i as i32, d.clone())));

    let table = writer
        .symbols
        .iter()
        .map(|symbol| match reader.symbol_index(symbol) {
            Some(i) => Ok((i as i32, symbol.clone())),
            None => fallback.clone().ok_or_else(|| {
                SchemaError::IncompatibleSchema(format!(
                    "Symbol '{}' of enum '{}' is unknown to the reader, which has no default",
                    symbol,
                    writer.fullname()
                ))
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Resolution::Enum(table))
}

fn deref<'a>(
    context: &'a SchemaResolutionContext,
    schema: &'a AvroSchema,
) -> Result<&'a AvroSchema, SchemaError> {
    context.deref(schema).ok_or_else(|| {
        SchemaError::InvalidSchema(format!(
            "Unresolved named type reference: '{}'",
            schema.name().unwrap_or_default()
        ))
    })
}

/// Prefix an incompatibility with where it was found.
fn within(location: String) -> impl FnOnce(SchemaError) -> SchemaError {
    move |err| match err {
        SchemaError::IncompatibleSchema(msg) => {
            SchemaError::IncompatibleSchema(format!("{}: {}", location, msg))
        }
        other => other,
    }
}

fn describe(schema: &AvroSchema) -> String {
    match schema.fullname() {
        Some(name) => format!("{} '{}'", schema.type_name(), name),
        None => schema.type_name().to_string(),
    }
}

fn name_mismatch(writer: &AvroSchema, reader: &AvroSchema) -> SchemaError {
    SchemaError::IncompatibleSchema(format!(
        "{} cannot be read as {}",
        describe(writer),
        describe(reader)
    ))
}

/// Named types match on unqualified name, full name, or a reader alias.
fn names_match(writer: &AvroSchema, reader: &AvroSchema) -> bool {
    let (Some(w_name), Some(r_name)) = (writer.name(), reader.name()) else {
        return false;
    };
    let w_full = writer.fullname().unwrap_or_default();
    w_name == r_name
        || Some(&w_full) == reader.fullname().as_ref()
        || reader
            .aliases()
            .iter()
            .any(|a| a == w_name || *a == w_full)
}

fn record_names_match(writer: &RecordSchema, reader: &RecordSchema) -> bool {
    writer.name == reader.name
        || writer.fullname() == reader.fullname()
        || reader
            .aliases
            .iter()
            .any(|a| *a == writer.name || *a == writer.fullname())
}

/// Same schema kind, and for named types the same name.
fn same_kind(writer: &AvroSchema, reader: &AvroSchema) -> bool {
    discriminant(writer) == discriminant(reader) && (!writer.is_named() || names_match(writer, reader))
}

/// Convert a JSON default value to an AvroValue for `schema`.
///
/// Follows the Avro rules for default values: a union default belongs to
/// the first branch, and bytes/fixed defaults are strings whose code points
/// are the byte values.
///
/// Nesting, counting record defaults pulled in for absent fields, stops at
/// the same 128 levels serde_json allows while parsing.
pub fn json_to_avro_value(
    json: &Value,
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, SchemaError> {
    default_value(json, schema, context, 0)
}

const MAX_DEFAULT_DEPTH: usize = 128;

fn default_value(
    json: &Value,
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
    depth: usize,
) -> Result<AvroValue, SchemaError> {
    if depth > MAX_DEFAULT_DEPTH {
        return Err(SchemaError::InvalidSchema(format!(
            "Default nests deeper than {} levels",
            MAX_DEFAULT_DEPTH
        )));
    }
    let depth = depth + 1;
    let invalid = |what: &str| {
        SchemaError::InvalidSchema(format!("Cannot use {} as {} default", json, what))
    };

    match (json, schema) {
        (Value::Null, AvroSchema::Null) => Ok(AvroValue::Null),
        (Value::Bool(b), AvroSchema::Boolean) => Ok(AvroValue::Boolean(*b)),
        (Value::Number(n), AvroSchema::Int) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(AvroValue::Int)
            .ok_or_else(|| invalid("int")),
        (Value::Number(n), AvroSchema::Long) => {
            n.as_i64().map(AvroValue::Long).ok_or_else(|| invalid("long"))
        }
        (Value::Number(n), AvroSchema::Float) => n
            .as_f64()
            .map(|v| AvroValue::Float(v as f32))
            .ok_or_else(|| invalid("float")),
        (Value::Number(n), AvroSchema::Double) => {
            n.as_f64().map(AvroValue::Double).ok_or_else(|| invalid("double"))
        }
        (Value::String(s), AvroSchema::String) => Ok(AvroValue::String(s.clone())),
        (Value::String(s), AvroSchema::Bytes) => {
            code_points_to_bytes(s).map(AvroValue::Bytes).ok_or_else(|| invalid("bytes"))
        }
        (Value::String(s), AvroSchema::Fixed(fixed)) => match code_points_to_bytes(s) {
            Some(bytes) if bytes.len() == fixed.size => Ok(AvroValue::Fixed(bytes)),
            _ => Err(invalid(&format!("fixed({})", fixed.size))),
        },
        (Value::String(s), AvroSchema::Enum(enum_schema)) => enum_schema
            .symbol_index(s)
            .map(|i| AvroValue::Enum(i as i32, s.clone()))
            .ok_or_else(|| invalid(&format!("enum '{}'", enum_schema.name))),
        (Value::Array(items), AvroSchema::Array(item_schema)) => items
            .iter()
            .map(|item| default_value(item, item_schema, context, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(AvroValue::Array),
        (Value::Object(obj), AvroSchema::Map(value_schema)) => obj
            .iter()
            .map(|(k, v)| Ok((k.clone(), default_value(v, value_schema, context, depth)?)))
            .collect::<Result<Vec<_>, _>>()
            .map(AvroValue::Map),
        (Value::Object(obj), AvroSchema::Record(record)) => record
            .fields
            .iter()
            .map(|field| {
                let value = match obj.get(&field.name).or(field.default.as_ref()) {
                    Some(v) => default_value(v, &field.schema, context, depth)?,
                    None => {
                        return Err(SchemaError::InvalidSchema(format!(
                            "Default for record '{}' lacks field '{}'",
                            record.name, field.name
                        )))
                    }
                };
                Ok((field.name.clone(), value))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AvroValue::Record),
        (json, AvroSchema::Union(branches)) => {
            let first = branches
                .first()
                .ok_or_else(|| SchemaError::InvalidSchema("Empty union".to_string()))?;
            let value = default_value(json, first, context, depth)?;
            Ok(AvroValue::Union(0, Box::new(value)))
        }
        (json, AvroSchema::Named(name)) => {
            let resolved = context.get(name).ok_or_else(|| {
                SchemaError::InvalidSchema(format!("Unresolved named type reference: '{}'", name))
            })?;
            default_value(json, resolved, context, depth)
        }
        (_, schema) => Err(invalid(schema.type_name())),
    }
}

fn code_points_to_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::varint::encode_zigzag;
    use serde_json::json;

    fn schema(json: &str) -> Schema {
        Schema::parse(json).unwrap()
    }

    fn record(name: &str, fields: &str) -> Schema {
        schema(&format!(
            r#"{{"type": "record", "name": "{}", "fields": {}}}"#,
            name, fields
        ))
    }

    // ========================================================================
    // TypePromotion tests
    // ========================================================================

    #[test]
    fn test_type_promotion_lattice() {
        assert_eq!(
            TypePromotion::from_schemas(&AvroSchema::Int, &AvroSchema::Int).unwrap(),
            None
        );
        assert_eq!(
            TypePromotion::from_schemas(&AvroSchema::Int, &AvroSchema::Long).unwrap(),
            Some(TypePromotion::IntToLong)
        );
        assert_eq!(
            TypePromotion::from_schemas(&AvroSchema::Long, &AvroSchema::Double).unwrap(),
            Some(TypePromotion::LongToDouble)
        );
        assert_eq!(
            TypePromotion::from_schemas(&AvroSchema::Bytes, &AvroSchema::String).unwrap(),
            Some(TypePromotion::BytesToString)
        );
    }

    #[test]
    fn test_type_promotion_incompatible() {
        assert!(TypePromotion::from_schemas(&AvroSchema::Int, &AvroSchema::String).is_err());
        assert!(TypePromotion::from_schemas(&AvroSchema::Long, &AvroSchema::Int).is_err());
        assert!(TypePromotion::from_schemas(&AvroSchema::Double, &AvroSchema::Float).is_err());
    }

    #[test]
    fn test_apply_promotion() {
        assert_eq!(
            apply_promotion(AvroValue::Int(42), TypePromotion::IntToDouble).unwrap(),
            AvroValue::Double(42.0)
        );
        assert_eq!(
            apply_promotion(AvroValue::Float(3.14), TypePromotion::FloatToDouble).unwrap(),
            AvroValue::Double(3.14f32 as f64)
        );
        assert_eq!(
            apply_promotion(AvroValue::String("hi".into()), TypePromotion::StringToBytes).unwrap(),
            AvroValue::Bytes(b"hi".to_vec())
        );
        assert!(apply_promotion(AvroValue::Long(1), TypePromotion::IntToLong).is_err());
    }

    // ========================================================================
    // Record plans
    // ========================================================================

    #[test]
    fn test_resolution_identical_schemas() {
        let s = record("Test", r#"[{"name": "id", "type": "long"}, {"name": "name", "type": "string"}]"#);
        let resolution = ReaderWriterResolution::new(&s, &s).unwrap();
        let plan = resolution.root_record().unwrap();

        assert_eq!(plan.resolved_fields.len(), 2);
        assert!(plan.writer_fields_to_skip().is_empty());
        assert!(!plan.needs_reordering());
        assert!(!plan.needs_promotions());
        assert!(!plan.needs_defaults());
    }

    #[test]
    fn test_resolution_field_reordering() {
        let writer = record("Test", r#"[{"name": "name", "type": "string"}, {"name": "id", "type": "long"}]"#);
        let reader = record("Test", r#"[{"name": "id", "type": "long"}, {"name": "name", "type": "string"}]"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        assert!(resolution.root_record().unwrap().needs_reordering());

        let mut data = encode_zigzag(5);
        data.extend_from_slice(b"Alice");
        data.extend_from_slice(&encode_zigzag(42));

        let mut cursor = data.as_slice();
        assert_eq!(
            resolution.decode(&mut cursor).unwrap(),
            AvroValue::Record(vec![
                ("id".to_string(), AvroValue::Long(42)),
                ("name".to_string(), AvroValue::String("Alice".to_string())),
            ])
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_resolution_promotion_and_default() {
        let writer = record("Test", r#"[{"name": "value", "type": "int"}]"#);
        let reader = record(
            "Test",
            r#"[{"name": "value", "type": "long"}, {"name": "label", "type": "string", "default": "unknown"}]"#,
        );
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        let plan = resolution.root_record().unwrap();
        assert!(plan.needs_promotions());
        assert!(plan.needs_defaults());

        let data = encode_zigzag(42);
        let mut cursor = data.as_slice();
        assert_eq!(
            resolution.decode(&mut cursor).unwrap(),
            AvroValue::Record(vec![
                ("value".to_string(), AvroValue::Long(42)),
                ("label".to_string(), AvroValue::String("unknown".to_string())),
            ])
        );
    }

    #[test]
    fn test_resolution_missing_default() {
        let writer = record("Test", r#"[{"name": "id", "type": "long"}]"#);
        let reader = record("Test", r#"[{"name": "id", "type": "long"}, {"name": "name", "type": "string"}]"#);
        assert!(matches!(
            ReaderWriterResolution::new(&writer, &reader),
            Err(SchemaError::MissingDefault(path)) if path == "Test.name"
        ));
    }

    #[test]
    fn test_reader_with_invalid_default_never_resolves() {
        // A mistyped default is caught when the reader schema is built
        let reader = Schema::parse(
            r#"{"type": "record", "name": "Test", "fields": [{"name": "n", "type": "int", "default": "zero"}]}"#,
        );
        assert!(matches!(reader, Err(SchemaError::InvalidSchema(_))));
    }

    #[test]
    fn test_resolution_skips_writer_only_fields() {
        let writer = record(
            "Test",
            r#"[{"name": "id", "type": "long"}, {"name": "extra", "type": {"type": "array", "items": "string"}}]"#,
        );
        let reader = record("Test", r#"[{"name": "id", "type": "long"}]"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        assert_eq!(resolution.root_record().unwrap().writer_fields_to_skip(), vec![1]);

        let mut data = encode_zigzag(42);
        data.extend_from_slice(b"\x02\x0eignored\x00");
        let mut cursor = data.as_slice();
        assert_eq!(
            resolution.decode(&mut cursor).unwrap(),
            AvroValue::Record(vec![("id".to_string(), AvroValue::Long(42))])
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_resolution_field_alias() {
        let writer = record("Test", r#"[{"name": "user_id", "type": "long"}]"#);
        let reader = record("Test", r#"[{"name": "id", "type": "long", "aliases": ["user_id"]}]"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        match &resolution.root_record().unwrap().resolved_fields[0] {
            ResolvedField::Present { writer_index, .. } => assert_eq!(*writer_index, 0),
            other => panic!("Expected Present field, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_record_name_mismatch() {
        let writer = record("A", r#"[]"#);
        let reader = record("B", r#"[]"#);
        assert!(matches!(
            ReaderWriterResolution::new(&writer, &reader),
            Err(SchemaError::IncompatibleSchema(_))
        ));

        let aliased = schema(r#"{"type": "record", "name": "B", "aliases": ["A"], "fields": []}"#);
        assert!(ReaderWriterResolution::new(&writer, &aliased).is_ok());
    }

    // ========================================================================
    // Enums and unions
    // ========================================================================

    #[test]
    fn test_enum_symbol_remapping_and_default() {
        let writer = schema(r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#);
        let reader = schema(r#"{"type": "enum", "name": "E", "symbols": ["C", "A", "OTHER"], "default": "OTHER"}"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();

        let decode = |bytes: &[u8]| {
            let mut cursor = bytes;
            resolution.decode(&mut cursor).unwrap()
        };
        assert_eq!(decode(&[0x00]), AvroValue::Enum(1, "A".to_string()));
        assert_eq!(decode(&[0x02]), AvroValue::Enum(2, "OTHER".to_string()));
        assert_eq!(decode(&[0x04]), AvroValue::Enum(0, "C".to_string()));
    }

    #[test]
    fn test_enum_unknown_symbol_without_default() {
        let writer = schema(r#"{"type": "enum", "name": "E", "symbols": ["A", "B"]}"#);
        let reader = schema(r#"{"type": "enum", "name": "E", "symbols": ["A"]}"#);
        assert!(matches!(
            ReaderWriterResolution::new(&writer, &reader),
            Err(SchemaError::IncompatibleSchema(_))
        ));
    }

    #[test]
    fn test_writer_union_all_branches_must_resolve() {
        let writer = schema(r#"["null", "string"]"#);
        let reader = schema(r#""string""#);
        assert!(matches!(
            ReaderWriterResolution::new(&writer, &reader),
            Err(SchemaError::IncompatibleSchema(_))
        ));

        let reader = schema(r#"["string", "null"]"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        let mut cursor: &[u8] = &[0x00];
        assert_eq!(
            resolution.decode(&mut cursor).unwrap(),
            AvroValue::Union(1, Box::new(AvroValue::Null))
        );
    }

    #[test]
    fn test_plain_writer_into_reader_union_prefers_exact_kind() {
        let writer = schema(r#""long""#);
        let reader = schema(r#"["null", "double", "long"]"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        let mut cursor: &[u8] = &[0x06];
        assert_eq!(
            resolution.decode(&mut cursor).unwrap(),
            AvroValue::Union(2, Box::new(AvroValue::Long(3)))
        );

        let reader = schema(r#"["null", "double"]"#);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        let mut cursor: &[u8] = &[0x06];
        assert_eq!(
            resolution.decode(&mut cursor).unwrap(),
            AvroValue::Union(1, Box::new(AvroValue::Double(3.0)))
        );
    }

    #[test]
    fn test_recursive_records_resolve() {
        let json = r#"{"type": "record", "name": "Node", "fields": [
            {"name": "value", "type": "int"},
            {"name": "next", "type": ["null", "Node"]}
        ]}"#;
        let writer = schema(json);
        let reader = schema(json);
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        assert_eq!(resolution.records().len(), 1);

        // value=1, next -> {value=2, next=null}
        let mut cursor: &[u8] = &[0x02, 0x02, 0x04, 0x00];
        let value = resolution.decode(&mut cursor).unwrap();
        assert_eq!(
            value.field("next").and_then(|n| n.field("value")),
            Some(&AvroValue::Int(2))
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_failed_union_attempt_rolls_back_records() {
        let writer = record("Point", r#"[{"name": "x", "type": "int"}]"#);
        let reader = schema(
            r#"[
                {"type": "record", "name": "Point", "fields": [{"name": "x", "type": "string"}]},
                {"type": "record", "name": "Other", "aliases": ["Point"], "fields": [{"name": "x", "type": "long"}]}
            ]"#,
        );
        let resolution = ReaderWriterResolution::new(&writer, &reader).unwrap();
        assert_eq!(resolution.records().len(), 1);
        assert!(matches!(resolution.root(), Resolution::ReaderUnion { branch: 1, .. }));
    }

    // ========================================================================
    // json_to_avro_value tests
    // ========================================================================

    #[test]
    fn test_json_to_avro_primitives() {
        let ctx = SchemaResolutionContext::new();
        assert_eq!(
            json_to_avro_value(&json!(null), &AvroSchema::Null, &ctx).unwrap(),
            AvroValue::Null
        );
        assert_eq!(
            json_to_avro_value(&json!(42), &AvroSchema::Int, &ctx).unwrap(),
            AvroValue::Int(42)
        );
        assert_eq!(
            json_to_avro_value(&json!(3.5), &AvroSchema::Float, &ctx).unwrap(),
            AvroValue::Float(3.5)
        );
        assert_eq!(
            json_to_avro_value(&json!("\u{00ff}a"), &AvroSchema::Bytes, &ctx).unwrap(),
            AvroValue::Bytes(vec![0xFF, b'a'])
        );
        assert!(json_to_avro_value(&json!(4294967296i64), &AvroSchema::Int, &ctx).is_err());
    }

    #[test]
    fn test_json_to_avro_union_uses_first_branch() {
        let ctx = SchemaResolutionContext::new();
        let union = AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Long]);
        assert_eq!(
            json_to_avro_value(&json!(null), &union, &ctx).unwrap(),
            AvroValue::Union(0, Box::new(AvroValue::Null))
        );
        assert!(json_to_avro_value(&json!(5), &union, &ctx).is_err());
    }

    #[test]
    fn test_json_to_avro_array() {
        let ctx = SchemaResolutionContext::new();
        let result = json_to_avro_value(
            &json!([1, 2, 3]),
            &AvroSchema::Array(Box::new(AvroSchema::Int)),
            &ctx,
        )
        .unwrap();
        assert_eq!(
            result,
            AvroValue::Array(vec![AvroValue::Int(1), AvroValue::Int(2), AvroValue::Int(3)])
        );
    }
}
