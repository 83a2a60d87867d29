//! Avro schema types and parsing.
//!
//! This module defines the Avro schema type system (primitives, complex
//! types, named types and links), JSON parsing, named type resolution, and
//! reader/writer schema resolution.

mod parser;
mod reader_writer_resolution;
mod resolution;
mod types;

pub use parser::{parse_schema, parse_schema_with_options, SchemaParser};
pub use reader_writer_resolution::{
    apply_promotion, json_to_avro_value, ReaderWriterResolution, RecordResolution, Resolution,
    ResolvedField, TypePromotion, WriterFieldAction,
};
pub use resolution::{Schema, SchemaResolutionContext};
pub use types::*;
