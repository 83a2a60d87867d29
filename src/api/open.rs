//! Constructors taking schema JSON text.
//!
//! These are the entry points for callers that hold schemas as text, such as
//! a CLI or a service layer. Schemas are parsed in permissive mode.

use crate::error::MarshalError;
use crate::reader::{DatumReader, ReaderConfig};
use crate::schema::Schema;
use crate::writer::DatumWriter;

use super::encoder::DatumEncoder;

/// Create a reader for values written with `schema`.
///
/// # Errors
/// `MarshalError::Schema` when the schema text does not parse.
pub fn new_reader(schema: &str) -> Result<DatumReader, MarshalError> {
    Ok(DatumReader::new(Schema::parse(schema)?))
}

/// Create a reader that projects `writer_schema` data into `reader_schema`.
pub fn new_projecting_reader(
    writer_schema: &str,
    reader_schema: &str,
) -> Result<DatumReader, MarshalError> {
    let config = ReaderConfig::new().with_reader_schema(Schema::parse(reader_schema)?);
    DatumReader::with_config(Schema::parse(writer_schema)?, config)
}

/// Create a writer for `schema`.
///
/// # Errors
/// `MarshalError::Schema` when the schema text does not parse.
pub fn new_writer(schema: &str) -> Result<DatumWriter, MarshalError> {
    Ok(DatumWriter::new(Schema::parse(schema)?))
}

/// Create an encoder for `writer_schema`, optionally projecting reads into `reader_schema`.
///
/// # Errors
/// `MarshalError::Schema` when either schema does not parse or the schemas
/// are incompatible.
pub fn new_encoder(
    writer_schema: &str,
    reader_schema: Option<&str>,
) -> Result<DatumEncoder, MarshalError> {
    let reader = reader_schema.map(Schema::parse).transpose()?;
    DatumEncoder::new(Schema::parse(writer_schema)?, reader)
}
