//! Bidirectional encoder over one writer schema.

use crate::error::MarshalError;
use crate::native::NativeValue;
use crate::reader::{AvroValue, DatumReader, ReaderConfig};
use crate::schema::Schema;
use crate::writer::{DatumWriter, WriterConfig};

/// Reads and writes values of one writer schema.
///
/// Writes always produce bytes in the writer schema. Reads decode writer
/// bytes, projected into the reader schema when one is given.
///
/// # Example
/// ```
/// use avro_marshal::{AvroValue, DatumEncoder, Schema};
/// use serde_json::json;
///
/// let writer = Schema::parse(r#""int""#).unwrap();
/// let reader = Schema::parse(r#""long""#).unwrap();
/// let mut encoder = DatumEncoder::new(writer, Some(reader)).unwrap();
///
/// let bytes = encoder.write(&json!(21)).unwrap();
/// assert_eq!(encoder.read(&bytes).unwrap(), vec![AvroValue::Long(21)]);
/// ```
#[derive(Debug)]
pub struct DatumEncoder {
    writer: DatumWriter,
    reader: DatumReader,
}

impl DatumEncoder {
    /// Create an encoder for `writer`, optionally projecting reads into `reader`.
    ///
    /// # Errors
    /// `MarshalError::Schema` when `reader` cannot read `writer` data.
    pub fn new(writer: Schema, reader: Option<Schema>) -> Result<Self, MarshalError> {
        Self::with_configs(writer, reader, WriterConfig::default(), ReaderConfig::default())
    }

    /// Create an encoder with explicit writer and reader configurations.
    ///
    /// `reader` takes precedence over `reader_config.reader_schema`.
    pub fn with_configs(
        writer: Schema,
        reader: Option<Schema>,
        writer_config: WriterConfig,
        mut reader_config: ReaderConfig,
    ) -> Result<Self, MarshalError> {
        if let Some(reader) = reader {
            reader_config.reader_schema = Some(reader);
        }
        Ok(Self {
            reader: DatumReader::with_config(writer.clone(), reader_config)?,
            writer: DatumWriter::with_config(writer, writer_config)?,
        })
    }

    /// Encode one value in the writer schema.
    pub fn write(&mut self, value: &dyn NativeValue) -> Result<Vec<u8>, MarshalError> {
        self.writer.write(value)
    }

    /// Decode every value in `data`.
    pub fn read(&mut self, data: &[u8]) -> Result<Vec<AvroValue>, MarshalError> {
        self.reader.read(data)
    }

    /// Decode the first value in `data`, returning it with the bytes consumed.
    pub fn read_one(&self, data: &[u8]) -> Result<(AvroValue, usize), MarshalError> {
        self.reader.read_one(data)
    }

    /// Encode a bare zigzag varint.
    pub fn write_long(&mut self, value: i64) -> Result<Vec<u8>, MarshalError> {
        self.writer.write_long(value)
    }

    /// Decode a bare zigzag varint, returning it with the bytes consumed.
    pub fn read_long(&self, data: &[u8]) -> Result<(i64, usize), MarshalError> {
        self.reader.read_long(data)
    }

    /// The writer schema.
    pub fn writer_schema(&self) -> &Schema {
        self.writer.schema()
    }

    /// The reader schema, if reads are projected.
    pub fn reader_schema(&self) -> Option<&Schema> {
        self.reader.reader_schema()
    }

    /// Access the underlying reader, e.g. for recorded errors.
    pub fn reader(&self) -> &DatumReader {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeObject;

    const PERSON: &str = r#"{"type": "record", "name": "Person", "fields": [
        {"name": "name", "type": "string"},
        {"name": "age", "type": "int"}
    ]}"#;

    #[test]
    fn test_write_then_read_same_schema() {
        let mut encoder = DatumEncoder::new(Schema::parse(PERSON).unwrap(), None).unwrap();
        let person = NativeObject::map([("name", "Larry".into()), ("age", 21.into())]);

        let bytes = encoder.write(&person).unwrap();
        assert_eq!(bytes, b"\nLarry*");

        let (value, consumed) = encoder.read_one(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(value.field("age"), Some(&AvroValue::Int(21)));
        assert!(encoder.reader_schema().is_none());
    }

    #[test]
    fn test_writes_ignore_reader_schema() {
        let reader = Schema::parse(
            r#"{"type": "record", "name": "Person", "fields": [
                {"name": "age", "type": "long"},
                {"name": "email", "type": ["null", "string"], "default": null}
            ]}"#,
        )
        .unwrap();
        let mut encoder = DatumEncoder::new(Schema::parse(PERSON).unwrap(), Some(reader)).unwrap();
        let person = NativeObject::map([("name", "Larry".into()), ("age", 21.into())]);

        let bytes = encoder.write(&person).unwrap();
        assert_eq!(bytes, b"\nLarry*");
        assert_eq!(
            encoder.read(&bytes).unwrap(),
            vec![AvroValue::Record(vec![
                ("age".to_string(), AvroValue::Long(21)),
                (
                    "email".to_string(),
                    AvroValue::Union(0, Box::new(AvroValue::Null))
                ),
            ])]
        );
    }

    #[test]
    fn test_raw_longs() {
        let mut encoder = DatumEncoder::new(Schema::parse(r#""null""#).unwrap(), None).unwrap();
        let bytes = encoder.write_long(-64).unwrap();
        assert_eq!(encoder.read_long(&bytes).unwrap(), (-64, bytes.len()));
    }
}
