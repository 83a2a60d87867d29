//! Value reader over in-memory byte spans.
//!
//! A `DatumReader` decodes Avro binary values laid back to back in a byte
//! span. Without a reader schema values are decoded exactly as written; with
//! one, a [`ReaderWriterResolution`] is built once at construction and every
//! value is projected through it.
//!
//! There is no framing between values, so a value that fails to decode ends
//! the read: the position of the next value is unknown.

use crate::error::{DecodeError, MarshalError, ReadError};
use crate::schema::{ReaderWriterResolution, Schema};

use super::decode::{decode_value_in, AvroValue, DecodeContext, DecodeLimits};
use super::varint::decode_zigzag;

/// Error handling mode for the DatumReader.
///
/// Determines how `read` responds to a value that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail immediately on any error.
    #[default]
    Strict,
    /// Return the values decoded before the failure and record the error.
    ///
    /// Recorded errors can be retrieved via `errors()`.
    StopAtError,
}

/// Configuration for the DatumReader.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Optional reader schema for schema evolution (default: None).
    pub reader_schema: Option<Schema>,
    /// Error handling mode (default: strict).
    pub error_mode: ErrorMode,
    /// Nesting and item bounds applied to every value.
    pub limits: DecodeLimits,
}

impl ReaderConfig {
    /// Create a new ReaderConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reader schema for schema evolution.
    pub fn with_reader_schema(mut self, schema: Schema) -> Self {
        self.reader_schema = Some(schema);
        self
    }

    /// Set the error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Deepest nesting of records, arrays, maps and unions a value may have.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.limits.max_depth = depth;
        self
    }

    /// Most entries a single array or map may hold.
    pub fn with_max_items(mut self, items: usize) -> Self {
        self.limits.max_items = items;
        self
    }
}

/// Decodes values written with a writer schema.
///
/// # Example
/// ```
/// use avro_marshal::{AvroValue, DatumReader, Schema};
///
/// let schema = Schema::parse(r#""long""#).unwrap();
/// let mut reader = DatumReader::new(schema);
/// let values = reader.read(&[0x02, 0x04]).unwrap();
/// assert_eq!(values, vec![AvroValue::Long(1), AvroValue::Long(2)]);
/// ```
#[derive(Debug)]
pub struct DatumReader {
    schema: Schema,
    projection: Option<ReaderWriterResolution>,
    config: ReaderConfig,
    errors: Vec<ReadError>,
}

impl DatumReader {
    /// Create a reader that decodes values exactly as written.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            projection: None,
            config: ReaderConfig::default(),
            errors: Vec::new(),
        }
    }

    /// Create a reader with a custom configuration.
    ///
    /// # Errors
    /// `MarshalError::Schema` when the configured reader schema cannot read
    /// data written with `schema`.
    pub fn with_config(schema: Schema, config: ReaderConfig) -> Result<Self, MarshalError> {
        let projection = config
            .reader_schema
            .as_ref()
            .map(|reader| ReaderWriterResolution::new(&schema, reader))
            .transpose()?;

        Ok(Self {
            schema,
            projection,
            config,
            errors: Vec::new(),
        })
    }

    /// Decode every value in `data`.
    ///
    /// # Errors
    /// In strict mode, the first failure as `MarshalError::Decode` carrying
    /// the index of the failing value and the offset it started at. In
    /// stop-at-error mode failures are recorded instead, see [`errors`](Self::errors).
    pub fn read(&mut self, data: &[u8]) -> Result<Vec<AvroValue>, MarshalError> {
        let mut values = Vec::new();
        let mut cursor = data;

        while !cursor.is_empty() {
            let offset = data.len() - cursor.len();
            match self.decode_next(&mut cursor) {
                Ok(value) => values.push(value),
                Err(source) => match self.config.error_mode {
                    ErrorMode::Strict => {
                        return Err(MarshalError::Decode {
                            record_index: values.len(),
                            offset,
                            source,
                        })
                    }
                    ErrorMode::StopAtError => {
                        self.errors
                            .push(ReadError::from_decode(&source, values.len(), offset));
                        break;
                    }
                },
            }
        }

        Ok(values)
    }

    /// Decode the first value in `data`, returning it with the bytes consumed.
    pub fn read_one(&self, data: &[u8]) -> Result<(AvroValue, usize), MarshalError> {
        let mut cursor = data;
        let value = self.decode_one(&mut cursor).map_err(|source| MarshalError::Decode {
            record_index: 0,
            offset: 0,
            source,
        })?;
        Ok((value, data.len() - cursor.len()))
    }

    /// Iterate over the values in `data`, one pass, stopping after the first error.
    pub fn iter<'a>(&'a self, data: &'a [u8]) -> ValueIter<'a> {
        ValueIter {
            reader: self,
            data,
            cursor: data,
            index: 0,
            failed: false,
        }
    }

    /// Decode a bare zigzag varint, returning it with the bytes consumed.
    pub fn read_long(&self, data: &[u8]) -> Result<(i64, usize), MarshalError> {
        let mut cursor = data;
        let value = decode_zigzag(&mut cursor)?;
        Ok((value, data.len() - cursor.len()))
    }

    /// The writer schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The reader schema, if one was configured.
    pub fn reader_schema(&self) -> Option<&Schema> {
        self.config.reader_schema.as_ref()
    }

    /// Get the error mode being used.
    pub fn error_mode(&self) -> ErrorMode {
        self.config.error_mode
    }

    /// Errors recorded in stop-at-error mode.
    pub fn errors(&self) -> &[ReadError] {
        &self.errors
    }

    /// Forget recorded errors.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    fn decode_one(&self, cursor: &mut &[u8]) -> Result<AvroValue, DecodeError> {
        let limits = self.config.limits;
        match &self.projection {
            Some(projection) => projection.decode_with_limits(cursor, limits),
            None => {
                let ctx = DecodeContext::new(self.schema.context()).with_limits(limits);
                decode_value_in(cursor, self.schema.root(), &ctx)
            }
        }
    }

    /// Decode a value that is followed by more input.
    ///
    /// A value that takes no bytes (`null`, an empty record) cannot be
    /// followed by anything, or the span would split into endless values.
    fn decode_next(&self, cursor: &mut &[u8]) -> Result<AvroValue, DecodeError> {
        let before = cursor.len();
        let value = self.decode_one(cursor)?;
        if cursor.len() == before && !cursor.is_empty() {
            return Err(DecodeError::InvalidData(format!(
                "{} trailing bytes after a zero-width value",
                before
            )));
        }
        Ok(value)
    }
}

/// Iterator returned by [`DatumReader::iter`].
pub struct ValueIter<'a> {
    reader: &'a DatumReader,
    data: &'a [u8],
    cursor: &'a [u8],
    index: usize,
    failed: bool,
}

impl Iterator for ValueIter<'_> {
    type Item = Result<AvroValue, MarshalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }

        let offset = self.data.len() - self.cursor.len();
        let item = self
            .reader
            .decode_next(&mut self.cursor)
            .map_err(|source| MarshalError::Decode {
                record_index: self.index,
                offset,
                source,
            });
        self.failed = item.is_err();
        self.index += 1;
        Some(item)
    }
}
