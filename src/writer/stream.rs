//! Value writer that owns a reusable output buffer.
//!
//! `DatumWriter` encodes one value per call. Encoding goes into a bounded
//! [`GrowableBuffer`]; when the value does not fit, the buffer is doubled and
//! the whole value is encoded again, so a single call never leaves partial
//! output behind.

use tracing::debug;

use crate::error::{EncodeError, MarshalError};
use crate::native::NativeValue;
use crate::reader::DEFAULT_MAX_DEPTH;
use crate::schema::Schema;

use super::buffer::{ByteSink, GrowableBuffer};
use super::encode::{encode_value, EncodeContext, MissingFieldPolicy};

/// Configuration for the DatumWriter.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Starting buffer capacity in bytes (default: 4096).
    pub initial_buffer_size: usize,
    /// Largest capacity the buffer may grow to (default: unbounded).
    pub max_buffer_size: Option<usize>,
    /// Handling of record fields absent from the value.
    pub missing_fields: MissingFieldPolicy,
    /// Deepest nesting of records, arrays, maps and unions accepted.
    pub max_depth: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 4096,
            max_buffer_size: None,
            missing_fields: MissingFieldPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl WriterConfig {
    /// Create a new WriterConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting buffer capacity.
    pub fn with_initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = size;
        self
    }

    /// Cap buffer growth; values that need more fail with `BufferLimitExceeded`.
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = Some(size);
        self
    }

    /// Set the missing field policy.
    pub fn with_missing_fields(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_fields = policy;
        self
    }

    /// Set the nesting limit; deeper values fail with `DepthLimitExceeded`.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn validate(&self) -> Result<(), MarshalError> {
        if self.initial_buffer_size == 0 {
            return Err(MarshalError::Configuration(
                "initial_buffer_size must be greater than 0".to_string(),
            ));
        }
        if let Some(max) = self.max_buffer_size {
            if max < self.initial_buffer_size {
                return Err(MarshalError::Configuration(format!(
                    "max_buffer_size ({}) is smaller than initial_buffer_size ({})",
                    max, self.initial_buffer_size
                )));
            }
        }
        Ok(())
    }
}

/// Encodes native values against a writer schema.
///
/// # Example
/// ```
/// use avro_marshal::{DatumWriter, NativeObject, Schema};
///
/// let schema = Schema::parse(r#""string""#).unwrap();
/// let mut writer = DatumWriter::new(schema);
/// assert_eq!(writer.write(&NativeObject::from("test")).unwrap(), b"\x08test");
/// ```
#[derive(Debug)]
pub struct DatumWriter {
    schema: Schema,
    buffer: GrowableBuffer,
    config: WriterConfig,
}

impl DatumWriter {
    /// Create a writer with the default configuration.
    pub fn new(schema: Schema) -> Self {
        let config = WriterConfig::default();
        Self {
            schema,
            buffer: GrowableBuffer::with_capacity(config.initial_buffer_size),
            config,
        }
    }

    /// Create a writer with a custom configuration.
    ///
    /// # Errors
    /// `MarshalError::Configuration` for a zero initial buffer size or a
    /// maximum below the initial size.
    pub fn with_config(schema: Schema, config: WriterConfig) -> Result<Self, MarshalError> {
        config.validate()?;
        Ok(Self {
            schema,
            buffer: GrowableBuffer::with_capacity(config.initial_buffer_size),
            config,
        })
    }

    /// Encode one value and return exactly its bytes.
    ///
    /// The buffer is empty again when this returns, whether or not encoding
    /// succeeded.
    pub fn write(&mut self, value: &dyn NativeValue) -> Result<Vec<u8>, MarshalError> {
        let ctx = EncodeContext::new(self.schema.context())
            .with_missing_fields(self.config.missing_fields)
            .with_max_depth(self.config.max_depth);

        loop {
            self.buffer.reset();
            match encode_value(&mut self.buffer, self.schema.root(), value, &ctx) {
                Ok(()) => return Ok(self.buffer.take_bytes()),
                Err(EncodeError::InsufficientSpace) => {
                    grow(&mut self.buffer, self.config.max_buffer_size)?;
                }
                Err(e) => {
                    self.buffer.reset();
                    return Err(e.into());
                }
            }
        }
    }

    /// Encode a bare zigzag varint, independent of the schema.
    pub fn write_long(&mut self, value: i64) -> Result<Vec<u8>, MarshalError> {
        loop {
            self.buffer.reset();
            match self.buffer.write_long(value) {
                Ok(()) => return Ok(self.buffer.take_bytes()),
                Err(EncodeError::InsufficientSpace) => {
                    grow(&mut self.buffer, self.config.max_buffer_size)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The writer schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current buffer capacity in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Get the configuration being used.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}

fn grow(buffer: &mut GrowableBuffer, limit: Option<usize>) -> Result<(), EncodeError> {
    let from = buffer.capacity();
    let to = from.saturating_mul(2);
    if let Some(limit) = limit {
        if to > limit {
            buffer.reset();
            return Err(EncodeError::BufferLimitExceeded { limit });
        }
    }
    debug!(from, to, "growing encode buffer");
    buffer.grow();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeObject;
    use serde_json::json;

    fn string_writer(config: WriterConfig) -> DatumWriter {
        DatumWriter::with_config(Schema::parse(r#""string""#).unwrap(), config).unwrap()
    }

    #[test]
    fn test_writer_config_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.initial_buffer_size, 4096);
        assert_eq!(config.max_buffer_size, None);
        assert_eq!(config.missing_fields, MissingFieldPolicy::UseDefault);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_writer_config_validation() {
        let schema = Schema::parse(r#""int""#).unwrap();
        assert!(matches!(
            DatumWriter::with_config(schema.clone(), WriterConfig::new().with_initial_buffer_size(0)),
            Err(MarshalError::Configuration(_))
        ));
        assert!(matches!(
            DatumWriter::with_config(
                schema,
                WriterConfig::new()
                    .with_initial_buffer_size(64)
                    .with_max_buffer_size(32)
            ),
            Err(MarshalError::Configuration(_))
        ));
    }

    #[test]
    fn test_write_grows_buffer_and_retries() {
        let mut small = string_writer(WriterConfig::new().with_initial_buffer_size(2));
        let mut large = DatumWriter::new(Schema::parse(r#""string""#).unwrap());
        let value = NativeObject::from("x".repeat(100));

        let bytes = small.write(&value).unwrap();
        assert_eq!(bytes, large.write(&value).unwrap());
        assert_eq!(small.buffer_capacity(), 128);
    }

    #[test]
    fn test_write_respects_max_buffer_size() {
        let mut writer = string_writer(
            WriterConfig::new()
                .with_initial_buffer_size(4)
                .with_max_buffer_size(16),
        );
        assert!(writer.write(&NativeObject::from("short")).is_ok());
        assert!(matches!(
            writer.write(&NativeObject::from("x".repeat(40))),
            Err(MarshalError::Encode(EncodeError::BufferLimitExceeded { limit: 16 }))
        ));
        // Still usable after the failure
        assert_eq!(writer.write(&NativeObject::from("ok")).unwrap(), b"\x04ok");
    }

    #[test]
    fn test_write_error_leaves_writer_reusable() {
        let schema = Schema::parse(r#""int""#).unwrap();
        let mut writer = DatumWriter::new(schema);
        assert!(writer.write(&json!("not an int")).is_err());
        assert_eq!(writer.write(&json!(25)).unwrap(), b"2");
    }

    #[test]
    fn test_write_respects_max_depth() {
        let schema = Schema::parse(r#"{"type": "array", "items": {"type": "array", "items": "int"}}"#)
            .unwrap();
        let mut writer =
            DatumWriter::with_config(schema, WriterConfig::new().with_max_depth(2)).unwrap();
        assert_eq!(writer.write(&json!([[1]])).unwrap(), b"\x02\x02\x02\x00\x00");

        let mut tight = DatumWriter::with_config(
            writer.schema().clone(),
            WriterConfig::new().with_max_depth(1),
        )
        .unwrap();
        assert!(matches!(
            tight.write(&json!([[1]])),
            Err(MarshalError::Encode(EncodeError::DepthLimitExceeded { limit: 1 }))
        ));
        // An empty outer array never reaches the inner level
        assert_eq!(tight.write(&json!([])).unwrap(), b"\x00");
    }

    #[test]
    fn test_write_long() {
        let mut writer = string_writer(WriterConfig::new().with_initial_buffer_size(1));
        assert_eq!(writer.write_long(10000).unwrap(), vec![0xA0, 0x9C, 0x01]);
        assert_eq!(writer.write_long(-1).unwrap(), vec![0x01]);
    }
}
