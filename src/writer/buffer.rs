//! Output sinks for the encoder.
//!
//! [`ByteSink`] is the only thing the encoder writes through. It carries the
//! Avro primitive writers as provided methods, so a sink only has to accept
//! raw bytes. [`GrowableBuffer`] is a bounded sink: it reports
//! `InsufficientSpace` instead of reallocating mid-value, and the writer
//! doubles it and encodes the value again from the start.

use crate::error::EncodeError;
use crate::reader::varint::{encode_varint_into, zigzag_encode, MAX_VARINT_LEN};

/// Destination for encoded bytes.
pub trait ByteSink {
    /// Append raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError>;

    /// Append one byte.
    fn write_byte(&mut self, byte: u8) -> Result<(), EncodeError> {
        self.write_bytes(&[byte])
    }

    /// Append an unsigned varint.
    fn write_varint(&mut self, value: u64) -> Result<(), EncodeError> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_varint_into(value, &mut buf);
        self.write_bytes(&buf[..len])
    }

    /// Append a zigzag varint (Avro `int`/`long`).
    fn write_long(&mut self, value: i64) -> Result<(), EncodeError> {
        self.write_varint(zigzag_encode(value))
    }

    /// Append a little-endian IEEE 754 single.
    fn write_float(&mut self, value: f32) -> Result<(), EncodeError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian IEEE 754 double.
    fn write_double(&mut self, value: f64) -> Result<(), EncodeError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a length prefix followed by the bytes (Avro `bytes`/`string`).
    fn write_length_prefixed(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_long(bytes.len() as i64)?;
        self.write_bytes(bytes)
    }
}

/// Unbounded sink.
impl ByteSink for Vec<u8> {
    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Fixed-capacity scratch buffer that only grows when asked to.
///
/// Writes past the logical capacity fail with
/// [`EncodeError::InsufficientSpace`] and leave the already written prefix
/// in place; [`grow`](Self::grow) doubles the capacity.
#[derive(Debug, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl GrowableBuffer {
    /// Create a buffer with the given logical capacity (at least one byte).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Logical capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes written since the last reset.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes written since the last reset.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Rewind to empty, keeping the capacity.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Double the capacity and rewind.
    pub fn grow(&mut self) {
        self.capacity = self.capacity.saturating_mul(2);
        self.data.clear();
        self.data.reserve(self.capacity);
    }

    /// Copy out the written bytes and rewind.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        let bytes = self.data.clone();
        self.reset();
        bytes
    }
}

impl ByteSink for GrowableBuffer {
    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        if bytes.len() > self.capacity - self.data.len() {
            return Err(EncodeError::InsufficientSpace);
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }
}
