//! Schema-free varint helpers.

use crate::error::DecodeError;
use crate::reader::varint::{decode_zigzag, encode_zigzag};

/// Encode `value` as a zigzag varint, as Avro writes `int` and `long`.
///
/// # Example
/// ```
/// use avro_marshal::encode_raw_long;
///
/// assert_eq!(encode_raw_long(10000), vec![0xA0, 0x9C, 0x01]);
/// ```
pub fn encode_raw_long(value: i64) -> Vec<u8> {
    encode_zigzag(value)
}

/// Decode a zigzag varint from the front of `data`, returning it with the
/// bytes consumed.
///
/// # Errors
/// - `DecodeError::TruncatedInput` if `data` ends inside the varint
/// - `DecodeError::MalformedVarint` if the varint is longer than 10 bytes or
///   overflows 64 bits
pub fn decode_raw_long(data: &[u8]) -> Result<(i64, usize), DecodeError> {
    let mut cursor = data;
    let value = decode_zigzag(&mut cursor)?;
    Ok((value, data.len() - cursor.len()))
}
