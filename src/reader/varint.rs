//! Zigzag varints, the encoding of `int`, `long`, lengths, block counts
//! and enum and union indices.
//!
//! A varint stores 7 bits per byte, least significant group first, with the
//! high bit set on every byte but the last. Signed values are zigzag mapped
//! first (`0, -1, 1, -2, ...` to `0, 1, 2, 3, ...`) so that small negative
//! numbers stay short.

use crate::error::DecodeError;

/// Longest possible encoding of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Decode an unsigned varint and advance `data` past it.
///
/// # Errors
/// - `DecodeError::TruncatedInput` if the input ends before the last byte
/// - `DecodeError::MalformedVarint` if the varint runs past 10 bytes or its
///   10th byte carries bits beyond the 64th
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;

    for index in 0..MAX_VARINT_LEN {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::TruncatedInput)?;
        *data = rest;

        // The 10th byte may only contribute the single remaining bit
        if index == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(DecodeError::MalformedVarint);
        }

        result |= ((byte & 0x7F) as u64) << (7 * index);

        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(DecodeError::MalformedVarint)
}

/// Decode a zigzag varint. Fails like [`decode_varint`].
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_varint(data).map(zigzag_decode)
}

/// Advance past one varint without assembling its value.
#[inline]
pub fn skip_varint(data: &mut &[u8]) -> Result<(), DecodeError> {
    for _ in 0..MAX_VARINT_LEN {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::TruncatedInput)?;
        *data = rest;
        if byte & 0x80 == 0 {
            return Ok(());
        }
    }
    Err(DecodeError::MalformedVarint)
}

#[inline]
pub fn zigzag_decode(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64))
}

#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Write the varint for `value` to the front of `buf`, returning its length.
#[inline]
pub fn encode_varint_into(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = byte;
            return len + 1;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
}

#[inline]
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_varint_into(value, &mut buf);
    buf[..len].to_vec()
}

/// Zigzag varint bytes for `value`, at most [`MAX_VARINT_LEN`] long.
#[inline]
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    encode_varint(zigzag_encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    // (value, wire bytes) pairs for unsigned varints
    const UNSIGNED: &[(u64, &[u8])] = &[
        (0, &[0x00]),
        (127, &[0x7F]),
        (128, &[0x80, 0x01]),
        (300, &[0xAC, 0x02]),
        (16384, &[0x80, 0x80, 0x01]),
        (u64::MAX, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
    ];

    // (value, wire bytes) pairs for zigzag longs
    const SIGNED: &[(i64, &[u8])] = &[
        (0, &[0x00]),
        (-1, &[0x01]),
        (1, &[0x02]),
        (-2, &[0x03]),
        (-64, &[0x7F]),
        (64, &[0x80, 0x01]),
        (10000, &[0xA0, 0x9C, 0x01]),
        (4294967295, &[0xFE, 0xFF, 0xFF, 0xFF, 0x1F]),
    ];

    fn decode_all(bytes: &[u8]) -> (Result<u64, DecodeError>, usize) {
        let mut rest = bytes;
        let result = decode_varint(&mut rest);
        (result, bytes.len() - rest.len())
    }

    #[test]
    fn test_unsigned_table() {
        for (value, bytes) in UNSIGNED {
            assert_eq!(encode_varint(*value), *bytes, "encoding {}", value);
            let (decoded, used) = decode_all(bytes);
            assert_eq!(decoded.unwrap(), *value);
            assert_eq!(used, bytes.len());
        }
    }

    #[test]
    fn test_signed_table() {
        for (value, bytes) in SIGNED {
            assert_eq!(encode_zigzag(*value), *bytes, "encoding {}", value);
            let mut rest = *bytes;
            assert_eq!(decode_zigzag(&mut rest).unwrap(), *value);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_decoding_stops_at_last_byte() {
        let mut rest: &[u8] = &[0x02, 0x04, 0x81, 0x01];
        assert_eq!(decode_zigzag(&mut rest).unwrap(), 1);
        assert_eq!(decode_zigzag(&mut rest).unwrap(), 2);
        assert_eq!(decode_zigzag(&mut rest).unwrap(), -65);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_short_input_is_truncated() {
        for bytes in [&[][..], &[0x80][..], &[0xFF, 0xFF][..]] {
            let (decoded, _) = decode_all(bytes);
            assert!(matches!(decoded, Err(DecodeError::TruncatedInput)));
        }
    }

    #[test]
    fn test_overlong_input_is_malformed() {
        // no terminator within ten bytes
        let (decoded, used) = decode_all(&[0x80; 12]);
        assert!(matches!(decoded, Err(DecodeError::MalformedVarint)));
        assert_eq!(used, MAX_VARINT_LEN);

        // a tenth byte carrying more than bit 63
        let mut bytes = [0xFF; MAX_VARINT_LEN];
        bytes[9] = 0x02;
        assert!(matches!(decode_all(&bytes).0, Err(DecodeError::MalformedVarint)));
    }

    #[test]
    fn test_extremes_need_ten_bytes() {
        for value in [i64::MIN, i64::MAX] {
            let bytes = encode_zigzag(value);
            assert_eq!(bytes.len(), MAX_VARINT_LEN);
            let mut rest = &bytes[..];
            assert_eq!(decode_zigzag(&mut rest).unwrap(), value);
        }
    }

    #[test]
    fn test_skip_leaves_following_bytes() {
        let mut rest: &[u8] = &[0xA0, 0x9C, 0x01, 0x2A];
        skip_varint(&mut rest).unwrap();
        assert_eq!(rest, &[0x2A]);

        let mut rest: &[u8] = &[0x80; 11];
        assert!(matches!(skip_varint(&mut rest), Err(DecodeError::MalformedVarint)));
    }

    #[test]
    fn test_encode_into_fixed_buffer() {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_varint_into(zigzag_encode(-65), &mut buf);
        assert_eq!(&buf[..len], &[0x81, 0x01]);
        assert_eq!(zigzag_decode(zigzag_encode(-65)), -65);
    }
}
