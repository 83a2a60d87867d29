//! Block compression for enclosing container formats.
//!
//! Nothing in the marshaling path compresses. Components that frame many
//! encoded values into blocks use these codecs, which produce the same bytes
//! as other Avro implementations for `null`, `snappy` and `deflate`.

use crate::error::CodecError;

#[cfg(feature = "snappy")]
use snap::raw::{Decoder as SnappyDecoder, Encoder as SnappyEncoder};

#[cfg(feature = "deflate")]
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};

#[cfg(feature = "deflate")]
use std::io::{Read, Write};

/// Compresses and decompresses whole blocks of encoded data.
pub trait BlockCodec {
    /// Compress a block.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompress a block produced by [`compress`](Self::compress).
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Whether `data` decompresses cleanly.
    fn is_valid_compressed(&self, data: &[u8]) -> bool {
        self.decompress(data).is_ok()
    }
}

/// A named Avro block codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Null,
    /// Raw snappy followed by a big-endian CRC32 of the uncompressed bytes
    Snappy,
    /// RFC 1951 without a zlib header
    Deflate,
}

impl Codec {
    /// Codec for an `avro.codec` metadata value.
    ///
    /// ```
    /// use avro_marshal::codec::Codec;
    ///
    /// let codec = Codec::from_name("null").unwrap();
    /// assert_eq!(codec, Codec::Null);
    ///
    /// let err = Codec::from_name("unknown").unwrap_err();
    /// assert!(err.to_string().contains("unknown"));
    /// ```
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "null" => Ok(Codec::Null),
            "snappy" => Ok(Codec::Snappy),
            "deflate" => Ok(Codec::Deflate),
            unknown => Err(CodecError::UnsupportedCodec(format!(
                "Unknown codec '{}'. Supported codecs: null, snappy, deflate",
                unknown
            ))),
        }
    }

    /// The `avro.codec` metadata value.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Snappy => "snappy",
            Codec::Deflate => "deflate",
        }
    }
}

impl BlockCodec for Codec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            #[cfg(feature = "snappy")]
            Codec::Snappy => compress_snappy(data),
            #[cfg(feature = "deflate")]
            Codec::Deflate => compress_deflate(data),
            #[allow(unreachable_patterns)]
            other => Err(not_enabled(*other)),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            #[cfg(feature = "snappy")]
            Codec::Snappy => decompress_snappy(data),
            #[cfg(feature = "deflate")]
            Codec::Deflate => decompress_deflate(data),
            #[allow(unreachable_patterns)]
            other => Err(not_enabled(*other)),
        }
    }
}

fn not_enabled(codec: Codec) -> CodecError {
    CodecError::UnsupportedCodec(format!(
        "{} codec not enabled. Enable the '{}' feature.",
        codec.name(),
        codec.name()
    ))
}

/// Size of the big-endian CRC32 that follows every snappy block.
#[cfg(feature = "snappy")]
const CRC_SIZE: usize = 4;

/// The checksum is plain CRC32, not CRC32C.
#[cfg(feature = "snappy")]
fn compress_snappy(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut compressed = SnappyEncoder::new()
        .compress_vec(data)
        .map_err(|e| CodecError::CompressionError(format!("snappy: {}", e)))?;
    compressed.extend_from_slice(&crc32fast::hash(data).to_be_bytes());
    Ok(compressed)
}

#[cfg(feature = "snappy")]
fn decompress_snappy(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let Some(split) = data.len().checked_sub(CRC_SIZE) else {
        return Err(CodecError::DecompressionError(format!(
            "snappy block of {} bytes has no room for its checksum",
            data.len()
        )));
    };
    let (payload, trailer) = data.split_at(split);
    let mut crc = [0u8; CRC_SIZE];
    crc.copy_from_slice(trailer);
    let stored = u32::from_be_bytes(crc);

    let plain = match payload {
        [] => Vec::new(),
        _ => SnappyDecoder::new()
            .decompress_vec(payload)
            .map_err(|e| CodecError::DecompressionError(format!("snappy: {}", e)))?,
    };

    let computed = crc32fast::hash(&plain);
    if computed != stored {
        return Err(CodecError::DecompressionError(format!(
            "snappy CRC32 mismatch: block says {:08x}, data hashes to {:08x}",
            stored, computed
        )));
    }
    Ok(plain)
}

#[cfg(feature = "deflate")]
fn compress_deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let failed = |e: std::io::Error| CodecError::CompressionError(format!("deflate: {}", e));
    let mut sink = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    sink.write_all(data).map_err(failed)?;
    sink.finish().map_err(failed)
}

#[cfg(feature = "deflate")]
fn decompress_deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut plain = Vec::with_capacity(data.len() * 2);
    DeflateDecoder::new(data)
        .read_to_end(&mut plain)
        .map_err(|e| CodecError::DecompressionError(format!("deflate: {}", e)))?;
    Ok(plain)
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
