//! Error types.
//!
//! Each layer has its own enum; [`MarshalError`] is what the public
//! readers, writers and encoders return.

use thiserror::Error;

/// A schema document could not be parsed, or two schemas do not project.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// The text is not JSON.
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Incompatible schemas: {0}")]
    IncompatibleSchema(String),
    /// Named by reader field.
    #[error("Reader field '{0}' is not in the writer schema and has no default")]
    MissingDefault(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("Compression error: {0}")]
    CompressionError(String),
    #[error("Decompression error: {0}")]
    DecompressionError(String),
}

/// A native value does not fit the writer schema.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Missing field '{field}' in record '{record}'")]
    MissingField { record: String, field: String },
    #[error("Unknown symbol '{symbol}' for enum '{enum_name}'")]
    UnknownSymbol { enum_name: String, symbol: String },
    /// Fixed payload of the wrong length.
    #[error("Fixed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    /// Carries the kind name of the rejected value.
    #[error("No union branch matches value of kind {0}")]
    NoMatchingUnionBranch(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),
    #[error("Unresolved named type '{0}'")]
    UnresolvedType(String),
    /// Raised by a bounded sink. Writers catch it, grow and retry, so it
    /// only escapes from direct use of the encoding functions.
    #[error("Insufficient space in output buffer")]
    InsufficientSpace,
    #[error("Encoded value exceeds the buffer limit of {limit} bytes")]
    BufferLimitExceeded { limit: usize },
    /// Records, arrays, maps and unions nested past the configured depth.
    #[error("Value nests deeper than {limit} levels")]
    DepthLimitExceeded { limit: usize },
}

/// Malformed or truncated binary input.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Truncated input")]
    TruncatedInput,
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// More than ten bytes, or bits past the 64th.
    #[error("Malformed varint encoding")]
    MalformedVarint,
    #[error("Invalid enum index {index} (enum has {symbols} symbols)")]
    InvalidEnumIndex { index: i64, symbols: usize },
    #[error("Invalid union index {index} (union has {branches} branches)")]
    InvalidUnionIndex { index: i64, branches: usize },
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Value nests deeper than {limit} levels")]
    DepthLimitExceeded { limit: usize },
    /// Counted across every block of one array or map.
    #[error("Array or map declares more than {limit} items")]
    ItemLimitExceeded { limit: usize },
}

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// `record_index` counts values from the start of the input and
    /// `offset` is where the failing value began.
    #[error("Decode error in record {record_index} at offset {offset}: {source}")]
    Decode {
        record_index: usize,
        offset: usize,
        #[source]
        source: DecodeError,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Rejected reader or writer settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<DecodeError> for MarshalError {
    fn from(source: DecodeError) -> Self {
        MarshalError::Decode {
            record_index: 0,
            offset: 0,
            source,
        }
    }
}

/// A failure kept by a reader in [`ErrorMode::StopAtError`](crate::ErrorMode).
#[derive(Debug, Clone)]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub record_index: usize,
    pub offset: usize,
    pub message: String,
}

impl ReadError {
    pub(crate) fn from_decode(err: &DecodeError, record_index: usize, offset: usize) -> Self {
        let kind = match err {
            DecodeError::TruncatedInput => ReadErrorKind::TruncatedInput,
            DecodeError::InvalidEnumIndex { .. }
            | DecodeError::InvalidUnionIndex { .. }
            | DecodeError::TypeMismatch(_) => ReadErrorKind::SchemaViolation,
            _ => ReadErrorKind::RecordDecodeFailed,
        };
        Self {
            kind,
            record_index,
            offset,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} at record {}, offset {}: {}",
            self.kind, self.record_index, self.offset, self.message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorKind {
    TruncatedInput,
    /// Any other decode failure.
    RecordDecodeFailed,
    /// An index outside the schema's enum symbols or union branches.
    SchemaViolation,
}
