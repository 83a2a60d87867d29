//! Avro binary writer components
//!
//! This module provides the encoding side: byte sinks, the schema-driven
//! value encoder, union branch selection, and the buffered value writer.

pub mod buffer;
pub mod encode;
pub mod stream;
pub mod union;

pub use buffer::{ByteSink, GrowableBuffer};
pub use encode::{encode_value, EncodeContext, MissingFieldPolicy};
pub use stream::{DatumWriter, WriterConfig};
pub use union::{resolve_union_branch, validate_native};
