//! Schema-driven Avro binary marshaling
//!
//! This library encodes host values into the Avro binary encoding and
//! decodes them back, driven by a parsed Avro schema. Data written with one
//! schema can be read with another through Avro schema resolution.
//!
//! ```
//! use avro_marshal::{new_encoder, AvroValue};
//! use serde_json::json;
//!
//! let schema = r#"{"type": "record", "name": "Person", "fields": [
//!     {"name": "name", "type": "string"},
//!     {"name": "age", "type": "int"}
//! ]}"#;
//! let mut encoder = new_encoder(schema, None).unwrap();
//!
//! let bytes = encoder.write(&json!({"name": "Larry", "age": 21})).unwrap();
//! assert_eq!(bytes, b"\nLarry*");
//!
//! let (person, _) = encoder.read_one(&bytes).unwrap();
//! assert_eq!(person.field("age"), Some(&AvroValue::Int(21)));
//! ```

pub mod api;
pub mod codec;
pub mod error;
pub mod native;
pub mod reader;
pub mod schema;
pub mod writer;

// Re-export main types
pub use api::{
    decode_raw_long, encode_raw_long, new_encoder, new_projecting_reader, new_reader, new_writer,
    DatumEncoder,
};
pub use codec::{BlockCodec, Codec};
pub use error::{
    CodecError, DecodeError, EncodeError, MarshalError, ReadError, ReadErrorKind, SchemaError,
};
pub use native::{NativeKind, NativeObject, NativeValue, Scalar};
pub use reader::{
    decode_value, skip_value, AvroValue, DatumReader, DecodeLimits, ErrorMode, ReaderConfig,
};
pub use schema::{
    parse_schema, AvroSchema, EnumSchema, FieldSchema, FixedSchema, ReaderWriterResolution,
    RecordSchema, Schema, SchemaParser, SchemaResolutionContext, TypePromotion,
};
pub use writer::{
    encode_value, resolve_union_branch, ByteSink, DatumWriter, EncodeContext, GrowableBuffer,
    MissingFieldPolicy, WriterConfig,
};
