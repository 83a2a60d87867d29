//! Decoding side: varint primitives, schema-driven decoding and skipping,
//! and the value reader.

pub mod decode;
pub mod stream;
pub mod varint;

pub use decode::{
    decode_array, decode_block_count, decode_boolean, decode_bytes, decode_bytes_ref,
    decode_double, decode_enum, decode_enum_index, decode_fixed, decode_float, decode_int,
    decode_long, decode_map, decode_record, decode_string, decode_union_index, decode_value,
    decode_value_in, skip_bytes, skip_fixed, skip_value, skip_value_in, AvroValue, DecodeContext,
    DecodeLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS,
};
pub use stream::{DatumReader, ErrorMode, ReaderConfig, ValueIter};
pub use varint::{
    decode_varint, decode_zigzag, encode_varint, encode_zigzag, skip_varint, MAX_VARINT_LEN,
};
