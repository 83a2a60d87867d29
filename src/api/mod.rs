//! Public API module.
//!
//! Entry points for an enclosing CLI or service layer.
//!
//! # Module Structure
//! - `open`: reader, writer and encoder constructors taking schema JSON text
//! - `encoder`: `DatumEncoder`, reads and writes over one writer schema
//! - `raw`: schema-free zigzag varint helpers

pub mod encoder;
pub mod open;
pub mod raw;

pub use encoder::DatumEncoder;
pub use open::{new_encoder, new_projecting_reader, new_reader, new_writer};
pub use raw::{decode_raw_long, encode_raw_long};
