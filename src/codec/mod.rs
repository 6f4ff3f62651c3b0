//! Schema-driven payload codec
//!
//! Converts between the binary payload region of a frame and an
//! [`ObjectData`] map, using the field layout of a [`Definition`].
//!
//! [`Definition`]: crate::schema::Definition

pub mod payload;
pub mod value;

pub use payload::{decode_payload, encode_payload};
pub use value::{ObjectData, Value};
