//! Object ID derivation
//!
//! Object IDs are a hash of a definition's structure so that independently
//! built endpoints agree on them. This is the hash used by the OpenPilot
//! object generator:
//!
//! ```text
//! h = h ^ ((h << 5) + (h >> 2) + value)      (32-bit wrapping)
//! ```
//!
//! folded over, in order: the name bytes, the settings flag, the
//! single-instance flag, then for each field (in wire order) its name bytes,
//! element count and type index, plus every option string for enum fields.
//! The lowest bit is cleared; it is reserved for metadata objects.

use super::field::{Field, FieldType};

fn update(hash: u32, value: u32) -> u32 {
    hash ^ (hash << 5).wrapping_add(hash >> 2).wrapping_add(value)
}

fn update_str(hash: u32, value: &str) -> u32 {
    // Bytes are sign-extended like the generator's `char` arithmetic.
    value
        .bytes()
        .fold(hash, |h, b| update(h, b as i8 as i32 as u32))
}

/// Derive the object ID for a definition from its resolved layout
pub fn derive_object_id(name: &str, settings: bool, single_instance: bool, fields: &[Field]) -> u32 {
    let mut hash = update_str(0, name);
    hash = update(hash, settings as u32);
    hash = update(hash, single_instance as u32);

    for field in fields {
        hash = update_str(hash, field.name());
        hash = update(hash, field.elements() as u32);
        hash = update(hash, field.field_type().hash_index());
        if field.field_type() == FieldType::Enum {
            for option in field.options() {
                hash = update_str(hash, option);
            }
        }
    }

    hash & 0xFFFF_FFFE
}
