//! Payload encoder and decoder
//!
//! The payload is the concatenation of every field in wire order, each field
//! written element by element at its fixed width. All multi-byte values are
//! little-endian and there are no delimiters, so the layout is fully
//! determined by the definition:
//!
//! ```text
//! +-----------+-----------+-----+-----------+
//! | field 0   | field 1   | ... | field n   |
//! | e0 e1 ..  | e0 ..     |     | e0 ..     |
//! +-----------+-----------+-----+-----------+
//!  <------------ byte_length -------------->
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::{ObjectData, Value};
use crate::error::CodecError;
use crate::schema::{Definition, Field, FieldType};

/// Encode a data map into a payload
///
/// Every field of the definition must be present; extra keys are ignored.
/// Single-element fields take a scalar, the same form [`decode_payload`]
/// produces; an array is rejected even when it holds one element.
pub fn encode_payload(definition: &Definition, data: &ObjectData) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(definition.byte_length());

    for field in definition.fields() {
        let value = data
            .get(field.name())
            .ok_or_else(|| CodecError::MissingField(field.name().to_string()))?;

        if field.elements() == 1 && value.as_array().is_some() {
            return Err(CodecError::TypeMismatch {
                field: field.name().to_string(),
                expected: "a single value",
            });
        }

        let elements = value.elements();
        if elements.len() != field.elements() {
            return Err(CodecError::ElementCount {
                field: field.name().to_string(),
                expected: field.elements(),
                actual: elements.len(),
            });
        }

        for element in elements {
            put_element(&mut buf, field, element)?;
        }
    }

    debug_assert_eq!(buf.len(), definition.byte_length());
    Ok(buf.freeze())
}

/// Decode a payload into a data map
///
/// Reads exactly `definition.byte_length()` bytes; trailing bytes are not
/// examined.
pub fn decode_payload(definition: &Definition, payload: &[u8]) -> Result<ObjectData, CodecError> {
    if payload.len() < definition.byte_length() {
        return Err(CodecError::Truncated {
            expected: definition.byte_length(),
            actual: payload.len(),
        });
    }

    let mut buf = &payload[..definition.byte_length()];
    let mut data = ObjectData::new();

    for field in definition.fields() {
        let value = if field.elements() == 1 {
            get_element(&mut buf, field)?
        } else {
            let items = (0..field.elements())
                .map(|_| get_element(&mut buf, field))
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        };
        data.insert(field.name().to_string(), value);
    }

    Ok(data)
}

fn mismatch(field: &Field) -> CodecError {
    let expected = match field.field_type() {
        FieldType::Float32 => "a number",
        FieldType::Enum => "an option name or index",
        _ => "an integer",
    };
    CodecError::TypeMismatch {
        field: field.name().to_string(),
        expected,
    }
}

fn integer<T: TryFrom<i64>>(field: &Field, value: &Value) -> Result<T, CodecError> {
    let v = value.as_i64().ok_or_else(|| mismatch(field))?;
    T::try_from(v).map_err(|_| CodecError::OutOfRange {
        field: field.name().to_string(),
    })
}

fn option_index(field: &Field, value: &Value) -> Result<usize, CodecError> {
    match value {
        Value::Enum(name) => field
            .option_index(name)
            .ok_or_else(|| CodecError::UnknownOption {
                field: field.name().to_string(),
                option: name.clone(),
            }),
        other => {
            let index: usize = integer(field, other)?;
            if index < field.options().len() {
                Ok(index)
            } else {
                Err(CodecError::UnknownOption {
                    field: field.name().to_string(),
                    option: index.to_string(),
                })
            }
        }
    }
}

fn put_element(buf: &mut BytesMut, field: &Field, value: &Value) -> Result<(), CodecError> {
    match field.field_type() {
        FieldType::Int8 => buf.put_i8(integer(field, value)?),
        FieldType::Int16 => buf.put_i16_le(integer(field, value)?),
        FieldType::Int32 => buf.put_i32_le(integer(field, value)?),
        FieldType::UInt8 => buf.put_u8(integer(field, value)?),
        FieldType::UInt16 => buf.put_u16_le(integer(field, value)?),
        FieldType::UInt32 => buf.put_u32_le(integer(field, value)?),
        FieldType::Float32 => {
            let v = value.as_f64().ok_or_else(|| mismatch(field))?;
            buf.put_f32_le(v as f32);
        }
        FieldType::Enum => {
            let index = option_index(field, value)?;
            if field.element_size() == 1 {
                buf.put_u8(index as u8);
            } else {
                buf.put_u16_le(index as u16);
            }
        }
    }
    Ok(())
}

fn get_element(buf: &mut &[u8], field: &Field) -> Result<Value, CodecError> {
    let value = match field.field_type() {
        FieldType::Int8 => Value::Int8(buf.get_i8()),
        FieldType::Int16 => Value::Int16(buf.get_i16_le()),
        FieldType::Int32 => Value::Int32(buf.get_i32_le()),
        FieldType::UInt8 => Value::UInt8(buf.get_u8()),
        FieldType::UInt16 => Value::UInt16(buf.get_u16_le()),
        FieldType::UInt32 => Value::UInt32(buf.get_u32_le()),
        FieldType::Float32 => Value::Float32(buf.get_f32_le()),
        FieldType::Enum => {
            let index = if field.element_size() == 1 {
                usize::from(buf.get_u8())
            } else {
                usize::from(buf.get_u16_le())
            };
            let option = field
                .options()
                .get(index)
                .ok_or_else(|| CodecError::UnknownOption {
                    field: field.name().to_string(),
                    option: index.to_string(),
                })?;
            Value::Enum(option.clone())
        }
    };
    Ok(value)
}
