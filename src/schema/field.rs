//! Field types
//!
//! Wire types and the resolved per-field layout of a definition.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SchemaError;

/// Wire type of a field element
///
/// The discriminant order is part of the object ID hash and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Enum,
}

impl FieldType {
    /// Index used by the object ID hash
    pub fn hash_index(self) -> u32 {
        match self {
            FieldType::Int8 => 0,
            FieldType::Int16 => 1,
            FieldType::Int32 => 2,
            FieldType::UInt8 => 3,
            FieldType::UInt16 => 4,
            FieldType::UInt32 => 5,
            FieldType::Float32 => 6,
            FieldType::Enum => 7,
        }
    }

    /// Wire size of one element
    ///
    /// Enums are one byte while their options fit in a `u8` index, two bytes otherwise.
    pub fn element_size(self, option_count: usize) -> usize {
        match self {
            FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => 4,
            FieldType::Enum if option_count <= 256 => 1,
            FieldType::Enum => 2,
        }
    }

    /// Name as written in schema files
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::Float32 => "float32",
            FieldType::Enum => "enum",
        }
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int8" => Ok(FieldType::Int8),
            "int16" => Ok(FieldType::Int16),
            "int32" => Ok(FieldType::Int32),
            "uint8" => Ok(FieldType::UInt8),
            "uint16" => Ok(FieldType::UInt16),
            "uint32" => Ok(FieldType::UInt32),
            "float" | "float32" => Ok(FieldType::Float32),
            "enum" => Ok(FieldType::Enum),
            other => Err(SchemaError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved field of a definition
///
/// Built only by the definition load pass, so `clone_of` is already applied
/// and `byte_length` is cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    name: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    elements: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    element_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clone_of: Option<String>,
    #[serde(skip)]
    byte_length: usize,
}

impl Field {
    pub(crate) fn new(
        name: String,
        field_type: FieldType,
        elements: usize,
        element_names: Vec<String>,
        options: Vec<String>,
        clone_of: Option<String>,
    ) -> Self {
        let byte_length = field_type.element_size(options.len()) * elements;
        Self {
            name,
            field_type,
            elements,
            element_names,
            options,
            clone_of,
            byte_length,
        }
    }

    /// Copy this field's layout under another name
    pub(crate) fn clone_as(&self, name: &str, clone_of: &str) -> Self {
        Self {
            name: name.to_string(),
            clone_of: Some(clone_of.to_string()),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Repeat count, at least 1
    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn element_names(&self) -> &[String] {
        &self.element_names
    }

    /// Permitted symbolic values, in wire index order
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn clone_of(&self) -> Option<&str> {
        self.clone_of.as_deref()
    }

    /// Wire size of a single element
    pub fn element_size(&self) -> usize {
        self.field_type.element_size(self.options.len())
    }

    /// Wire size of all elements
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Wire index of an enum option
    pub fn option_index(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|o| o == option)
    }
}
