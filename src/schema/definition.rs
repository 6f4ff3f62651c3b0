//! Object definitions
//!
//! A [`DefinitionSource`] is the unresolved form read from a schema file (or
//! built in code). Converting it into a [`Definition`] runs the load pass:
//!
//! 1. element counts default to 1; element names override the count
//! 2. `clone_of` fields copy the layout of their target (one level only)
//! 3. fields are stable-sorted by descending element size (wire order)
//! 4. byte lengths are cached and the object ID is derived if absent
//!
//! After the pass a definition never changes.

use serde::{Deserialize, Serialize};

use super::field::{Field, FieldType};
use super::object_id::derive_object_id;
use crate::error::SchemaError;
use crate::protocol::constants::MAX_PAYLOAD_LENGTH;

/// Unresolved field description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSource {
    pub name: String,
    /// Type name; may be omitted on clones
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub elements: Option<usize>,
    #[serde(default)]
    pub element_names: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub clone_of: Option<String>,
}

impl FieldSource {
    /// Create a single-element field
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type.into()),
            ..Default::default()
        }
    }

    /// Create a field that copies another field's layout
    pub fn clone_of(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone_of: Some(target.into()),
            ..Default::default()
        }
    }

    /// Set the element count
    pub fn elements(mut self, elements: usize) -> Self {
        self.elements = Some(elements);
        self
    }

    /// Set element names (also sets the element count)
    pub fn element_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.element_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set enum options
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Unresolved object description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionSource {
    pub name: String,
    /// Explicit object ID; derived from the structure when absent
    #[serde(default)]
    pub object_id: Option<u32>,
    #[serde(default)]
    pub single_instance: bool,
    #[serde(default)]
    pub settings: bool,
    #[serde(default)]
    pub fields: Vec<FieldSource>,
}

impl DefinitionSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn object_id(mut self, object_id: u32) -> Self {
        self.object_id = Some(object_id);
        self
    }

    pub fn single_instance(mut self, single_instance: bool) -> Self {
        self.single_instance = single_instance;
        self
    }

    pub fn settings(mut self, settings: bool) -> Self {
        self.settings = settings;
        self
    }

    pub fn field(mut self, field: FieldSource) -> Self {
        self.fields.push(field);
        self
    }

    /// Run the load pass
    pub fn resolve(self) -> Result<Definition, SchemaError> {
        Definition::try_from(self)
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidField {
            definition: self.name.clone(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn resolve_plain(&self, source: &FieldSource) -> Result<Field, SchemaError> {
        let type_name = source
            .field_type
            .as_deref()
            .ok_or_else(|| self.invalid(&source.name, "missing type"))?;
        let field_type: FieldType = type_name.parse()?;

        let elements = if source.element_names.is_empty() {
            source.elements.unwrap_or(1)
        } else {
            source.element_names.len()
        };
        if elements == 0 {
            return Err(self.invalid(&source.name, "element count must be at least 1"));
        }
        if elements > MAX_PAYLOAD_LENGTH {
            return Err(self.invalid(&source.name, "too many elements"));
        }

        if field_type == FieldType::Enum {
            if source.options.is_empty() {
                return Err(self.invalid(&source.name, "enum field has no options"));
            }
            if source.options.len() > usize::from(u16::MAX) + 1 {
                return Err(self.invalid(&source.name, "too many enum options"));
            }
        }

        Ok(Field::new(
            source.name.clone(),
            field_type,
            elements,
            source.element_names.clone(),
            source.options.clone(),
            None,
        ))
    }
}

/// Resolved schema for one object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DefinitionSource")]
pub struct Definition {
    object_id: u32,
    name: String,
    single_instance: bool,
    settings: bool,
    fields: Vec<Field>,
    #[serde(skip)]
    byte_length: usize,
}

impl Definition {
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Single-instance objects carry no instance ID on the wire
    pub fn single_instance(&self) -> bool {
        self.single_instance
    }

    pub fn settings(&self) -> bool {
        self.settings
    }

    /// Fields in wire order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Payload size in bytes
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }
}

impl TryFrom<DefinitionSource> for Definition {
    type Error = SchemaError;

    fn try_from(source: DefinitionSource) -> Result<Self, Self::Error> {
        for (i, field) in source.fields.iter().enumerate() {
            if source.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(source.invalid(&field.name, "duplicate field name"));
            }
        }

        // Non-clone fields first, so clone targets are fully resolved.
        let mut resolved: Vec<Option<Field>> = source
            .fields
            .iter()
            .map(|f| match f.clone_of {
                Some(_) => Ok(None),
                None => source.resolve_plain(f).map(Some),
            })
            .collect::<Result<_, _>>()?;

        for (i, field) in source.fields.iter().enumerate() {
            let Some(target) = field.clone_of.as_deref() else {
                continue;
            };
            let index = source
                .fields
                .iter()
                .position(|f| f.name == target)
                .ok_or_else(|| SchemaError::UnresolvedClone {
                    definition: source.name.clone(),
                    field: field.name.clone(),
                    target: target.to_string(),
                })?;
            let original = resolved[index]
                .as_ref()
                .filter(|_| source.fields[index].clone_of.is_none())
                .ok_or_else(|| SchemaError::CloneChain {
                    definition: source.name.clone(),
                    field: field.name.clone(),
                    target: target.to_string(),
                })?;

            resolved[i] = Some(original.clone_as(&field.name, target));
        }

        let mut fields: Vec<Field> = resolved.into_iter().flatten().collect();
        // `sort_by` is stable, so equal sizes keep declaration order.
        fields.sort_by(|a, b| b.element_size().cmp(&a.element_size()));

        let mut byte_length = 0;
        for field in &fields {
            byte_length += field.byte_length();
            if byte_length > MAX_PAYLOAD_LENGTH {
                return Err(source.invalid(
                    field.name(),
                    format!("payload exceeds {} bytes", MAX_PAYLOAD_LENGTH),
                ));
            }
        }
        let object_id = source.object_id.unwrap_or_else(|| {
            derive_object_id(&source.name, source.settings, source.single_instance, &fields)
        });

        Ok(Definition {
            object_id,
            name: source.name,
            single_instance: source.single_instance,
            settings: source.settings,
            fields,
            byte_length,
        })
    }
}
