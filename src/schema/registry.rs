//! Schema registry
//!
//! Shared, append-only set of definitions. The link read loop looks up
//! definitions while the hub appends ones announced by peers, so lookups and
//! appends go through a short-lived lock and hand out `Arc` clones. The lock
//! is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::definition::Definition;
use crate::error::SchemaError;

#[derive(Default)]
struct Inner {
    /// Insertion order
    ordered: Vec<Arc<Definition>>,
    by_id: HashMap<u32, Arc<Definition>>,
    by_name: HashMap<String, Arc<Definition>>,
}

/// Registry of known object definitions
#[derive(Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from loaded definitions
    ///
    /// Fails on the first duplicate name or object ID.
    pub fn from_definitions<I>(definitions: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = Definition>,
    {
        let registry = Self::new();
        for definition in definitions {
            let name = definition.name().to_string();
            if !registry.add(Arc::new(definition))? {
                return Err(SchemaError::DuplicateName(name));
            }
        }
        Ok(registry)
    }

    /// Add a definition
    ///
    /// Returns `Ok(false)` if an identical definition is already registered.
    /// A different definition with the same name or object ID is rejected.
    pub fn add(&self, definition: Arc<Definition>) -> Result<bool, SchemaError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = inner.by_id.get(&definition.object_id()) {
            if **existing == *definition {
                return Ok(false);
            }
            return Err(SchemaError::DuplicateObjectId(definition.object_id()));
        }
        if inner.by_name.contains_key(definition.name()) {
            return Err(SchemaError::DuplicateName(definition.name().to_string()));
        }

        inner
            .by_id
            .insert(definition.object_id(), Arc::clone(&definition));
        inner
            .by_name
            .insert(definition.name().to_string(), Arc::clone(&definition));
        inner.ordered.push(definition);
        Ok(true)
    }

    /// Look up a definition by object ID
    pub fn get(&self, object_id: u32) -> Option<Arc<Definition>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.get(&object_id).cloned()
    }

    /// Look up a definition by name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Definition>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_name.get(name).cloned()
    }

    pub fn contains(&self, object_id: u32) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.contains_key(&object_id)
    }

    /// Snapshot of all definitions in insertion order
    pub fn definitions(&self) -> Vec<Arc<Definition>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.ordered.clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("definitions", &self.len())
            .finish()
    }
}
