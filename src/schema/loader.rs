//! Schema file loading
//!
//! Each `*.json` file in a schema directory holds one [`DefinitionSource`].
//! Files are loaded in name order so derived registries are reproducible.

use std::path::{Path, PathBuf};

use super::definition::{Definition, DefinitionSource};
use super::registry::SchemaRegistry;
use crate::error::SchemaError;

/// Parse and resolve a single definition from JSON text
pub fn parse_definition(json: &str) -> Result<Definition, SchemaError> {
    let source: DefinitionSource =
        serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
    source.resolve()
}

/// Load every `*.json` definition in a directory
pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Definition>, SchemaError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir).await?;

    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut definitions = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path).await?;
        let definition = parse_definition(&text)
            .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            name = definition.name(),
            object_id = %format!("0x{:08X}", definition.object_id()),
            bytes = definition.byte_length(),
            "Definition loaded"
        );
        definitions.push(definition);
    }

    Ok(definitions)
}

/// Load a directory into a new registry
pub async fn load_registry(dir: impl AsRef<Path>) -> Result<SchemaRegistry, SchemaError> {
    let definitions = load_dir(dir.as_ref()).await?;
    let count = definitions.len();
    let registry = SchemaRegistry::from_definitions(definitions)?;

    tracing::info!(
        dir = %dir.as_ref().display(),
        definitions = count,
        "Schema registry loaded"
    );
    Ok(registry)
}
