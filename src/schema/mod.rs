//! Object schemas
//!
//! Definitions describe the binary layout of every UAVTalk object. They are
//! loaded once at startup (or announced by hub peers later) and never change
//! afterwards.
//!
//! ```text
//!   schema dir (*.json)
//!         │ load_dir()
//!         ▼
//!   DefinitionSource ──resolve()──► Definition ──► SchemaRegistry
//!                      (clones,                    (by ID / by name,
//!                       sort, ID)                   append-only)
//! ```

pub mod definition;
pub mod field;
pub mod loader;
pub mod object_id;
pub mod registry;

pub use definition::{Definition, DefinitionSource, FieldSource};
pub use field::{Field, FieldType};
pub use loader::{load_dir, load_registry, parse_definition};
pub use object_id::derive_object_id;
pub use registry::SchemaRegistry;
