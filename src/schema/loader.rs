//! # Catalog Persistence
//!
//! The catalog is the persisted set of collection definitions, one JSON file
//! in the data directory. Writes are atomic (temp file + rename) so a crash
//! mid-save never leaves a torn catalog; the journal and catalog together
//! are the engine's full durable state.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::errors::{SchemaError, SchemaResult};
use super::types::Collection;

const CATALOG_FILE: &str = "catalog.json";

/// Loads and saves the collection catalog.
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    /// Catalog store rooted at the given data directory.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CATALOG_FILE),
        }
    }

    /// Load all collection definitions. A missing catalog is an empty one.
    pub fn load(&self) -> SchemaResult<Vec<Collection>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SchemaError::Persist(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&contents).map_err(|e| {
            SchemaError::Persist(format!("malformed catalog {}: {}", self.path.display(), e))
        })
    }

    /// Save all collection definitions atomically.
    pub fn save(&self, collections: &[Collection]) -> SchemaResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SchemaError::Persist(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let contents = serde_json::to_string_pretty(collections)
            .map_err(|e| SchemaError::Persist(format!("failed to encode catalog: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents).map_err(|e| {
            SchemaError::Persist(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            SchemaError::Persist(format!("failed to commit {}: {}", self.path.display(), e))
        })
    }
}
