//! Storage layer for the file-backed document store
//!
//! # Directory Structure
//!
//! ```text
//! .taskmirror/                  # Store root (configurable)
//!   tasks.json                  # Task collection
//!   tasks.lock                  # Lock guarding tasks.json rewrites
//!   categories.json             # User-defined category collection
//!   categories.lock
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::lock;
use crate::remote::Document;

/// Default name of the store directory
pub const STORE_DIR: &str = ".taskmirror";

pub const COLLECTION_SCHEMA_VERSION: &str = "taskmirror.collection.v1";

/// On-disk form of one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFile {
    pub schema_version: String,
    /// Bumped on every write; lets watchers skip unchanged rereads
    pub version: u64,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Default for CollectionFile {
    fn default() -> Self {
        Self {
            schema_version: COLLECTION_SCHEMA_VERSION.to_string(),
            version: 0,
            documents: Vec::new(),
        }
    }
}

/// Storage manager for a store directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_file(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }

    pub fn lock_file(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.lock"))
    }

    /// Create the store directory
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.root.is_dir()
    }

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Read a collection; a missing file is an empty collection
    pub fn read_collection(&self, collection: &str) -> Result<CollectionFile> {
        let path = self.collection_file(collection);
        if !path.exists() {
            return Ok(CollectionFile::default());
        }
        self.read_json(&path)
    }
}
