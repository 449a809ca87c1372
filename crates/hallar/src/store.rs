//! JSON persistence for learned weights and the adaptive cache.
//!
//! Two small documents in one directory: `weights.json` and `cache.json`.
//! Loading fails open: a missing, unreadable, or corrupt file logs a warning
//! and yields `None`, and the engine cold-starts with neutral state. Learned
//! state is an optimization, never a correctness requirement.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::result::HallarResult;
use crate::weights::WeightSnapshot;

const WEIGHTS_FILE: &str = "weights.json";
const CACHE_FILE: &str = "cache.json";

/// Directory-backed JSON store.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// save, not here.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this store reads and writes.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load persisted weights, `None` on any failure.
    #[must_use]
    pub fn load_weights(&self) -> Option<WeightSnapshot> {
        self.load(WEIGHTS_FILE)
    }

    /// Load persisted cache entries, `None` on any failure.
    #[must_use]
    pub fn load_cache(&self) -> Option<BTreeMap<String, CacheEntry>> {
        self.load(CACHE_FILE)
    }

    /// Persist the weight snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HallarError::Io`] or [`crate::HallarError::Json`]
    /// when the directory cannot be created or the document cannot be
    /// written.
    pub fn save_weights(&self, snapshot: &WeightSnapshot) -> HallarResult<()> {
        self.save(WEIGHTS_FILE, snapshot)
    }

    /// Persist the cache entries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HallarError::Io`] or [`crate::HallarError::Json`]
    /// when the directory cannot be created or the document cannot be
    /// written.
    pub fn save_cache(&self, entries: &BTreeMap<String, CacheEntry>) -> HallarResult<()> {
        self.save(CACHE_FILE, entries)
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.dir.join(file);
        if !path.exists() {
            return None;
        }
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "cannot read persisted state");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "discarding corrupt persisted state");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, file: &str, value: &T) -> HallarResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file);
        let text = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, text)?;
        tracing::debug!(path = %path.display(), "persisted state");
        Ok(())
    }
}
