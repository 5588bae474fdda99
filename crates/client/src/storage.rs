//! Durable local storage.
//!
//! Values are stored as JSON under string keys. [`FileStore`] keeps one file
//! per key in the platform config directory:
//!   - Linux: `~/.config/gupshup/`
//!   - macOS: `~/Library/Application Support/gupshup/`
//!   - Windows: `%APPDATA%\gupshup\`
//!
//! [`MemoryStore`] is the non-durable variant for tests and ephemeral sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{EngineError, EngineResult};

pub trait LocalStore: Send + Sync {
    fn load_raw(&self, key: &str) -> Option<String>;
    fn save_raw(&self, key: &str, value: &str) -> EngineResult<()>;
}

/// Save a value to the store.
pub fn save<T: Serialize>(store: &dyn LocalStore, key: &str, value: &T) -> EngineResult<()> {
    let json = serde_json::to_string(value).map_err(|e| EngineError::Storage(e.to_string()))?;
    store.save_raw(key, &json)
}

/// Load a value from the store.
///
/// Returns `None` if the key doesn't exist or deserialization fails.
pub fn load<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Option<T> {
    let json = store.load_raw(key)?;
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            crate::log_warn!("Ignoring unreadable stored value for '{}': {}", key, e);
            None
        }
    }
}

// =========================================
// File-backed implementation
// =========================================

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> EngineResult<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| EngineError::Storage(e.to_string()))?;
        }
        Ok(Self { dir })
    }

    /// Store rooted at `<config dir>/gupshup`.
    pub fn in_config_dir() -> EngineResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EngineError::Storage("no config directory on this platform".into()))?;
        Self::new(config_dir.join("gupshup"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{}.json", safe_key))
    }
}

impl LocalStore for FileStore {
    fn load_raw(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)).ok()
    }

    fn save_raw(&self, key: &str, value: &str) -> EngineResult<()> {
        std::fs::write(self.file_path(key), value).map_err(|e| EngineError::Storage(e.to_string()))
    }
}

// =========================================
// In-memory implementation
// =========================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn load_raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn save_raw(&self, key: &str, value: &str) -> EngineResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| EngineError::Storage("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
