//! Key-value persistence for sync metadata and encrypted credentials.
//!
//! The hosted product persists small string entries in the browser cookie
//! jar; native deployments use a JSON file under the user config directory.
//! Both sit behind [`KeyValueStore`], which is all the vault and the
//! orchestrator ever see.
//!
//! # Public API
//! - [`KeyValueStore`]: The persistence collaborator trait
//! - [`MemoryStore`]: In-memory implementation for tests and ephemeral runs
//! - [`JsonFileStore`]: JSON-file-backed implementation
//! - [`SyncState`]: Last-used remote URL and branch

use crate::core::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Entry name holding the serialized [`SyncState`].
const SYNC_STATE_ENTRY: &str = "gitSyncState";

/// Small string-keyed persistence collaborator.
///
/// Reads are safe to issue concurrently. Writes to the same key are
/// last-writer-wins; concurrent writes to one key are not an expected
/// pattern.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store used by tests and by sessions with no persistence.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// File-backed store persisting a flat JSON object.
///
/// The whole map is loaded at construction and flushed on every mutation,
/// the same way the surrounding product handles its config file.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or create) the store at an explicit path.
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open the store at its default location under the user config
    /// directory.
    pub fn open_default() -> Result<Self> {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::config_dir().unwrap_or_default());
        let dir = base.join("git-bridge");
        std::fs::create_dir_all(&dir)?;
        Self::open(dir.join("store.json"))
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        self.flush(&entries)
    }
}

/// Last-used remote metadata, persisted across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub remote_url: String,
    pub branch: String,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(remote_url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            branch: branch.into(),
            updated_at: Utc::now(),
        }
    }

    /// Read the persisted state, if any. A malformed entry is treated as
    /// absent rather than wedging session start.
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let raw = store.get(SYNC_STATE_ENTRY)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                log::warn!("discarding malformed sync state entry: {err}");
                None
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(SYNC_STATE_ENTRY, &serde_json::to_string(self)?)
    }
}
