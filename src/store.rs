// src/store.rs
//! Reconciliation store: source record id -> last known `SyncState`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::SyncState;

#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<SyncState>, StoreError>;
    async fn set(&self, id: &str, state: SyncState) -> Result<(), StoreError>;
}

/// Durable store backed by one JSON file, rewritten atomically on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, SyncState>>,
}

impl JsonFileStore {
    /// Load existing state. A missing file is an empty store; a corrupt one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => HashMap::new(),
            Ok(s) => serde_json::from_str(&s).map_err(|source| StoreError::Corrupt {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "sync store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, entries: &HashMap<String, SyncState>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SyncStore for JsonFileStore {
    async fn get(&self, id: &str) -> Result<Option<SyncState>, StoreError> {
        Ok(self.entries.lock().await.get(id).cloned())
    }

    async fn set(&self, id: &str, state: SyncState) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(id.to_string(), state);
        if let Err(e) = self.persist(&entries).await {
            // Keep memory consistent with disk so the next tick sees the failure.
            match previous {
                Some(prev) => entries.insert(id.to_string(), prev),
                None => entries.remove(id),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SyncState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> HashMap<String, SyncState> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<SyncState>, StoreError> {
        Ok(self.entries.lock().await.get(id).cloned())
    }

    async fn set(&self, id: &str, state: SyncState) -> Result<(), StoreError> {
        self.entries.lock().await.insert(id.to_string(), state);
        Ok(())
    }
}
