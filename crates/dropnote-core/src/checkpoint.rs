//! Checkpoint manager — persists the last observed block height per network.
//!
//! Checkpoints live in a small key/value store under `"{network}.height"`.
//! While watching, the indexer writes the height of every new block tip; on
//! the next start it resumes from there rather than re-scanning the default
//! lookback window.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::IndexerError;
use crate::types::NetworkConfig;

/// A value held by a [`KvStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl StoredValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }
}

impl From<String> for StoredValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Trait for the key/value medium checkpoints are persisted in.
///
/// Implementations must tolerate concurrent `set` calls on distinct keys.
/// See `dropnote-storage` for file, prefixed-string, and SQLite backends.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, IndexerError>;

    /// Insert or replace the value under `key`.
    async fn set(&self, key: &str, value: StoredValue) -> Result<(), IndexerError>;

    async fn delete(&self, key: &str) -> Result<(), IndexerError>;

    async fn keys(&self) -> Result<Vec<String>, IndexerError>;
}

/// Reads and writes per-network height checkpoints.
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn KvStore>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Load the saved height for `network` (returns `None` if none exists).
    ///
    /// A value that is binary or not a decimal integer is ignored.
    pub async fn load(&self, network: &NetworkConfig) -> Result<Option<u64>, IndexerError> {
        let key = network.height_key();
        let Some(value) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match value.as_text().map(|s| s.trim().parse::<u64>()) {
            Some(Ok(height)) => Ok(Some(height)),
            _ => {
                tracing::warn!(%key, ?value, "Ignoring unreadable checkpoint");
                Ok(None)
            }
        }
    }

    /// Persist `height` as the checkpoint for `network`.
    pub async fn save(&self, network: &NetworkConfig, height: u64) -> Result<(), IndexerError> {
        self.store
            .set(&network.height_key(), StoredValue::Text(height.to_string()))
            .await
    }

    /// Remove the checkpoint (the next watch falls back to the lookback window).
    pub async fn reset(&self, network: &NetworkConfig) -> Result<(), IndexerError> {
        self.store.delete(&network.height_key()).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// In-memory key/value store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryKvStore {
    data: Mutex<BTreeMap<String, StoredValue>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, IndexerError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: StoredValue) -> Result<(), IndexerError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexerError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, IndexerError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.keys().cloned().collect())
    }
}
