//! JSON file store.
//!
//! The whole store lives in one file:
//!
//! ```json
//! { "strings": { "cosmoshub.height": "19000000" }, "binary": { "k": "AAEC" } }
//! ```
//!
//! Binary values are base64 (standard alphabet). The file is read lazily on
//! first access; a missing or unreadable file starts an empty store. Writes
//! are coalesced: every mutation schedules a save after the debounce delay and
//! only the most recent schedule actually writes. Call
//! [`flush`](JsonFileStore::flush) before shutdown.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use dropnote_core::checkpoint::{KvStore, StoredValue};
use dropnote_core::error::IndexerError;

/// Delay between the last mutation and the file write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileContents {
    #[serde(default)]
    strings: BTreeMap<String, String>,
    #[serde(default)]
    binary: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Contents {
    strings: BTreeMap<String, String>,
    binary: BTreeMap<String, Vec<u8>>,
}

struct Shared {
    path: PathBuf,
    debounce: Duration,
    /// `None` until the file has been read.
    contents: Mutex<Option<Contents>>,
    /// Bumped on every scheduled save; a pending save only writes if it is
    /// still the latest.
    generation: AtomicU64,
}

/// A [`KvStore`] persisted to a single JSON file.
#[derive(Clone)]
pub struct JsonFileStore {
    shared: Arc<Shared>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_debounce(path, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                debounce,
                contents: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Write the current contents now, cancelling any pending save.
    ///
    /// A store that was never read or written does not touch the file.
    pub async fn flush(&self) -> Result<(), IndexerError> {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.write().await
    }

    fn schedule_save(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = self.shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(shared.debounce).await;
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(e) = shared.write().await {
                warn!(path = %shared.path.display(), error = %e, "Failed to persist JSON store");
            }
        });
    }

    async fn with_contents<R>(&self, f: impl FnOnce(&mut Contents) -> R) -> R {
        let mut guard = self.shared.contents.lock().await;
        if guard.is_none() {
            *guard = Some(read_file(&self.shared.path).await);
        }
        let contents = guard.get_or_insert_with(Contents::default);
        f(contents)
    }
}

impl Shared {
    async fn write(&self) -> Result<(), IndexerError> {
        let guard = self.contents.lock().await;
        let Some(contents) = guard.as_ref() else {
            return Ok(());
        };
        let file = FileContents {
            strings: contents.strings.clone(),
            binary: contents
                .binary
                .iter()
                .map(|(k, v)| (k.clone(), base64::engine::general_purpose::STANDARD.encode(v)))
                .collect(),
        };
        let json = serde_json::to_string(&file).map_err(|e| IndexerError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| IndexerError::Storage(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "JSON store saved");
        Ok(())
    }
}

async fn read_file(path: &Path) -> Contents {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Contents::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable JSON store; starting empty");
            return Contents::default();
        }
    };
    let file: FileContents = match serde_json::from_str(&text) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt JSON store; starting empty");
            return Contents::default();
        }
    };

    let mut binary = BTreeMap::new();
    for (key, encoded) in file.binary {
        match base64::engine::general_purpose::STANDARD.decode(&encoded) {
            Ok(bytes) => {
                binary.insert(key, bytes);
            }
            Err(e) => warn!(%key, error = %e, "Dropping undecodable binary value"),
        }
    }
    Contents {
        strings: file.strings,
        binary,
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, IndexerError> {
        Ok(self
            .with_contents(|c| {
                c.strings
                    .get(key)
                    .map(|s| StoredValue::Text(s.clone()))
                    .or_else(|| c.binary.get(key).map(|b| StoredValue::Bytes(b.clone())))
            })
            .await)
    }

    async fn set(&self, key: &str, value: StoredValue) -> Result<(), IndexerError> {
        self.with_contents(|c| match value {
            StoredValue::Text(s) => {
                c.binary.remove(key);
                c.strings.insert(key.to_string(), s);
            }
            StoredValue::Bytes(b) => {
                c.strings.remove(key);
                c.binary.insert(key.to_string(), b);
            }
        })
        .await;
        self.schedule_save();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexerError> {
        self.with_contents(|c| {
            c.strings.remove(key);
            c.binary.remove(key);
        })
        .await;
        self.schedule_save();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, IndexerError> {
        Ok(self
            .with_contents(|c| {
                c.strings
                    .keys()
                    .chain(c.binary.keys())
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir, debounce: Duration) -> JsonFileStore {
        JsonFileStore::with_debounce(dir.path().join("dropnote.json"), debounce)
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, DEFAULT_DEBOUNCE);
        assert!(store.get("anything").await.unwrap().is_none());
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flush_persists_strings_and_base64_binary() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, DEFAULT_DEBOUNCE);
        store.set("cosmoshub.height", "19000000".into()).await.unwrap();
        store.set("blob", vec![0u8, 1, 2].into()).await.unwrap();
        store.flush().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["strings"]["cosmoshub.height"], "19000000");
        assert_eq!(raw["binary"]["blob"], "AAEC");

        let reopened = store_in(&dir, DEFAULT_DEBOUNCE);
        assert_eq!(
            reopened.get("cosmoshub.height").await.unwrap(),
            Some(StoredValue::Text("19000000".into()))
        );
        assert_eq!(reopened.get("blob").await.unwrap(), Some(StoredValue::Bytes(vec![0, 1, 2])));
        assert_eq!(reopened.keys().await.unwrap(), vec!["blob", "cosmoshub.height"]);
    }

    #[tokio::test]
    async fn writes_are_debounced_and_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, Duration::from_millis(30));
        for h in 1..=5u64 {
            store.set("n.height", h.to_string().into()).await.unwrap();
        }
        assert!(!store.path().exists());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["strings"]["n.height"], "5");
    }

    #[tokio::test]
    async fn delete_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, Duration::from_millis(10));
        store.set("k", "v".into()).await.unwrap();
        store.flush().await.unwrap();
        store.delete("k").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let reopened = store_in(&dir, DEFAULT_DEBOUNCE);
        assert!(reopened.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropnote.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.keys().await.unwrap().is_empty());
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(StoredValue::Text("v".into())));
    }

    #[tokio::test]
    async fn retyping_a_key_replaces_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, DEFAULT_DEBOUNCE);
        store.set("k", vec![9u8].into()).await.unwrap();
        store.set("k", "text".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(StoredValue::Text("text".into())));
        assert_eq!(store.keys().await.unwrap(), vec!["k"]);
    }
}
