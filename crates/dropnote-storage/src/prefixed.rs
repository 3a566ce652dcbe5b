//! Namespaced store over a string-only backend.
//!
//! Keys are laid out as `"{prefix}::string::{key}"` and
//! `"{prefix}::binary::{key}"`; binary values are base64. Several stores can
//! share one backend under different prefixes. An empty item reads as absent.

use async_trait::async_trait;
use base64::Engine as _;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use dropnote_core::checkpoint::{KvStore, StoredValue};
use dropnote_core::error::IndexerError;

const STRING_KIND: &str = "string";
const BINARY_KIND: &str = "binary";

/// A synchronous string → string item store (browser-storage shaped).
pub trait StringBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String);
    fn remove_item(&self, key: &str);
    fn item_keys(&self) -> Vec<String>;
}

/// In-process [`StringBackend`].
#[derive(Debug, Default)]
pub struct MapBackend {
    items: Mutex<BTreeMap<String, String>>,
}

impl MapBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StringBackend for MapBackend {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn item_keys(&self) -> Vec<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// A [`KvStore`] that namespaces its keys inside a [`StringBackend`].
pub struct PrefixedStore<B = MapBackend> {
    prefix: String,
    backend: B,
}

impl PrefixedStore<MapBackend> {
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(prefix, MapBackend::new())
    }
}

impl<B: StringBackend> PrefixedStore<B> {
    pub fn new(prefix: impl Into<String>, backend: B) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn item_key(&self, kind: &str, key: &str) -> String {
        format!("{}::{kind}::{key}", self.prefix)
    }

    fn item(&self, kind: &str, key: &str) -> Option<String> {
        self.backend
            .get_item(&self.item_key(kind, key))
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl<B: StringBackend> KvStore for PrefixedStore<B> {
    /// Binary values shadow string values written directly to the backend.
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, IndexerError> {
        if let Some(encoded) = self.item(BINARY_KIND, key) {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&encoded)
                .map_err(|e| IndexerError::Storage(format!("bad base64 under '{key}': {e}")))?;
            return Ok(Some(StoredValue::Bytes(bytes)));
        }
        Ok(self.item(STRING_KIND, key).map(StoredValue::Text))
    }

    /// Writing one kind removes any value of the other kind under `key`.
    async fn set(&self, key: &str, value: StoredValue) -> Result<(), IndexerError> {
        match value {
            StoredValue::Text(s) => {
                self.backend.remove_item(&self.item_key(BINARY_KIND, key));
                self.backend.set_item(&self.item_key(STRING_KIND, key), s);
            }
            StoredValue::Bytes(b) => {
                self.backend.remove_item(&self.item_key(STRING_KIND, key));
                self.backend.set_item(
                    &self.item_key(BINARY_KIND, key),
                    base64::engine::general_purpose::STANDARD.encode(b),
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexerError> {
        self.backend.remove_item(&self.item_key(BINARY_KIND, key));
        self.backend.remove_item(&self.item_key(STRING_KIND, key));
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, IndexerError> {
        let namespace = format!("{}::", self.prefix);
        let keys: BTreeSet<String> = self
            .backend
            .item_keys()
            .iter()
            .filter_map(|k| k.strip_prefix(&namespace))
            .filter_map(|rest| {
                rest.strip_prefix("binary::")
                    .or_else(|| rest.strip_prefix("string::"))
            })
            .map(str::to_string)
            .collect();
        Ok(keys.into_iter().collect())
    }
}
