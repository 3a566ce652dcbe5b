//! dropnote-storage — checkpoint store adapters for the dropnote indexer.
//!
//! Backends (all implement [`dropnote_core::KvStore`]):
//! - [`MemoryKvStore`] — in-memory (re-exported from core; no persistence)
//! - [`json`] — a single JSON file with debounced writes
//! - [`prefixed`] — namespaced keys over any string-only backend
//! - [`sqlite`] — SQLite via `sqlx` (feature `sqlite`)

pub mod json;
pub mod prefixed;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use dropnote_core::checkpoint::MemoryKvStore;
pub use json::JsonFileStore;
pub use prefixed::{MapBackend, PrefixedStore, StringBackend};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
