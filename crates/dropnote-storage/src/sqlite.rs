//! SQLite store for dropnote checkpoints.
//!
//! Persists key/value pairs to a single SQLite file.
//! Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use dropnote_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./dropnote.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use dropnote_core::checkpoint::{KvStore, StoredValue};
use dropnote_core::error::IndexerError;

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// SQLite-backed [`KvStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./dropnote.db"`) or a full
    /// SQLite URL (`"sqlite:./dropnote.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Limited to one connection: every in-memory connection is its own
    /// database. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                text_value TEXT,
                blob_value BLOB
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, IndexerError> {
        let row = sqlx::query("SELECT text_value, blob_value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.and_then(|r| {
            let text: Option<String> = r.get("text_value");
            let blob: Option<Vec<u8>> = r.get("blob_value");
            text.map(StoredValue::Text).or(blob.map(StoredValue::Bytes))
        }))
    }

    async fn set(&self, key: &str, value: StoredValue) -> Result<(), IndexerError> {
        let (text, blob) = match value {
            StoredValue::Text(s) => (Some(s), None),
            StoredValue::Bytes(b) => (None, Some(b)),
        };
        sqlx::query(
            "INSERT INTO kv (key, text_value, blob_value) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                text_value = excluded.text_value,
                blob_value = excluded.blob_value",
        )
        .bind(key)
        .bind(text)
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(%key, "kv saved");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, IndexerError> {
        let rows = sqlx::query("SELECT key FROM kv ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("key")).collect())
    }
}
