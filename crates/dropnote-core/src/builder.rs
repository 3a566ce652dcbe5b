//! Fluent builder API for creating dropnote indexers.
//!
//! # Example
//!
//! ```rust,ignore
//! use dropnote_core::{IndexerBuilder, MemoryKvStore};
//! use std::sync::Arc;
//!
//! let indexer = IndexerBuilder::new()
//!     .client(my_ledger_client)
//!     .store(Arc::new(MemoryKvStore::new()))
//!     .lookback_blocks(100_000)
//!     .page_size(50)
//!     .build()?;
//! ```

use std::sync::Arc;

use crate::checkpoint::KvStore;
use crate::client::LedgerClient;
use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::handler::HandlerRegistry;
use crate::indexer::DropnoteIndexer;

/// Fluent builder for [`DropnoteIndexer`].
#[derive(Default)]
pub struct IndexerBuilder {
    client: Option<Arc<dyn LedgerClient>>,
    store: Option<Arc<dyn KvStore>>,
    registry: Option<HandlerRegistry>,
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ledger client (required).
    pub fn client(mut self, client: Arc<dyn LedgerClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the checkpoint store (required).
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the handler registry. Defaults to the built-in
    /// `message`/`announce` handlers on both tables.
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the lookback used when there is no explicit start or checkpoint.
    pub fn lookback_blocks(mut self, blocks: u64) -> Self {
        self.config.lookback_blocks = blocks;
        self
    }

    /// Set the broadcast channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the page size for transaction search.
    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size;
        self
    }

    /// Build the indexer.
    pub fn build(self) -> Result<DropnoteIndexer, IndexerError> {
        let client = self
            .client
            .ok_or_else(|| IndexerError::Config("ledger client is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| IndexerError::Config("checkpoint store is required".into()))?;
        if self.config.page_size == 0 {
            return Err(IndexerError::Config("page_size must be at least 1".into()));
        }
        Ok(DropnoteIndexer::from_parts(
            client,
            store,
            self.registry.unwrap_or_default(),
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryKvStore;
    use crate::client::{BlockStream, TxPage, TxQuery};
    use crate::types::{BlockHeader, NetworkConfig, Source, Transaction};
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl LedgerClient for Offline {
        async fn current_block(&self, _n: &NetworkConfig) -> Result<u64, IndexerError> {
            Err(IndexerError::Rpc("offline".into()))
        }
        async fn block_at(&self, _n: &NetworkConfig, _h: u64) -> Result<BlockHeader, IndexerError> {
            Err(IndexerError::Rpc("offline".into()))
        }
        async fn search_transactions(
            &self,
            _n: &NetworkConfig,
            _q: &TxQuery,
            _page: u32,
        ) -> Result<TxPage, IndexerError> {
            Err(IndexerError::Rpc("offline".into()))
        }
        async fn subscribe_blocks(&self, _n: &NetworkConfig) -> Result<BlockStream, IndexerError> {
            Err(IndexerError::Rpc("offline".into()))
        }
        fn decode_transaction(&self, _raw: &[u8]) -> Option<Transaction> {
            None
        }
        fn default_address(&self, _n: &NetworkConfig) -> Result<String, IndexerError> {
            Ok("cosmos1dev".into())
        }
    }

    #[test]
    fn builder_defaults() {
        let indexer = IndexerBuilder::new()
            .client(Arc::new(Offline))
            .store(Arc::new(MemoryKvStore::new()))
            .build()
            .unwrap();
        assert_eq!(indexer.config(), &IndexerConfig::default());
        assert_eq!(indexer.registry().subtypes(Source::Memo), vec!["announce", "message"]);
    }

    #[test]
    fn builder_custom() {
        let indexer = IndexerBuilder::new()
            .client(Arc::new(Offline))
            .store(Arc::new(MemoryKvStore::new()))
            .registry(HandlerRegistry::new())
            .lookback_blocks(1_000)
            .channel_capacity(16)
            .page_size(25)
            .build()
            .unwrap();

        assert_eq!(indexer.config().lookback_blocks, 1_000);
        assert_eq!(indexer.config().channel_capacity, 16);
        assert_eq!(indexer.config().page_size, 25);
        assert!(indexer.registry().subtypes(Source::Events).is_empty());
    }

    #[test]
    fn missing_parts_are_config_errors() {
        let err = IndexerBuilder::new().store(Arc::new(MemoryKvStore::new())).build();
        assert!(matches!(err, Err(IndexerError::Config(_))));

        let err = IndexerBuilder::new().client(Arc::new(Offline)).build();
        assert!(matches!(err, Err(IndexerError::Config(_))));

        let err = IndexerBuilder::new()
            .client(Arc::new(Offline))
            .store(Arc::new(MemoryKvStore::new()))
            .page_size(0)
            .build();
        assert!(matches!(err, Err(IndexerError::Config(_))));
    }
}
