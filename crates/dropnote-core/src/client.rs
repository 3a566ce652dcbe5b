//! Ledger client abstraction.
//!
//! The indexer never talks to a node directly: block retrieval, transaction
//! search, subscriptions, decoding, and address derivation all go through a
//! [`LedgerClient`] supplied by the host application. Retries and reconnection
//! are the client's responsibility.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::IndexerError;
use crate::types::{BlockHeader, NetworkConfig, Transaction, TxResponse};

/// A stream of new block headers from a single network.
///
/// Dropping the stream ends the underlying subscription.
pub type BlockStream = Pin<Box<dyn Stream<Item = Result<BlockHeader, IndexerError>> + Send>>;

/// Compressed secp256k1 public key of the well-known dev wallet. Senders ping
/// its address so indexers that watch nothing else still see every dropnote.
pub const DEV_PUBKEY_HEX: &str =
    "0221f705fbd96c33d07dda2599055092b82cdf4ecdc1f799771069f73279e9a61b";

/// "Transactions that transferred funds to `recipient` within
/// `[from_height, to_height]`" (`transfer.recipient` / `tx.height` query).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxQuery {
    pub recipient: String,
    pub from_height: u64,
    pub to_height: u64,
    /// Requested page size; clients may cap it.
    pub per_page: u32,
}

impl TxQuery {
    pub fn new(recipient: impl Into<String>, from_height: u64, to_height: u64) -> Self {
        Self {
            recipient: recipient.into(),
            from_height,
            to_height,
            per_page: 100,
        }
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }
}

/// One page of transaction search results.
#[derive(Debug, Clone, Default)]
pub struct TxPage {
    pub txs: Vec<TxResponse>,
    /// Page number to request next, or `None` after the last page.
    pub next_page: Option<u32>,
}

impl TxPage {
    /// A final page.
    pub fn last(txs: Vec<TxResponse>) -> Self {
        Self { txs, next_page: None }
    }
}

/// Operations the indexer needs from a Cosmos-SDK ledger client.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current chain tip height.
    async fn current_block(&self, network: &NetworkConfig) -> Result<u64, IndexerError>;

    /// Header of the block at `height`.
    async fn block_at(&self, network: &NetworkConfig, height: u64) -> Result<BlockHeader, IndexerError>;

    /// Fetch one page (1-based) of transactions matching `query`.
    async fn search_transactions(
        &self,
        network: &NetworkConfig,
        query: &TxQuery,
        page: u32,
    ) -> Result<TxPage, IndexerError>;

    /// Subscribe to new block headers.
    async fn subscribe_blocks(&self, network: &NetworkConfig) -> Result<BlockStream, IndexerError>;

    /// Decode raw transaction bytes; `None` marks a malformed transaction.
    fn decode_transaction(&self, raw: &[u8]) -> Option<Transaction>;

    /// Address of the dev wallet ([`DEV_PUBKEY_HEX`]) on `network`.
    fn default_address(&self, network: &NetworkConfig) -> Result<String, IndexerError>;
}
