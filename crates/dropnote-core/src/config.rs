//! Indexer configuration.

use serde::{Deserialize, Serialize};

use crate::window::LOOKBACK_BLOCKS;

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Blocks to look back when neither an explicit start height nor a
    /// checkpoint is available. Default: ~30 days at 3 s blocks.
    pub lookback_blocks: u64,
    /// Capacity of the broadcast channel subscribers receive events on.
    /// Subscribers that fall further behind observe `Lagged`.
    pub channel_capacity: usize,
    /// Page size requested from the ledger client's transaction search.
    pub page_size: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: LOOKBACK_BLOCKS,
            channel_capacity: 1_024,
            page_size: 100,
        }
    }
}
