//! Height window resolver — computes the inclusive `[from, to]` scan range.

use serde::{Deserialize, Serialize};

use crate::client::LedgerClient;
use crate::error::IndexerError;
use crate::types::NetworkConfig;

/// Default lookback: ~30 days at an assumed 3 s block interval.
pub const LOOKBACK_BLOCKS: u64 = 864_000;

/// An inclusive block-height range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightWindow {
    pub from: u64,
    pub to: u64,
}

impl HeightWindow {
    /// Build a window, clamping `from` to `to` if the bounds are inverted.
    pub fn clamped(from: u64, to: u64) -> Self {
        Self {
            from: from.min(to),
            to,
        }
    }

    /// Number of blocks covered (never zero: both bounds are inclusive).
    /// Saturates for inverted or full-range windows.
    pub fn block_count(&self) -> u64 {
        self.to.saturating_sub(self.from).saturating_add(1)
    }

    pub fn contains(&self, height: u64) -> bool {
        (self.from..=self.to).contains(&height)
    }
}

/// Resolve the scan window for `network`.
///
/// - `to` defaults to the current chain tip (one client round-trip).
/// - `from` defaults to `checkpoint`, else `to - lookback` (saturating).
///
/// Client failures propagate; nothing is retried.
pub async fn resolve(
    client: &dyn LedgerClient,
    network: &NetworkConfig,
    explicit_from: Option<u64>,
    explicit_to: Option<u64>,
    checkpoint: Option<u64>,
    lookback: u64,
) -> Result<HeightWindow, IndexerError> {
    let to = match explicit_to {
        Some(to) => to,
        None => client.current_block(network).await?,
    };
    let from = explicit_from
        .or(checkpoint)
        .unwrap_or_else(|| to.saturating_sub(lookback));
    Ok(HeightWindow::clamped(from, to))
}
