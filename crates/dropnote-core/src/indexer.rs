//! The dropnote indexer — bounded scans, live watches, and the shared
//! per-transaction pipeline.
//!
//! # Per-transaction pipeline
//! ```text
//! process_tx
//!   ├── result code != 0            → skipped silently
//!   ├── classify → none             → skipped silently
//!   ├── tx hooks → Stop             → skipped silently
//!   ├── publish Tx
//!   ├── memo:   parse_memo          → MemoParse error | dispatch(memo table)
//!   └── events: extract_event (×N)  → EventParse error | dispatch(event table)
//! ```
//!
//! # Feeds
//! - `scan`: paginated search over a height window; pages in order,
//!   transactions within a page concurrently. Never touches the checkpoint.
//! - `watch_address`: per new block, re-query that block for transfers to the
//!   address and spawn one pipeline task per transaction.
//! - `watch`: `watch_address` for every address, one catch-up scan from the
//!   checkpoint, and a block-tip listener that persists the checkpoint.

use futures::future::{join_all, try_join_all};
use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::builder::IndexerBuilder;
use crate::checkpoint::{CheckpointManager, KvStore};
use crate::classify::{classify, dropnote_events};
use crate::client::{LedgerClient, TxQuery};
use crate::config::IndexerConfig;
use crate::error::{HandlerError, IndexerError, NoteError, ParseError};
use crate::extract::extract_event;
use crate::handler::{DispatchContext, HandlerRegistry};
use crate::memo::parse_memo;
use crate::payload::DecodedPayload;
use crate::stream::{IndexerEvent, Publisher, TxDecision, TxEvent, TxHook};
use crate::subscription::Subscription;
use crate::types::{NetworkConfig, NotePosition, Source, Transaction, TxResponse, TxResult};
use crate::window::{self, HeightWindow};

/// Outcome of a bounded [`scan`](DropnoteIndexer::scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub window: HeightWindow,
    /// Pages fetched from the client.
    pub pages: u32,
    /// Raw transactions returned across all pages.
    pub transactions: usize,
    /// Transactions the client could not decode (skipped).
    pub malformed: usize,
}

/// The dropnote indexer. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DropnoteIndexer {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn LedgerClient>,
    checkpoints: CheckpointManager,
    registry: HandlerRegistry,
    hooks: RwLock<Vec<Arc<dyn TxHook>>>,
    publisher: Publisher,
    config: IndexerConfig,
}

impl DropnoteIndexer {
    pub fn builder() -> IndexerBuilder {
        IndexerBuilder::new()
    }

    pub(crate) fn from_parts(
        client: Arc<dyn LedgerClient>,
        store: Arc<dyn KvStore>,
        registry: HandlerRegistry,
        config: IndexerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                checkpoints: CheckpointManager::new(store),
                registry,
                hooks: RwLock::new(vec![]),
                publisher: Publisher::new(config.channel_capacity),
                config,
            }),
        }
    }

    /// Subscribe to published events. Subscribe before `scan`/`watch` to
    /// avoid missing events.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexerEvent> {
        self.inner.publisher.subscribe()
    }

    /// The handler registry; register subtypes here before scanning.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.inner.checkpoints
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.inner.config
    }

    /// Add a hook evaluated for every classified transaction before parsing.
    /// Any hook returning [`TxDecision::Stop`] cancels the transaction.
    pub fn on_tx(&self, hook: impl TxHook + 'static) {
        self.inner
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Resolve the scan window for `network`, consulting the stored
    /// checkpoint when `from` is not given.
    pub async fn resolve_window(
        &self,
        network: &NetworkConfig,
        from: Option<u64>,
        to: Option<u64>,
    ) -> Result<HeightWindow, IndexerError> {
        let checkpoint = match from {
            Some(_) => None,
            None => self.inner.checkpoints.load(network).await?,
        };
        window::resolve(
            self.inner.client.as_ref(),
            network,
            from,
            to,
            checkpoint,
            self.inner.config.lookback_blocks,
        )
        .await
    }

    /// Scan `[from, to]` for transactions that transferred to `address`
    /// (default: the dev wallet).
    ///
    /// `to` defaults to the chain tip and `from` to `to - lookback_blocks`.
    /// Pages are consumed strictly in order; transactions within a page run
    /// concurrently and are all settled before the next page is fetched.
    /// Client failures abort the scan; per-transaction failures are published.
    pub async fn scan(
        &self,
        network: &NetworkConfig,
        address: Option<&str>,
        from: Option<u64>,
        to: Option<u64>,
    ) -> Result<ScanSummary, IndexerError> {
        let address = self.address_or_default(network, address)?;
        let window = window::resolve(
            self.inner.client.as_ref(),
            network,
            from,
            to,
            None,
            self.inner.config.lookback_blocks,
        )
        .await?;

        info!(
            network = %network.name,
            %address,
            from = window.from,
            to = window.to,
            "Starting scan"
        );

        let query = TxQuery::new(address, window.from, window.to).per_page(self.inner.config.page_size);
        let mut summary = ScanSummary {
            window,
            pages: 0,
            transactions: 0,
            malformed: 0,
        };

        let mut page_no = 1;
        loop {
            let page = self
                .inner
                .client
                .search_transactions(network, &query, page_no)
                .await?;
            summary.pages += 1;
            summary.transactions += page.txs.len();

            let mut pending = Vec::with_capacity(page.txs.len());
            for response in &page.txs {
                match self.decode(response) {
                    Some(tx) => pending.push((tx, &response.result)),
                    None => summary.malformed += 1,
                }
            }
            join_all(
                pending
                    .iter()
                    .map(|(tx, result)| self.process_tx(network, tx, result)),
            )
            .await;

            match page.next_page {
                Some(next) if next > page_no => page_no = next,
                Some(next) => {
                    warn!(page = page_no, next, "Client returned a non-advancing page; stopping scan");
                    break;
                }
                None => break,
            }
        }

        info!(
            network = %network.name,
            pages = summary.pages,
            transactions = summary.transactions,
            malformed = summary.malformed,
            "Scan complete"
        );
        Ok(summary)
    }

    /// Watch `address` (default: the dev wallet) for new transfers, block by
    /// block.
    ///
    /// Calling this twice for the same network and address duplicates every
    /// downstream event.
    pub async fn watch_address(
        &self,
        network: &NetworkConfig,
        address: Option<&str>,
    ) -> Result<Subscription, IndexerError> {
        let address = self.address_or_default(network, address)?;
        let mut blocks = self.inner.client.subscribe_blocks(network).await?;

        info!(network = %network.name, %address, "Watching address");

        let indexer = self.clone();
        let network = network.clone();
        let task = tokio::spawn(async move {
            while let Some(item) = blocks.next().await {
                match item {
                    Ok(header) => indexer.process_block(&network, &address, header.height).await,
                    Err(e) => indexer.inner.publisher.error(NoteError::Transport {
                        network: network.name.clone(),
                        txhash: None,
                        reason: e.to_string(),
                    }),
                }
            }
            debug!(network = %network.name, %address, "Block stream closed");
        });
        Ok(Subscription::from_task(task))
    }

    /// Watch `addresses` (default: the dev wallet), catch up from the stored
    /// checkpoint, and keep the checkpoint at the latest block tip.
    ///
    /// Addresses outside the network's prefix are dropped. Returns one handle
    /// that tears down every underlying subscription.
    pub async fn watch(
        &self,
        network: &NetworkConfig,
        addresses: Option<Vec<String>>,
    ) -> Result<Subscription, IndexerError> {
        let addresses = match addresses {
            Some(addresses) => addresses,
            None => vec![self.inner.client.default_address(network)?],
        };
        let (addresses, foreign): (Vec<String>, Vec<String>) = addresses
            .into_iter()
            .partition(|a| network.owns_address(a));
        for address in &foreign {
            warn!(
                network = %network.name,
                %address,
                prefix = %network.address_prefix,
                "Ignoring address outside network prefix"
            );
        }

        let mut subscriptions = Vec::with_capacity(addresses.len() + 1);
        for address in &addresses {
            match self.watch_address(network, Some(address)).await {
                Ok(sub) => subscriptions.push(sub),
                Err(e) => {
                    Subscription::merge(subscriptions).unsubscribe();
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.catch_up(network, &addresses).await {
            Subscription::merge(subscriptions).unsubscribe();
            return Err(e);
        }

        match self.track_checkpoint(network).await {
            Ok(sub) => subscriptions.push(sub),
            Err(e) => {
                Subscription::merge(subscriptions).unsubscribe();
                return Err(e);
            }
        }

        Ok(Subscription::merge(subscriptions))
    }

    /// Run a single transaction through classify → hook → parse → dispatch.
    ///
    /// Never fails: every per-transaction problem is published as a
    /// [`NoteError`].
    pub async fn process_tx(&self, network: &NetworkConfig, tx: &Transaction, result: &TxResult) {
        if !result.is_success() {
            return;
        }
        let Some(source) = classify(tx.memo.as_deref(), &result.events) else {
            return;
        };

        let txhash = result.txhash.clone().unwrap_or_else(|| tx.hash.clone());
        let event = TxEvent {
            network: network.clone(),
            tx: tx.clone(),
            txhash: txhash.clone(),
            height: result.height,
            source,
        };
        if self.run_hooks(&event) == TxDecision::Stop {
            debug!(network = %network.name, %txhash, "Transaction cancelled by hook");
            return;
        }
        self.inner.publisher.publish(IndexerEvent::Tx(event));

        let scope = TxScope {
            network: network.clone(),
            txhash,
            height: result.height,
            memo: tx.memo.clone(),
        };
        match source {
            Source::Memo => {
                let memo = tx.memo.as_deref().unwrap_or_default();
                match parse_memo(memo, &result.events) {
                    Ok(payload) => self.dispatch(&scope, NotePosition::Memo, payload).await,
                    Err(cause) => self.inner.publisher.error(scope.parse_error(NotePosition::Memo, cause)),
                }
            }
            Source::Events => {
                let scope = &scope;
                join_all(dropnote_events(&result.events).map(|(index, event)| async move {
                    let position = NotePosition::Event(index);
                    match extract_event(event) {
                        Ok(payload) => self.dispatch(scope, position, payload).await,
                        Err(cause) => self.inner.publisher.error(scope.parse_error(position, cause)),
                    }
                }))
                .await;
            }
        }
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    fn address_or_default(
        &self,
        network: &NetworkConfig,
        address: Option<&str>,
    ) -> Result<String, IndexerError> {
        match address {
            Some(address) => Ok(address.to_string()),
            None => self.inner.client.default_address(network),
        }
    }

    fn decode(&self, response: &TxResponse) -> Option<Transaction> {
        let tx = self.inner.client.decode_transaction(&response.tx);
        if tx.is_none() {
            debug!(
                height = response.result.height,
                txhash = ?response.result.txhash,
                "Skipping malformed transaction"
            );
        }
        tx
    }

    fn run_hooks(&self, event: &TxEvent) -> TxDecision {
        let hooks = self
            .inner
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if hooks.iter().any(|h| h.on_tx(event) == TxDecision::Stop) {
            TxDecision::Stop
        } else {
            TxDecision::Continue
        }
    }

    /// Catch-up scan for every watched address over one shared window.
    async fn catch_up(&self, network: &NetworkConfig, addresses: &[String]) -> Result<(), IndexerError> {
        if addresses.is_empty() {
            return Ok(());
        }
        let window = self.resolve_window(network, None, None).await?;
        info!(
            network = %network.name,
            from = window.from,
            to = window.to,
            "Catching up before live watch"
        );
        try_join_all(
            addresses
                .iter()
                .map(|a| self.scan(network, Some(a), Some(window.from), Some(window.to))),
        )
        .await?;
        Ok(())
    }

    /// Persist every new block tip as the network's checkpoint.
    async fn track_checkpoint(&self, network: &NetworkConfig) -> Result<Subscription, IndexerError> {
        let mut blocks = self.inner.client.subscribe_blocks(network).await?;
        let indexer = self.clone();
        let network = network.clone();
        let task = tokio::spawn(async move {
            while let Some(item) = blocks.next().await {
                let saved = match item {
                    Ok(header) => indexer.inner.checkpoints.save(&network, header.height).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = saved {
                    indexer.inner.publisher.error(NoteError::Transport {
                        network: network.name.clone(),
                        txhash: None,
                        reason: e.to_string(),
                    });
                }
            }
        });
        Ok(Subscription::from_task(task))
    }

    /// Query a single block for transfers to `address` and spawn one pipeline
    /// task per transaction, in client order.
    async fn process_block(&self, network: &NetworkConfig, address: &str, height: u64) {
        let query = TxQuery::new(address, height, height).per_page(self.inner.config.page_size);
        let mut page_no = 1;
        loop {
            let page = match self
                .inner
                .client
                .search_transactions(network, &query, page_no)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.inner.publisher.error(NoteError::Transport {
                        network: network.name.clone(),
                        txhash: None,
                        reason: format!("block {height}: {e}"),
                    });
                    return;
                }
            };

            for response in page.txs {
                let Some(tx) = self.decode(&response) else { continue };
                let indexer = self.clone();
                let network = network.clone();
                tokio::spawn(async move {
                    indexer.process_tx(&network, &tx, &response.result).await;
                });
            }

            match page.next_page {
                Some(next) if next > page_no => page_no = next,
                _ => return,
            }
        }
    }

    /// Look up the handler for `payload` and run it in its own task.
    ///
    /// Unregistered subtypes are a silent no-op.
    async fn dispatch(&self, scope: &TxScope, position: NotePosition, payload: DecodedPayload) {
        let source = match position {
            NotePosition::Memo => Source::Memo,
            NotePosition::Event(_) => Source::Events,
        };
        let Some(handler) = self.inner.registry.handler_for(source, &payload.subtype) else {
            debug!(
                txhash = %scope.txhash,
                subtype = %payload.subtype,
                %source,
                "No handler registered for subtype"
            );
            return;
        };

        let subtype = payload.subtype.clone();
        let ctx = DispatchContext {
            network: scope.network.clone(),
            txhash: scope.txhash.clone(),
            height: scope.height,
            source,
            position,
            client: self.inner.client.clone(),
            publisher: self.inner.publisher.clone(),
        };
        let outcome = tokio::spawn(async move { handler.handle(&ctx, &payload).await }).await;

        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(HandlerError::Parse(cause))) => {
                self.inner.publisher.error(scope.parse_error(position, cause));
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) if e.is_panic() => format!("handler panicked: {}", panic_message(e.into_panic())),
            Err(e) => e.to_string(),
        };
        self.inner.publisher.error(NoteError::Handler {
            network: scope.network.name.clone(),
            txhash: scope.txhash.clone(),
            origin: source,
            event_index: match position {
                NotePosition::Event(i) => Some(i),
                NotePosition::Memo => None,
            },
            subtype,
            reason,
        });
    }
}

/// Error scoping for one transaction.
struct TxScope {
    network: NetworkConfig,
    txhash: String,
    height: u64,
    memo: Option<String>,
}

impl TxScope {
    fn parse_error(&self, position: NotePosition, cause: ParseError) -> NoteError {
        match position {
            NotePosition::Memo => NoteError::MemoParse {
                network: self.network.name.clone(),
                txhash: self.txhash.clone(),
                memo: self.memo.clone().unwrap_or_default(),
                cause,
            },
            NotePosition::Event(event_index) => NoteError::EventParse {
                network: self.network.name.clone(),
                txhash: self.txhash.clone(),
                event_index,
                cause,
            },
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
