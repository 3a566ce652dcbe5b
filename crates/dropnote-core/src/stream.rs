//! Published indexer events and the pre-dispatch transaction hook.
//!
//! Subscribers receive [`IndexerEvent`]s over a `tokio::sync::broadcast`
//! channel. Delivery is at-least-once across feeds: a transaction seen by both
//! a scan and a live watch is published twice.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::NoteError;
use crate::types::{Announcement, NetworkConfig, Note, Source, Transaction};

/// A classified transaction, about to be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    pub network: NetworkConfig,
    pub tx: Transaction,
    /// Hash reported by the result, falling back to the decoded transaction's.
    pub txhash: String,
    pub height: u64,
    /// The convention this transaction was matched by.
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub network: NetworkConfig,
    pub note: Note,
    /// Sender and recipient, sorted.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceEvent {
    pub network: NetworkConfig,
    pub announcement: Announcement,
}

/// Everything the indexer publishes.
#[derive(Debug, Clone)]
pub enum IndexerEvent {
    Tx(TxEvent),
    Note(NoteEvent),
    Announce(AnnounceEvent),
    Error(NoteError),
}

/// Decision returned by a [`TxHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDecision {
    Continue,
    /// Stop processing this transaction: no parse, no dispatch, no error.
    Stop,
}

/// Evaluated synchronously for every classified transaction before parsing.
///
/// Implemented for any `Fn(&TxEvent) -> TxDecision`.
pub trait TxHook: Send + Sync {
    fn on_tx(&self, event: &TxEvent) -> TxDecision;
}

impl<F> TxHook for F
where
    F: Fn(&TxEvent) -> TxDecision + Send + Sync,
{
    fn on_tx(&self, event: &TxEvent) -> TxDecision {
        self(event)
    }
}

/// Cloneable sending half handed to handlers.
#[derive(Clone)]
pub struct Publisher {
    tx: broadcast::Sender<IndexerEvent>,
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: IndexerEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish a note; `members` are sorted here.
    pub fn note(&self, network: &NetworkConfig, note: Note, mut members: Vec<String>) {
        members.sort();
        tracing::info!(
            network = %network.name,
            txhash = %note.txhash,
            position = %note.position,
            "Note indexed"
        );
        self.publish(IndexerEvent::Note(NoteEvent {
            network: network.clone(),
            note,
            members,
        }));
    }

    pub fn announce(&self, network: &NetworkConfig, announcement: Announcement) {
        tracing::info!(
            network = %network.name,
            txhash = %announcement.txhash,
            position = %announcement.position,
            "Announcement indexed"
        );
        self.publish(IndexerEvent::Announce(AnnounceEvent {
            network: network.clone(),
            announcement,
        }));
    }

    pub fn error(&self, error: NoteError) {
        tracing::warn!(kind = %error.kind(), "{error}");
        self.publish(IndexerEvent::Error(error));
    }
}
