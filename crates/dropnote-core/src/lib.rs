//! dropnote-core — indexer for short on-chain messages ("dropnotes") carried
//! by Cosmos-SDK transactions.
//!
//! A dropnote travels either in a transaction memo
//! (`dropnote[.subtype]:[body]`) or as structured `dropnote` events emitted by
//! a contract. The indexer finds them, decodes them, dispatches them to
//! subtype handlers, and publishes the results.
//!
//! # Architecture
//!
//! ```text
//! IndexerBuilder → DropnoteIndexer
//!                      ├── LedgerClient      (blocks, tx search, subscriptions)
//!                      ├── window::resolve   (lookback / checkpoint / tip)
//!                      ├── classify          (memo first, then events)
//!                      ├── memo / extract    (payload decoding)
//!                      ├── TxHook            (pre-dispatch veto)
//!                      ├── HandlerRegistry   (memo + event subtype tables)
//!                      ├── CheckpointManager (KvStore-backed block height)
//!                      └── Publisher         (broadcast of IndexerEvent)
//! ```

pub mod builder;
pub mod checkpoint;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod indexer;
pub mod memo;
pub mod payload;
pub mod stream;
pub mod subscription;
pub mod types;
pub mod window;

pub use builder::IndexerBuilder;
pub use checkpoint::{CheckpointManager, KvStore, MemoryKvStore, StoredValue};
pub use classify::{classify, dropnote_events};
pub use client::{BlockStream, LedgerClient, TxPage, TxQuery, DEV_PUBKEY_HEX};
pub use config::IndexerConfig;
pub use error::{ErrorKind, HandlerError, IndexerError, NoteError, ParseError};
pub use extract::extract_event;
pub use handler::{AnnounceHandler, DispatchContext, HandlerRegistry, MessageHandler, NoteHandler};
pub use indexer::{DropnoteIndexer, ScanSummary};
pub use memo::{compose_announce_memo, compose_message_memo, parse_memo};
pub use payload::DecodedPayload;
pub use stream::{AnnounceEvent, IndexerEvent, NoteEvent, Publisher, TxDecision, TxEvent, TxHook};
pub use subscription::Subscription;
pub use types::{
    AbciEvent, Announcement, BlockHeader, EventAttribute, NetworkConfig, Note, NotePosition, Source,
    Transaction, TxResponse, TxResult,
};
pub use window::{HeightWindow, LOOKBACK_BLOCKS};
