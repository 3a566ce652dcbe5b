//! Note handler trait, dispatch context, and subtype-keyed registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::client::LedgerClient;
use crate::error::{HandlerError, ParseError};
use crate::payload::{DecodedPayload, SUBTYPE_ANNOUNCE, SUBTYPE_MESSAGE};
use crate::stream::Publisher;
use crate::types::{Announcement, NetworkConfig, Note, NotePosition, Source};

/// Everything a handler needs to turn a payload into a published record.
#[derive(Clone)]
pub struct DispatchContext {
    pub network: NetworkConfig,
    pub txhash: String,
    pub height: u64,
    pub source: Source,
    pub position: NotePosition,
    pub client: Arc<dyn LedgerClient>,
    pub publisher: Publisher,
}

impl DispatchContext {
    /// Time of the block that included the transaction (one client round-trip).
    pub async fn block_time(&self) -> Result<DateTime<Utc>, HandlerError> {
        let block = self.client.block_at(&self.network, self.height).await?;
        Ok(block.time)
    }
}

/// Trait for subtype handlers.
///
/// A handler turns a decoded payload into a domain record and publishes it
/// through [`DispatchContext::publisher`]. Errors (and panics) are caught at
/// the dispatch boundary and published as
/// [`NoteError`](crate::error::NoteError)s.
#[async_trait]
pub trait NoteHandler: Send + Sync {
    async fn handle(&self, ctx: &DispatchContext, payload: &DecodedPayload) -> Result<(), HandlerError>;
}

/// Built-in handler for the `message` subtype: publishes a [`Note`].
pub struct MessageHandler;

#[async_trait]
impl NoteHandler for MessageHandler {
    async fn handle(&self, ctx: &DispatchContext, payload: &DecodedPayload) -> Result<(), HandlerError> {
        let sender = payload.get("sender").filter(|s| !s.is_empty()).ok_or(ParseError::MissingSender)?;
        let recipient = payload.require("recipient")?;
        let message = payload.require("message")?;

        let note = Note {
            txhash: ctx.txhash.clone(),
            chain: ctx.network.name.clone(),
            position: ctx.position,
            timestamp: ctx.block_time().await?,
            sender: sender.to_string(),
            message: message.to_string(),
            encrypted: false,
        };
        ctx.publisher.note(
            &ctx.network,
            note,
            vec![sender.to_string(), recipient.to_string()],
        );
        Ok(())
    }
}

/// Built-in handler for the `announce` subtype: publishes an [`Announcement`].
pub struct AnnounceHandler;

#[async_trait]
impl NoteHandler for AnnounceHandler {
    async fn handle(&self, ctx: &DispatchContext, payload: &DecodedPayload) -> Result<(), HandlerError> {
        let sender = payload.get("sender").filter(|s| !s.is_empty()).ok_or(ParseError::MissingSender)?;
        let message = payload.require("message")?;

        let announcement = Announcement {
            txhash: ctx.txhash.clone(),
            chain: ctx.network.name.clone(),
            position: ctx.position,
            sender: sender.to_string(),
            message: message.to_string(),
            timestamp: ctx.block_time().await?,
            encrypted: false,
        };
        ctx.publisher.announce(&ctx.network, announcement);
        Ok(())
    }
}

type HandlerTable = RwLock<HashMap<String, Arc<dyn NoteHandler>>>;

/// Registry of memo-subtype and event-subtype handlers.
///
/// Registering a subtype again replaces the previous handler, which lets host
/// applications override the built-in `message`/`announce` handling.
/// Subtypes are matched lowercased.
pub struct HandlerRegistry {
    memo_handlers: HandlerTable,
    event_handlers: HandlerTable,
}

impl HandlerRegistry {
    /// An empty registry: every subtype dispatches to nothing.
    pub fn new() -> Self {
        Self {
            memo_handlers: RwLock::new(HashMap::new()),
            event_handlers: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the built-in `message` and `announce` handlers on both
    /// tables.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let message: Arc<dyn NoteHandler> = Arc::new(MessageHandler);
        let announce: Arc<dyn NoteHandler> = Arc::new(AnnounceHandler);
        registry.on_memo(SUBTYPE_MESSAGE, message.clone());
        registry.on_memo(SUBTYPE_ANNOUNCE, announce.clone());
        registry.on_event(SUBTYPE_MESSAGE, message);
        registry.on_event(SUBTYPE_ANNOUNCE, announce);
        registry
    }

    /// Register (or replace) the handler for a memo subtype.
    pub fn on_memo(&self, subtype: &str, handler: Arc<dyn NoteHandler>) {
        insert(&self.memo_handlers, subtype, handler);
    }

    /// Register (or replace) the handler for an event subtype.
    pub fn on_event(&self, subtype: &str, handler: Arc<dyn NoteHandler>) {
        insert(&self.event_handlers, subtype, handler);
    }

    /// Handler for `subtype` in the table for `source`, if any.
    pub fn handler_for(&self, source: Source, subtype: &str) -> Option<Arc<dyn NoteHandler>> {
        let table = match source {
            Source::Memo => &self.memo_handlers,
            Source::Events => &self.event_handlers,
        };
        table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&subtype.to_ascii_lowercase())
            .cloned()
    }

    /// Registered subtypes for `source`, sorted.
    pub fn subtypes(&self, source: Source) -> Vec<String> {
        let table = match source {
            Source::Memo => &self.memo_handlers,
            Source::Events => &self.event_handlers,
        };
        let mut subtypes: Vec<String> = table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        subtypes.sort();
        subtypes
    }
}

fn insert(table: &HandlerTable, subtype: &str, handler: Arc<dyn NoteHandler>) {
    let subtype = subtype.to_ascii_lowercase();
    let replaced = table
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(subtype.clone(), handler)
        .is_some();
    if replaced {
        tracing::debug!(%subtype, "Replaced dropnote handler");
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter(Arc<AtomicU32>);

    #[async_trait]
    impl NoteHandler for Counter {
        async fn handle(&self, _c: &DispatchContext, _p: &DecodedPayload) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn defaults_cover_both_tables() {
        let registry = HandlerRegistry::with_defaults();
        assert_eq!(registry.subtypes(Source::Memo), vec!["announce", "message"]);
        assert_eq!(registry.subtypes(Source::Events), vec!["announce", "message"]);
        assert!(HandlerRegistry::new().subtypes(Source::Memo).is_empty());
    }

    #[test]
    fn unknown_subtype_has_no_handler() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.handler_for(Source::Memo, "reaction").is_none());
    }

    #[test]
    fn tables_are_independent() {
        let registry = HandlerRegistry::new();
        registry.on_event("reaction", Arc::new(Counter(Arc::new(AtomicU32::new(0)))));
        assert!(registry.handler_for(Source::Events, "reaction").is_some());
        assert!(registry.handler_for(Source::Memo, "reaction").is_none());
    }

    #[test]
    fn reregistration_replaces() {
        let registry = HandlerRegistry::with_defaults();
        let replacement: Arc<dyn NoteHandler> = Arc::new(Counter(Arc::new(AtomicU32::new(0))));
        registry.on_memo("Message", replacement.clone());

        let found = registry.handler_for(Source::Memo, "message").unwrap();
        assert!(Arc::ptr_eq(&found, &replacement));
        assert_eq!(registry.subtypes(Source::Memo).len(), 2);
    }
}
