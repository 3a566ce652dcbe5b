//! Error types for the dropnote pipeline.
//!
//! Two layers:
//! - [`IndexerError`] — transport and setup failures, returned to the caller
//!   of `scan` / `watch` / store operations.
//! - [`NoteError`] — per-transaction failures (parse, handler, in-flight
//!   transport), never returned, only published on the indexer's event stream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Source;

/// Errors returned by the ledger client, the checkpoint store, or indexer setup.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Why a memo or event payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("not a dropnote payload")]
    NotDropnote,

    #[error("encrypted payloads are not supported")]
    EncryptionUnsupported,

    #[error("malformed body: {0}")]
    Malformed(String),

    #[error("recipient is empty")]
    EmptyRecipient,

    #[error("message is empty")]
    EmptyMessage,

    #[error("sender could not be resolved")]
    MissingSender,

    #[error("missing required attribute '{0}'")]
    MissingAttribute(String),
}

/// Errors a [`NoteHandler`](crate::handler::NoteHandler) may return.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transport(#[from] IndexerError),

    #[error("{0}")]
    Custom(String),
}

/// Coarse classification of a [`NoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Transport,
    MemoParse,
    EventParse,
    Handler,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::MemoParse => write!(f, "memo-parse"),
            Self::EventParse => write!(f, "event-parse"),
            Self::Handler => write!(f, "handler"),
        }
    }
}

/// A failure scoped to a single transaction (or a single event within it).
///
/// Published on the indexer's event stream; it never aborts a scan or watch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("[{network}] malformed memo in tx {txhash}: {cause}")]
    MemoParse {
        network: String,
        txhash: String,
        memo: String,
        cause: ParseError,
    },

    #[error("[{network}] malformed dropnote event #{event_index} in tx {txhash}: {cause}")]
    EventParse {
        network: String,
        txhash: String,
        event_index: usize,
        cause: ParseError,
    },

    #[error("[{network}] handler for '{subtype}' failed on tx {txhash} ({origin}): {reason}")]
    Handler {
        network: String,
        txhash: String,
        origin: Source,
        event_index: Option<usize>,
        subtype: String,
        reason: String,
    },

    #[error("[{network}] transport error while watching: {reason}")]
    Transport {
        network: String,
        txhash: Option<String>,
        reason: String,
    },
}

impl NoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MemoParse { .. } => ErrorKind::MemoParse,
            Self::EventParse { .. } => ErrorKind::EventParse,
            Self::Handler { .. } => ErrorKind::Handler,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    pub fn network(&self) -> &str {
        match self {
            Self::MemoParse { network, .. }
            | Self::EventParse { network, .. }
            | Self::Handler { network, .. }
            | Self::Transport { network, .. } => network,
        }
    }

    /// Hash of the transaction this error belongs to, if any.
    pub fn txhash(&self) -> Option<&str> {
        match self {
            Self::MemoParse { txhash, .. }
            | Self::EventParse { txhash, .. }
            | Self::Handler { txhash, .. } => Some(txhash),
            Self::Transport { txhash, .. } => txhash.as_deref(),
        }
    }

    /// Index of the offending event within the transaction's event list.
    pub fn event_index(&self) -> Option<usize> {
        match self {
            Self::EventParse { event_index, .. } => Some(*event_index),
            Self::Handler { event_index, .. } => *event_index,
            _ => None,
        }
    }

    /// The underlying parse cause, for parse errors.
    pub fn parse_cause(&self) -> Option<&ParseError> {
        match self {
            Self::MemoParse { cause, .. } | Self::EventParse { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_parse_error_exposes_scope() {
        let err = NoteError::EventParse {
            network: "neutron".into(),
            txhash: "ABCD".into(),
            event_index: 3,
            cause: ParseError::MissingAttribute("message".into()),
        };
        assert_eq!(err.kind(), ErrorKind::EventParse);
        assert_eq!(err.txhash(), Some("ABCD"));
        assert_eq!(err.event_index(), Some(3));
        assert_eq!(
            err.to_string(),
            "[neutron] malformed dropnote event #3 in tx ABCD: missing required attribute 'message'"
        );
    }

    #[test]
    fn handler_error_wraps_parse_cause() {
        let err: HandlerError = ParseError::MissingSender.into();
        assert!(matches!(err, HandlerError::Parse(ParseError::MissingSender)));
    }

    #[test]
    fn kind_display_is_kebab_case() {
        assert_eq!(ErrorKind::MemoParse.to_string(), "memo-parse");
        assert_eq!(ErrorKind::Transport.to_string(), "transport");
    }
}
