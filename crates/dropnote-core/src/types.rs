//! Shared types for the indexing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── NetworkConfig ────────────────────────────────────────────────────────────

/// The chain a scan or watch runs against.
///
/// Opaque to the pipeline beyond its name (checkpoint keys, note `chain`) and
/// its bech32 address prefix (address filtering). The ledger client resolves
/// it to endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Registered chain name (e.g. `"neutron"`).
    pub name: String,
    /// Bech32 human-readable prefix (e.g. `"neutron"`, `"cosmos"`).
    pub address_prefix: String,
}

impl NetworkConfig {
    pub fn new(name: impl Into<String>, address_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address_prefix: address_prefix.into(),
        }
    }

    /// Checkpoint key for this network: `"{name}.height"`.
    pub fn height_key(&self) -> String {
        format!("{}.height", self.name)
    }

    /// Returns `true` if `address` belongs to this network's address space.
    pub fn owns_address(&self, address: &str) -> bool {
        address.starts_with(&self.address_prefix)
    }
}

// ─── Ledger results ───────────────────────────────────────────────────────────

/// A single `{key, value}` attribute on an ABCI event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// An event emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl AbciEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: vec![],
        }
    }

    /// Append an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// First value of attribute `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// First non-empty value of attribute `key`.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

/// Execution result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// ABCI result code; `None` or `Some(0)` means success.
    #[serde(default)]
    pub code: Option<u32>,
    /// Transaction hash, when the client reports it alongside the result.
    #[serde(default)]
    pub txhash: Option<String>,
    pub height: u64,
    #[serde(default)]
    pub events: Vec<AbciEvent>,
}

impl TxResult {
    /// Returns `true` if the ledger executed the transaction successfully.
    pub fn is_success(&self) -> bool {
        self.code.unwrap_or(0) == 0
    }

    /// The sender of the transaction: `sender` attribute of the first
    /// `message` event (the bank module's standard event).
    pub fn sender(&self) -> Option<&str> {
        crate::memo::find_sender(&self.events)
    }
}

/// A decoded transaction — only the parts the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Hash computed by the client from the raw bytes.
    pub hash: String,
    /// Free-text memo from the transaction body.
    #[serde(default)]
    pub memo: Option<String>,
}

/// A raw transaction as returned by a search, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    /// Encoded transaction bytes; decoded via
    /// [`LedgerClient::decode_transaction`](crate::client::LedgerClient::decode_transaction).
    pub tx: Vec<u8>,
    pub result: TxResult,
}

/// A block header, as delivered by block subscriptions and `block_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub time: DateTime<Utc>,
}

// ─── Source & position ────────────────────────────────────────────────────────

/// Which convention produced a match for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Memo,
    Events,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memo => write!(f, "memo"),
            Self::Events => write!(f, "events"),
        }
    }
}

/// Where within a transaction a note was found.
///
/// Serialized as the string `"memo"` or as the bare event index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotePosition {
    /// The transaction memo.
    Memo,
    /// Index into the transaction result's event list.
    Event(usize),
}

impl std::fmt::Display for NotePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memo => write!(f, "memo"),
            Self::Event(i) => write!(f, "{i}"),
        }
    }
}

impl Serialize for NotePosition {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Memo => s.serialize_str("memo"),
            Self::Event(i) => s.serialize_u64(*i as u64),
        }
    }
}

impl<'de> Deserialize<'de> for NotePosition {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Label(String),
        }
        match Raw::deserialize(d)? {
            Raw::Index(i) => Ok(Self::Event(i)),
            Raw::Label(s) if s == "memo" => Ok(Self::Memo),
            Raw::Label(s) => Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&s),
                &"\"memo\" or an event index",
            )),
        }
    }
}

// ─── Domain records ───────────────────────────────────────────────────────────

/// A decoded sender → recipient message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Hash of the transaction this note was found in.
    pub txhash: String,
    /// Name of the chain.
    pub chain: String,
    pub position: NotePosition,
    /// Time of the block that included the transaction.
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub message: String,
    pub encrypted: bool,
}

/// A decoded broadcast message with no recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub txhash: String,
    pub chain: String,
    pub position: NotePosition,
    /// Typically the address of the contract that emitted the announcement.
    pub sender: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub encrypted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_key_is_network_qualified() {
        let net = NetworkConfig::new("neutron", "neutron");
        assert_eq!(net.height_key(), "neutron.height");
    }

    #[test]
    fn owns_address_by_prefix() {
        let net = NetworkConfig::new("cosmoshub", "cosmos");
        assert!(net.owns_address("cosmos1qqqq"));
        assert!(!net.owns_address("osmo1qqqq"));
    }

    #[test]
    fn tx_result_success_codes() {
        let mut res = TxResult {
            code: None,
            txhash: None,
            height: 1,
            events: vec![],
        };
        assert!(res.is_success());
        res.code = Some(0);
        assert!(res.is_success());
        res.code = Some(5);
        assert!(!res.is_success());
    }

    #[test]
    fn sender_comes_from_first_message_event() {
        let res = TxResult {
            code: Some(0),
            txhash: None,
            height: 1,
            events: vec![
                AbciEvent::new("coin_spent").attr("spender", "cosmos1spender"),
                AbciEvent::new("message").attr("action", "/cosmos.bank.v1beta1.MsgSend"),
                AbciEvent::new("message").attr("sender", "cosmos1second"),
            ],
        };
        // first `message` event has no sender → unresolved
        assert_eq!(res.sender(), None);

        let res = TxResult {
            events: vec![AbciEvent::new("message").attr("sender", "cosmos1xyz")],
            ..res
        };
        assert_eq!(res.sender(), Some("cosmos1xyz"));
    }

    #[test]
    fn position_serializes_as_memo_or_index() {
        assert_eq!(serde_json::to_string(&NotePosition::Memo).unwrap(), "\"memo\"");
        assert_eq!(serde_json::to_string(&NotePosition::Event(4)).unwrap(), "4");
        let p: NotePosition = serde_json::from_str("\"memo\"").unwrap();
        assert_eq!(p, NotePosition::Memo);
        let p: NotePosition = serde_json::from_str("2").unwrap();
        assert_eq!(p, NotePosition::Event(2));
    }

    #[test]
    fn abci_event_deserializes_type_field() {
        let ev: AbciEvent = serde_json::from_str(
            r#"{"type":"dropnote","attributes":[{"key":"type","value":"message"}]}"#,
        )
        .unwrap();
        assert_eq!(ev.kind, "dropnote");
        assert_eq!(ev.get("type"), Some("message"));
    }
}
