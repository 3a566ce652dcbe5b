//! `DecodedPayload` — the shape both parsers produce and handlers consume.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Subtype used when a memo omits `.subtype`.
pub const SUBTYPE_MESSAGE: &str = "message";
/// Broadcast subtype.
pub const SUBTYPE_ANNOUNCE: &str = "announce";

/// A subtype plus the ordered key/value fields a parser extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub subtype: String,
    pub fields: Vec<(String, String)>,
}

impl DecodedPayload {
    pub fn new(subtype: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into(),
            fields: vec![],
        }
    }

    /// Append a field, replacing an existing one with the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get), but an absent or empty field is an error.
    pub fn require(&self, key: &str) -> Result<&str, ParseError> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ParseError::MissingAttribute(key.to_string()))
    }
}
