//! Source classifier — decides which convention, if any, a transaction uses.
//!
//! Memo convention: `dropnote[.subtype]:` at the start of the memo
//! (case-insensitive prefix). Event convention: an emitted event of type
//! `dropnote` carrying a `type` attribute. The memo is checked first; a
//! transaction is classified under at most one source.

use crate::types::{AbciEvent, Source};

/// Case-insensitive memo prefix.
pub const MEMO_PREFIX: &str = "dropnote";
/// Event type emitted by dropnote-aware contracts.
pub const EVENT_TYPE: &str = "dropnote";
/// Attribute on a `dropnote` event that carries the subtype.
pub const SUBTYPE_ATTRIBUTE: &str = "type";

/// The header of a dropnote memo, split from its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoHeader<'a> {
    /// Lowercased subtype; `"message"` when the memo omits it.
    pub subtype: String,
    /// Everything after the header's `:`.
    pub body: &'a str,
}

/// Split `memo` into header and body, or `None` if it is not a dropnote memo.
pub fn split_memo(memo: &str) -> Option<MemoHeader<'_>> {
    let head = memo.get(..MEMO_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(MEMO_PREFIX) {
        return None;
    }
    let rest = &memo[MEMO_PREFIX.len()..];

    if let Some(body) = rest.strip_prefix(':') {
        return Some(MemoHeader {
            subtype: crate::payload::SUBTYPE_MESSAGE.to_string(),
            body,
        });
    }

    let rest = rest.strip_prefix('.')?;
    let (subtype, body) = rest.split_once(':')?;
    if subtype.is_empty() || !subtype.chars().all(is_subtype_char) {
        return None;
    }
    Some(MemoHeader {
        subtype: subtype.to_ascii_lowercase(),
        body,
    })
}

fn is_subtype_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Returns `true` if `memo` uses the memo convention.
pub fn is_dropnote_memo(memo: Option<&str>) -> bool {
    memo.and_then(split_memo).is_some()
}

/// Returns `true` if `event` is a `dropnote` event that names its subtype.
pub fn is_dropnote_event(event: &AbciEvent) -> bool {
    event.kind == EVENT_TYPE && event.get_non_empty(SUBTYPE_ATTRIBUTE).is_some()
}

/// Indices and references of every event of type `dropnote`, whether or not
/// it names a subtype.
pub fn dropnote_events(events: &[AbciEvent]) -> impl Iterator<Item = (usize, &AbciEvent)> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind == EVENT_TYPE)
}

/// Classify a transaction by its memo and emitted events.
pub fn classify(memo: Option<&str>, events: &[AbciEvent]) -> Option<Source> {
    if is_dropnote_memo(memo) {
        return Some(Source::Memo);
    }
    if events.iter().any(is_dropnote_event) {
        return Some(Source::Events);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_prefix_defaults_to_message() {
        let h = split_memo("dropnote:[a:b]").unwrap();
        assert_eq!(h.subtype, "message");
        assert_eq!(h.body, "[a:b]");
    }

    #[test]
    fn subtype_is_extracted_and_lowercased() {
        let h = split_memo("DropNote.Announce:[hi]").unwrap();
        assert_eq!(h.subtype, "announce");
        assert_eq!(h.body, "[hi]");
    }

    #[test]
    fn rejects_non_dropnote_memos() {
        assert!(split_memo("").is_none());
        assert!(split_memo("drop").is_none());
        assert!(split_memo("hello dropnote:[a:b]").is_none());
        assert!(split_memo("dropnotes:[a:b]").is_none());
        assert!(split_memo("dropnote.:[a:b]").is_none());
        assert!(split_memo("dropnote.announce").is_none());
        assert!(split_memo("dropnote.bad subtype:[x]").is_none());
    }

    #[test]
    fn multibyte_memo_does_not_panic() {
        assert!(split_memo("ドロップノート:[a:b]").is_none());
        assert!(split_memo("dropnot€:[a:b]").is_none());
    }

    #[test]
    fn memo_wins_over_events() {
        let events = vec![AbciEvent::new("dropnote").attr("type", "message")];
        assert_eq!(classify(Some("dropnote:[a:b]"), &events), Some(Source::Memo));
        assert_eq!(classify(Some("gm"), &events), Some(Source::Events));
        assert_eq!(classify(None, &events), Some(Source::Events));
    }

    #[test]
    fn event_without_subtype_is_ignored() {
        let events = vec![AbciEvent::new("dropnote").attr("message", "hi")];
        assert_eq!(classify(None, &events), None);

        let empty = vec![AbciEvent::new("dropnote").attr("type", "").attr("message", "hi")];
        assert_eq!(classify(None, &empty), None);
    }

    #[test]
    fn unrelated_traffic_is_unclassified() {
        let events = vec![
            AbciEvent::new("message").attr("sender", "cosmos1xyz"),
            AbciEvent::new("transfer").attr("recipient", "cosmos1abc"),
        ];
        assert_eq!(classify(Some("thanks for lunch"), &events), None);
        assert_eq!(classify(None, &[]), None);
    }

    #[test]
    fn dropnote_events_reports_indices() {
        let events = vec![
            AbciEvent::new("message"),
            AbciEvent::new("dropnote").attr("type", "message"),
            AbciEvent::new("wasm"),
            AbciEvent::new("dropnote"),
        ];
        let idx: Vec<usize> = dropnote_events(&events).map(|(i, _)| i).collect();
        assert_eq!(idx, vec![1, 3]);
    }
}
