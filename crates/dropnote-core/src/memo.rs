//! Memo grammar parser.
//!
//! ```text
//! memo     = "dropnote" ["." subtype] ":" body
//! message  = "[" recipient ":" message "]"     ; subtype "message"
//! announce = "[" message "]"                   ; subtype "announce"
//! ```
//!
//! Only the first `:` inside the brackets separates recipient from message. A
//! body that does not open with `[` is an encrypted payload, which is not
//! supported. Bodies of other subtypes are passed through uninterpreted as the
//! `body` field.
//!
//! The built-in subtypes fail closed without a bank sender. Other subtypes get
//! a `sender` field only when one resolves; their handlers decide.

use crate::classify::split_memo;
use crate::error::ParseError;
use crate::payload::{DecodedPayload, SUBTYPE_ANNOUNCE, SUBTYPE_MESSAGE};
use crate::types::AbciEvent;

/// Parse a memo into a payload. The sender is taken from the transaction's
/// events (first `message` event), never from the memo itself.
pub fn parse_memo(memo: &str, events: &[AbciEvent]) -> Result<DecodedPayload, ParseError> {
    let header = split_memo(memo).ok_or(ParseError::NotDropnote)?;
    let mut payload = DecodedPayload::new(header.subtype.as_str());
    let sender = find_sender(events);

    match header.subtype.as_str() {
        SUBTYPE_MESSAGE => {
            let inner = bracketed(header.body)?;
            let (recipient, message) = inner.split_once(':').unwrap_or((inner, ""));
            if recipient.is_empty() {
                return Err(ParseError::EmptyRecipient);
            }
            if message.is_empty() {
                return Err(ParseError::EmptyMessage);
            }
            payload.set("recipient", recipient);
            payload.set("message", message);
            payload.set("sender", sender.ok_or(ParseError::MissingSender)?);
        }
        SUBTYPE_ANNOUNCE => {
            let message = bracketed(header.body)?;
            if message.is_empty() {
                return Err(ParseError::EmptyMessage);
            }
            payload.set("message", message);
            payload.set("sender", sender.ok_or(ParseError::MissingSender)?);
        }
        _ => {
            payload.set("body", header.body);
            if let Some(sender) = sender {
                payload.set("sender", sender);
            }
        }
    }
    Ok(payload)
}

/// The `sender` attribute of the first `message` event.
pub fn find_sender(events: &[AbciEvent]) -> Option<&str> {
    events
        .iter()
        .find(|e| e.kind == "message")
        .and_then(|e| e.get_non_empty("sender"))
}

/// Strip the surrounding brackets from a plaintext body.
fn bracketed(body: &str) -> Result<&str, ParseError> {
    let inner = body
        .strip_prefix('[')
        .ok_or(ParseError::EncryptionUnsupported)?;
    inner
        .strip_suffix(']')
        .ok_or_else(|| ParseError::Malformed("missing closing ']'".into()))
}

/// Compose a `message` memo: `dropnote:[recipient:message]`.
pub fn compose_message_memo(recipient: &str, message: &str) -> String {
    format!("{}:[{recipient}:{message}]", crate::classify::MEMO_PREFIX)
}

/// Compose an `announce` memo: `dropnote.announce:[message]`.
pub fn compose_announce_memo(message: &str) -> String {
    format!(
        "{}.{SUBTYPE_ANNOUNCE}:[{message}]",
        crate::classify::MEMO_PREFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_events(sender: &str) -> Vec<AbciEvent> {
        vec![AbciEvent::new("message").attr("sender", sender)]
    }

    #[test]
    fn parses_message_memo() {
        let p = parse_memo("dropnote:[cosmos1abc:hello world]", &bank_events("cosmos1xyz")).unwrap();
        assert_eq!(p.subtype, "message");
        assert_eq!(p.get("recipient"), Some("cosmos1abc"));
        assert_eq!(p.get("message"), Some("hello world"));
        assert_eq!(p.get("sender"), Some("cosmos1xyz"));
    }

    #[test]
    fn explicit_message_subtype() {
        let p = parse_memo("dropnote.message:[a:b]", &bank_events("s")).unwrap();
        assert_eq!(p.get("recipient"), Some("a"));
        assert_eq!(p.get("message"), Some("b"));
    }

    #[test]
    fn colons_in_message_are_preserved() {
        let p = parse_memo("dropnote:[a:meet at 10:30: bring snacks]", &bank_events("s")).unwrap();
        assert_eq!(p.get("recipient"), Some("a"));
        assert_eq!(p.get("message"), Some("meet at 10:30: bring snacks"));
    }

    #[test]
    fn brackets_inside_message_are_kept() {
        let p = parse_memo("dropnote:[a:[x]]", &bank_events("s")).unwrap();
        assert_eq!(p.get("message"), Some("[x]"));
    }

    #[test]
    fn unbracketed_body_is_encrypted() {
        for memo in ["dropnote:Zm9vYmFy", "dropnote.announce:AAAA", "dropnote:"] {
            assert_eq!(
                parse_memo(memo, &bank_events("s")),
                Err(ParseError::EncryptionUnsupported),
                "{memo}"
            );
        }
    }

    #[test]
    fn empty_parts_are_rejected() {
        let ev = bank_events("s");
        assert_eq!(parse_memo("dropnote:[:hi]", &ev), Err(ParseError::EmptyRecipient));
        assert_eq!(parse_memo("dropnote:[a:]", &ev), Err(ParseError::EmptyMessage));
        assert_eq!(parse_memo("dropnote:[a]", &ev), Err(ParseError::EmptyMessage));
        assert_eq!(parse_memo("dropnote.announce:[]", &ev), Err(ParseError::EmptyMessage));
    }

    #[test]
    fn missing_closing_bracket_is_malformed() {
        assert!(matches!(
            parse_memo("dropnote:[a:b", &bank_events("s")),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn unresolved_sender_fails_closed() {
        assert_eq!(parse_memo("dropnote:[a:b]", &[]), Err(ParseError::MissingSender));
        let no_sender = vec![AbciEvent::new("message").attr("action", "send")];
        assert_eq!(parse_memo("dropnote:[a:b]", &no_sender), Err(ParseError::MissingSender));
    }

    #[test]
    fn announce_has_no_recipient() {
        let p = parse_memo("dropnote.announce:[system notice]", &bank_events("s")).unwrap();
        assert_eq!(p.subtype, "announce");
        assert_eq!(p.get("message"), Some("system notice"));
        assert_eq!(p.get("recipient"), None);
    }

    #[test]
    fn unknown_subtype_passes_body_through() {
        let p = parse_memo("dropnote.reaction:+1 for tx ABC", &bank_events("s")).unwrap();
        assert_eq!(p.subtype, "reaction");
        assert_eq!(p.get("body"), Some("+1 for tx ABC"));
        assert_eq!(p.get("sender"), Some("s"));
    }

    #[test]
    fn unknown_subtype_tolerates_missing_sender() {
        let p = parse_memo("dropnote.reaction:[+1]", &[]).unwrap();
        assert_eq!(p.get("body"), Some("[+1]"));
        assert_eq!(p.get("sender"), None);
        assert_eq!(parse_memo("dropnote.announce:[hi]", &[]), Err(ParseError::MissingSender));
    }

    #[test]
    fn composed_memos_parse_back() {
        let memo = compose_message_memo("cosmos1abc", "a:b");
        assert_eq!(memo, "dropnote:[cosmos1abc:a:b]");
        let p = parse_memo(&memo, &bank_events("s")).unwrap();
        assert_eq!(p.get("message"), Some("a:b"));

        assert_eq!(compose_announce_memo("hi"), "dropnote.announce:[hi]");
    }
}
