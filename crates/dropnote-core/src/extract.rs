//! Event attribute extractor — decodes a single `dropnote` event.
//!
//! Required attributes per subtype:
//!
//! | subtype    | required                                   |
//! |------------|--------------------------------------------|
//! | `message`  | `message`, `_contract_address`, `recipient` |
//! | `announce` | `message`, `_contract_address`             |
//!
//! `sender` is optional and falls back to `_contract_address`. An `encrypted`
//! attribute equal to `"true"` is rejected as unsupported. Attributes of other
//! subtypes are copied through without validation.

use crate::classify::SUBTYPE_ATTRIBUTE;
use crate::error::ParseError;
use crate::payload::{DecodedPayload, SUBTYPE_ANNOUNCE, SUBTYPE_MESSAGE};
use crate::types::AbciEvent;

pub const CONTRACT_ATTRIBUTE: &str = "_contract_address";

fn required_attributes(subtype: &str) -> &'static [&'static str] {
    match subtype {
        SUBTYPE_MESSAGE => &["message", CONTRACT_ATTRIBUTE, "recipient"],
        SUBTYPE_ANNOUNCE => &["message", CONTRACT_ATTRIBUTE],
        _ => &[],
    }
}

/// Decode one `dropnote` event into a payload.
pub fn extract_event(event: &AbciEvent) -> Result<DecodedPayload, ParseError> {
    let subtype = event
        .get_non_empty(SUBTYPE_ATTRIBUTE)
        .ok_or_else(|| ParseError::MissingAttribute(SUBTYPE_ATTRIBUTE.into()))?
        .to_ascii_lowercase();

    if event.get("encrypted") == Some("true") {
        return Err(ParseError::EncryptionUnsupported);
    }

    for key in required_attributes(&subtype) {
        if event.get_non_empty(key).is_none() {
            return Err(ParseError::MissingAttribute((*key).to_string()));
        }
    }

    let mut payload = DecodedPayload::new(subtype);
    for attr in &event.attributes {
        if attr.key != SUBTYPE_ATTRIBUTE && payload.get(&attr.key).is_none() {
            payload.set(attr.key.as_str(), attr.value.as_str());
        }
    }

    if event.get_non_empty("sender").is_none() {
        if let Some(contract) = event.get_non_empty(CONTRACT_ATTRIBUTE) {
            payload.set("sender", contract);
        }
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event() -> AbciEvent {
        AbciEvent::new("dropnote")
            .attr("_contract_address", "neutron1contract")
            .attr("type", "message")
            .attr("recipient", "neutron1bob")
            .attr("message", "hi bob")
    }

    #[test]
    fn message_event_with_contract_fallback() {
        let p = extract_event(&message_event()).unwrap();
        assert_eq!(p.subtype, "message");
        assert_eq!(p.get("recipient"), Some("neutron1bob"));
        assert_eq!(p.get("message"), Some("hi bob"));
        assert_eq!(p.get("sender"), Some("neutron1contract"));
        assert_eq!(p.get("type"), None);
    }

    #[test]
    fn explicit_sender_wins() {
        let p = extract_event(&message_event().attr("sender", "neutron1alice")).unwrap();
        assert_eq!(p.get("sender"), Some("neutron1alice"));
    }

    #[test]
    fn announce_needs_no_recipient() {
        let ev = AbciEvent::new("dropnote")
            .attr("_contract_address", "neutron1contract")
            .attr("type", "announce")
            .attr("message", "upgrade at 12:00");
        let p = extract_event(&ev).unwrap();
        assert_eq!(p.subtype, "announce");
        assert_eq!(p.get("message"), Some("upgrade at 12:00"));
    }

    #[test]
    fn missing_required_attributes() {
        let ev = AbciEvent::new("dropnote")
            .attr("_contract_address", "c")
            .attr("type", "message")
            .attr("recipient", "r");
        assert_eq!(
            extract_event(&ev),
            Err(ParseError::MissingAttribute("message".into()))
        );

        let ev = AbciEvent::new("dropnote")
            .attr("type", "announce")
            .attr("message", "m");
        assert_eq!(
            extract_event(&ev),
            Err(ParseError::MissingAttribute("_contract_address".into()))
        );

        let ev = AbciEvent::new("dropnote").attr("message", "m");
        assert_eq!(
            extract_event(&ev),
            Err(ParseError::MissingAttribute("type".into()))
        );
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let ev = AbciEvent::new("dropnote")
            .attr("_contract_address", "c")
            .attr("type", "announce")
            .attr("message", "");
        assert_eq!(
            extract_event(&ev),
            Err(ParseError::MissingAttribute("message".into()))
        );
    }

    #[test]
    fn encrypted_flag_is_unsupported() {
        let ev = message_event().attr("encrypted", "true");
        assert_eq!(extract_event(&ev), Err(ParseError::EncryptionUnsupported));

        let ev = message_event().attr("encrypted", "false");
        assert!(extract_event(&ev).is_ok());
    }

    #[test]
    fn unknown_subtype_copies_attributes() {
        let ev = AbciEvent::new("dropnote")
            .attr("type", "Reaction")
            .attr("emoji", "+1");
        let p = extract_event(&ev).unwrap();
        assert_eq!(p.subtype, "reaction");
        assert_eq!(p.get("emoji"), Some("+1"));
        assert_eq!(p.get("sender"), None);
    }
}
