//! Payload inspection helpers.
//!
//! Archived payloads are opaque message stanzas; the store only ever looks
//! at three things: the `<body/>` text (substring search), the XEP-0203
//! `<delay/>` stamp (backdated logical timestamp), and the `type` attribute
//! (one-to-one vs. multi-user conversation).

use chrono::{DateTime, Utc};
use minidom::Element;

use crate::item::ConversationType;

pub const NS_CLIENT: &str = "jabber:client";
pub const NS_DELAY: &str = "urn:xmpp:delay";

/// Text body of a message stanza, if any.
pub fn body_text(payload: &Element) -> Option<String> {
    payload
        .get_child("body", NS_CLIENT)
        .map(|body| body.text())
}

/// Delivery-delay stamp carried by the payload.
///
/// Accepts RFC 3339 (`2014-01-01T12:00:00Z`) as well as the compact offset
/// form without a colon (`2014-01-01T12:00:00+0000`) that older archiving
/// servers emit.
pub fn delay_stamp(payload: &Element) -> Option<DateTime<Utc>> {
    let stamp = payload.get_child("delay", NS_DELAY)?.attr("stamp")?;
    parse_stamp(stamp)
}

fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(stamp)
        .or_else(|_| DateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Conversation kind from the stanza `type` attribute.
pub fn conversation_type(payload: &Element) -> ConversationType {
    match payload.attr("type") {
        Some("groupchat") => ConversationType::Groupchat,
        _ => ConversationType::Chat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(type_attr: &str, body: Option<&str>) -> Element {
        let mut builder = Element::builder("message", NS_CLIENT).attr("type", type_attr);
        if let Some(body) = body {
            builder = builder.append(Element::builder("body", NS_CLIENT).append(body).build());
        }
        builder.build()
    }

    #[test]
    fn extracts_body_text() {
        let msg = message("chat", Some("Test 1"));
        assert_eq!(body_text(&msg).as_deref(), Some("Test 1"));
        assert_eq!(body_text(&message("chat", None)), None);
    }

    #[test]
    fn parses_delay_stamp_rfc3339_and_compact_offset() {
        for stamp in ["2014-01-01T12:00:00Z", "2014-01-01T12:00:00+0000"] {
            let msg = Element::builder("message", NS_CLIENT)
                .append(
                    Element::builder("delay", NS_DELAY)
                        .attr("stamp", stamp)
                        .build(),
                )
                .build();
            let parsed = delay_stamp(&msg).expect(stamp);
            assert_eq!(parsed.to_rfc3339(), "2014-01-01T12:00:00+00:00");
        }
    }

    #[test]
    fn missing_delay_yields_none() {
        assert_eq!(delay_stamp(&message("chat", Some("x"))), None);
    }

    #[test]
    fn conversation_type_from_attr() {
        assert_eq!(conversation_type(&message("chat", None)), ConversationType::Chat);
        assert_eq!(
            conversation_type(&message("groupchat", None)),
            ConversationType::Groupchat
        );
    }
}
