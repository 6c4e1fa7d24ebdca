//! Archived record types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{BareJid, Jid};

/// Flow of the message relative to the archive owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "incoming" => Some(Direction::Incoming),
            "outgoing" => Some(Direction::Outgoing),
            _ => None,
        }
    }
}

/// One-to-one chat vs. multi-user room conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    #[default]
    Chat,
    Groupchat,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Chat => "chat",
            ConversationType::Groupchat => "groupchat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(ConversationType::Chat),
            "groupchat" => Some(ConversationType::Groupchat),
            _ => None,
        }
    }
}

/// One archived message.
///
/// Immutable once written; deleted individually by range removal or in bulk
/// by the retention sweep, never updated in place. `id` is unique within the
/// owner's record space and sorts consistently with `(timestamp, insertion
/// sequence)` ascending, so id order *is* the archive order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedItem {
    /// Time-sortable archive id (UUID v7 over the logical timestamp).
    pub id: String,
    /// Owning archive, always bare.
    pub owner: BareJid,
    /// Conversation partner; may carry a resource, indexed by bare form.
    pub peer: Jid,
    pub direction: Direction,
    pub conversation_type: ConversationType,
    /// When the message logically occurred. A delivery-delay stamp in the
    /// payload backdates this relative to wall-clock archive time.
    pub timestamp: DateTime<Utc>,
    /// Raw serialized message stanza.
    pub payload: String,
    /// Text body extracted from the payload at write time.
    pub body: Option<String>,
    /// Plain string labels attached at write time.
    pub tags: BTreeSet<String>,
}

/// One conversation thread in a collection listing: a distinct peer plus
/// the timestamp of its earliest record matching the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub with: BareJid,
    pub start: DateTime<Utc>,
    pub kind: ConversationType,
}
