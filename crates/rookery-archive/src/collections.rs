//! Grouping of a filtered, ordered stream into per-peer conversation rows.

use std::collections::HashSet;

use crate::item::{ArchivedItem, Collection};

/// One row per distinct peer, anchored at that peer's earliest matching
/// record. The input must already be filtered and in ascending archive
/// order; a peer appears iff at least one of its records survived the
/// filters. Rows come out in order of first appearance.
pub fn group_by_peer<'a, I>(items: I) -> Vec<Collection>
where
    I: IntoIterator<Item = &'a ArchivedItem>,
{
    let mut seen = HashSet::new();
    let mut collections = Vec::new();
    for item in items {
        let with = item.peer.bare();
        if seen.insert(with.clone()) {
            collections.push(Collection {
                with: with.clone(),
                start: item.timestamp,
                kind: item.conversation_type,
            });
        }
    }
    collections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{BareJid, Jid};
    use crate::item::{ConversationType, Direction};
    use chrono::{TimeZone, Utc};

    fn item(peer: &str, seconds: u32) -> ArchivedItem {
        ArchivedItem {
            id: format!("id-{}-{}", peer, seconds),
            owner: BareJid::new("owner@test").unwrap(),
            peer: Jid::new(peer).unwrap(),
            direction: Direction::Incoming,
            conversation_type: ConversationType::Chat,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, seconds).unwrap(),
            payload: String::new(),
            body: None,
            tags: Default::default(),
        }
    }

    #[test]
    fn one_row_per_peer_anchored_at_earliest_match() {
        let items = vec![
            item("alice@test/a", 0),
            item("bob@test", 1),
            item("alice@test/b", 2),
            item("bob@test", 3),
        ];
        let collections = group_by_peer(&items);
        assert_eq!(collections.len(), 2);

        assert_eq!(collections[0].with, BareJid::new("alice@test").unwrap());
        assert_eq!(collections[0].start.timestamp() % 60, 0);
        assert_eq!(collections[1].with, BareJid::new("bob@test").unwrap());
        assert_eq!(collections[1].start.timestamp() % 60, 1);
    }

    #[test]
    fn resource_variants_collapse_to_one_collection() {
        let items = vec![item("carol@test/phone", 0), item("carol@test/desk", 5)];
        let collections = group_by_peer(&items);
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].with, BareJid::new("carol@test").unwrap());
    }

    #[test]
    fn empty_stream_yields_no_collections() {
        assert!(group_by_peer(&[]).is_empty());
    }
}
