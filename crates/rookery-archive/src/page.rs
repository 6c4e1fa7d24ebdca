//! Result-set pagination over the full matched, ordered set.
//!
//! Converts paging parameters plus the ascending matched set into a bounded
//! page. Pages are always emitted ascending, including `before` pages (which
//! select the *last* `max` records preceding the anchor). Boundary markers
//! for the caller's next request come back as `first`/`last` cursors in the
//! query's cursor mode.

use crate::criteria::{Cursor, CursorMode, Paging};
use crate::error::ArchiveError;
use crate::item::ArchivedItem;

/// One page of query results.
///
/// `count` is the size of the full matched set; `complete` is set when the
/// page reaches the end of the matched set in the paging direction, i.e.
/// there is nothing further for a follow-up cursor to fetch.
#[derive(Debug, Clone)]
pub struct ItemPage {
    pub items: Vec<ArchivedItem>,
    pub first: Option<Cursor>,
    pub last: Option<Cursor>,
    pub complete: bool,
    pub count: usize,
}

/// Slice a page out of the matched set.
///
/// Cursor anchors that no longer exist (deleted records) resolve to their
/// nearest ordering neighbor instead of failing: ids position themselves in
/// the surviving order, index cursors clamp to the set bounds.
pub fn paginate(
    matched: Vec<ArchivedItem>,
    paging: &Paging,
    mode: CursorMode,
) -> Result<ItemPage, ArchiveError> {
    let total = matched.len();

    // Window bounds from the cursors; ids sort with the archive order, so
    // partition_point lands on the successor/predecessor even when the
    // anchor itself is gone.
    let mut lo = match &paging.after {
        Some(Cursor::Id(id)) => matched.partition_point(|it| it.id.as_str() <= id.as_str()),
        Some(Cursor::Index(i)) => i.saturating_add(1).min(total),
        None => 0,
    };
    let hi = match &paging.before {
        Some(Cursor::Id(id)) => matched.partition_point(|it| it.id.as_str() < id.as_str()),
        Some(Cursor::Index(i)) => (*i).min(total),
        None => total,
    };
    let hi = hi.max(lo);

    // A zero-based index slices within whatever window the cursors left.
    if let Some(index) = paging.index {
        lo = lo.saturating_add(index).min(hi);
    }

    let span = hi - lo;
    let (start, end) = if paging.before.is_some() {
        // Backward page: the last `max` records before the anchor.
        match paging.max {
            None => (lo, hi),
            Some(max) => (hi - max.min(span), hi),
        }
    } else {
        match paging.max {
            None => (lo, hi),
            Some(max) => (lo, lo + max.min(span)),
        }
    };

    let complete = if paging.before.is_some() {
        start == 0
    } else {
        end == total
    };

    let (first, last) = match mode {
        CursorMode::ById => {
            let slice = &matched[start..end];
            (
                slice.first().map(|it| Cursor::Id(it.id.clone())),
                slice.last().map(|it| Cursor::Id(it.id.clone())),
            )
        }
        CursorMode::ByIndex => {
            if start == end {
                (None, None)
            } else {
                (Some(Cursor::Index(start)), Some(Cursor::Index(end - 1)))
            }
        }
    };

    let mut items = matched;
    items.truncate(end);
    items.drain(..start);

    Ok(ItemPage {
        items,
        first,
        last,
        complete,
        count: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{BareJid, Jid};
    use crate::item::{ConversationType, Direction};
    use chrono::{TimeZone, Utc};

    // Ascending matched set with ids "id-00".."id-0{n-1}".
    fn matched(n: usize) -> Vec<ArchivedItem> {
        (0..n)
            .map(|i| ArchivedItem {
                id: format!("id-{:02}", i),
                owner: BareJid::new("owner@test").unwrap(),
                peer: Jid::new("buddy@test").unwrap(),
                direction: Direction::Outgoing,
                conversation_type: ConversationType::Chat,
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, i as u32).unwrap(),
                payload: String::new(),
                body: None,
                tags: Default::default(),
            })
            .collect()
    }

    fn ids(page: &ItemPage) -> Vec<&str> {
        page.items.iter().map(|it| it.id.as_str()).collect()
    }

    #[test]
    fn unbounded_returns_whole_set() {
        let page = paginate(matched(3), &Paging::default(), CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-00", "id-01", "id-02"]);
        assert!(page.complete);
        assert_eq!(page.count, 3);
        assert_eq!(page.first, Some(Cursor::Id("id-00".to_string())));
        assert_eq!(page.last, Some(Cursor::Id("id-02".to_string())));
    }

    #[test]
    fn after_id_returns_strict_successors() {
        let paging = Paging {
            after: Some(Cursor::Id("id-02".to_string())),
            ..Default::default()
        };
        let page = paginate(matched(5), &paging, CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-03", "id-04"]);
        assert!(page.complete);
    }

    #[test]
    fn before_id_selects_trailing_block_in_ascending_order() {
        let paging = Paging {
            before: Some(Cursor::Id("id-04".to_string())),
            max: Some(2),
            ..Default::default()
        };
        let page = paginate(matched(5), &paging, CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-02", "id-03"]);
        assert!(!page.complete);

        let paging = Paging {
            before: Some(Cursor::Id("id-02".to_string())),
            max: Some(5),
            ..Default::default()
        };
        let page = paginate(matched(5), &paging, CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-00", "id-01"]);
        assert!(page.complete);
    }

    #[test]
    fn deleted_anchor_resolves_to_nearest_neighbor() {
        // "id-015" never existed; it orders between id-01 and id-02.
        let paging = Paging {
            after: Some(Cursor::Id("id-015".to_string())),
            ..Default::default()
        };
        let page = paginate(matched(4), &paging, CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-02", "id-03"]);

        let paging = Paging {
            before: Some(Cursor::Id("id-015".to_string())),
            ..Default::default()
        };
        let page = paginate(matched(4), &paging, CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-00", "id-01"]);
    }

    #[test]
    fn index_cursors_use_ordinal_positions() {
        let paging = Paging {
            after: Some(Cursor::Index(1)),
            ..Default::default()
        };
        let page = paginate(matched(4), &paging, CursorMode::ByIndex).unwrap();
        assert_eq!(ids(&page), ["id-02", "id-03"]);
        assert_eq!(page.first, Some(Cursor::Index(2)));
        assert_eq!(page.last, Some(Cursor::Index(3)));

        let paging = Paging {
            before: Some(Cursor::Index(2)),
            ..Default::default()
        };
        let page = paginate(matched(4), &paging, CursorMode::ByIndex).unwrap();
        assert_eq!(ids(&page), ["id-00", "id-01"]);

        // Out-of-range anchors clamp instead of failing.
        let paging = Paging {
            after: Some(Cursor::Index(99)),
            ..Default::default()
        };
        let page = paginate(matched(4), &paging, CursorMode::ByIndex).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn index_window_slices_the_matched_set() {
        let paging = Paging {
            index: Some(1),
            max: Some(2),
            ..Default::default()
        };
        let page = paginate(matched(5), &paging, CursorMode::ById).unwrap();
        assert_eq!(ids(&page), ["id-01", "id-02"]);
        assert!(!page.complete);
        assert_eq!(page.count, 5);
    }

    #[test]
    fn max_zero_is_an_empty_page_not_unbounded() {
        let paging = Paging {
            max: Some(0),
            ..Default::default()
        };
        let page = paginate(matched(3), &paging, CursorMode::ById).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.first, None);
        assert_eq!(page.last, None);
        assert_eq!(page.count, 3);
    }

    #[test]
    fn empty_matched_set_is_success() {
        let paging = Paging {
            after: Some(Cursor::Id("anything".to_string())),
            max: Some(10),
            ..Default::default()
        };
        let page = paginate(Vec::new(), &paging, CursorMode::ById).unwrap();
        assert!(page.items.is_empty());
        assert!(page.complete);
        assert_eq!(page.count, 0);
    }
}
