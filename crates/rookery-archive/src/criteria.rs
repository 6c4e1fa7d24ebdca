//! Query descriptors: criteria, cursors, pagination parameters.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::ArchiveError;
use crate::identity::BareJid;

/// Position marker inside an ordered result set.
///
/// One concept, two resolutions: an `Id` cursor references a previously
/// observed record by archive id; an `Index` cursor references the ordinal
/// position a record held within the full matched set at query time. Index
/// cursors exist for orderings under which ids are not guaranteed stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Id(String),
    Index(usize),
}

/// Which cursor flavor a query speaks; decides the `first`/`last` markers
/// emitted on the page for the caller's next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    #[default]
    ById,
    ByIndex,
}

/// Result-set-management window: `index`+`max` slices, `after`/`before`
/// cursors. `max = Some(0)` means an empty page; `max = None` is unbounded.
#[derive(Debug, Clone, Default)]
pub struct Paging {
    pub index: Option<usize>,
    pub max: Option<usize>,
    pub after: Option<Cursor>,
    pub before: Option<Cursor>,
}

/// A reusable archive query descriptor.
///
/// The questioner is required at construction; a criteria without an owning
/// identity is unrepresentable. All other constraints are optional and
/// compose by AND, except `tags` which matches on any member (OR).
#[derive(Debug, Clone)]
pub struct QueryCriteria {
    questioner: BareJid,
    pub with: Option<BareJid>,
    /// Half-open window `[start, end)`.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Item matches if it carries at least one of these.
    pub tags: BTreeSet<String>,
    /// Item's body must contain every one of these (case-sensitive).
    pub contains: Vec<String>,
    pub cursor_mode: CursorMode,
    pub paging: Paging,
}

impl QueryCriteria {
    pub fn new(questioner: BareJid) -> Self {
        Self {
            questioner,
            with: None,
            start: None,
            end: None,
            tags: BTreeSet::new(),
            contains: Vec::new(),
            cursor_mode: CursorMode::default(),
            paging: Paging::default(),
        }
    }

    pub fn questioner(&self) -> &BareJid {
        &self.questioner
    }

    pub fn with_peer(mut self, peer: BareJid) -> Self {
        self.with = Some(peer);
        self
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.contains.push(needle.into());
        self
    }

    /// Switch `after`/`before` resolution to ordinal positions.
    pub fn by_index(mut self) -> Self {
        self.cursor_mode = CursorMode::ByIndex;
        self
    }

    pub fn page_index(mut self, index: usize) -> Self {
        self.paging.index = Some(index);
        self
    }

    pub fn page_max(mut self, max: usize) -> Self {
        self.paging.max = Some(max);
        self
    }

    pub fn page_after(mut self, cursor: Cursor) -> Self {
        self.paging.after = Some(cursor);
        self
    }

    pub fn page_before(mut self, cursor: Cursor) -> Self {
        self.paging.before = Some(cursor);
        self
    }

    /// Reject nonsensical criteria before touching storage.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ArchiveError::Validation(format!(
                    "time range starts after it ends: {} > {}",
                    start, end
                )));
            }
        }
        for cursor in [&self.paging.after, &self.paging.before]
            .into_iter()
            .flatten()
        {
            let fits = matches!(
                (self.cursor_mode, cursor),
                (CursorMode::ById, Cursor::Id(_)) | (CursorMode::ByIndex, Cursor::Index(_))
            );
            if !fits {
                return Err(ArchiveError::Validation(format!(
                    "cursor {:?} does not match cursor mode {:?}",
                    cursor, self.cursor_mode
                )));
            }
        }
        Ok(())
    }
}
