//! Boolean predicate compiled once per query.
//!
//! All configured constraints AND together; `tags` is internally OR across
//! its members. Substring matching is case-sensitive literal containment
//! against the body text extracted at write time. An absent constraint
//! imposes nothing, so an empty criteria matches the owner's whole archive.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::criteria::QueryCriteria;
use crate::identity::BareJid;
use crate::item::ArchivedItem;

#[derive(Debug, Clone)]
pub struct FilterPredicate {
    with: Option<BareJid>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    tags: BTreeSet<String>,
    contains: Vec<String>,
}

impl FilterPredicate {
    pub fn from_criteria(criteria: &QueryCriteria) -> Self {
        Self {
            with: criteria.with.clone(),
            start: criteria.start,
            end: criteria.end,
            tags: criteria.tags.clone(),
            contains: criteria.contains.clone(),
        }
    }

    pub fn matches(&self, item: &ArchivedItem) -> bool {
        if let Some(with) = &self.with {
            if item.peer.bare() != with {
                return false;
            }
        }
        if let Some(start) = self.start {
            if item.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if item.timestamp >= end {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| item.tags.contains(tag)) {
            return false;
        }
        if !self.contains.is_empty() {
            let body = item.body.as_deref().unwrap_or("");
            if !self.contains.iter().all(|needle| body.contains(needle)) {
                return false;
            }
        }
        true
    }
}
