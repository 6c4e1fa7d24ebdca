//! In-memory archive backend.
//!
//! Per-owner archives live in a dashmap; every mutation of one owner's
//! records and tag index happens under that entry's shard lock, which gives
//! record + index atomicity without a transaction log. Intended for tests
//! and single-process deployments.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, instrument};

use super::{ArchiveStore, ScanRange};
use crate::error::ArchiveError;
use crate::identity::BareJid;
use crate::item::ArchivedItem;

/// One owner's record space. `items` is keyed by archive id, whose order is
/// the archive order; `tags` is the secondary index and is kept in lockstep
/// with `items` (an entry exists iff the record exists).
#[derive(Default)]
struct OwnerArchive {
    items: BTreeMap<String, ArchivedItem>,
    tags: HashMap<String, BTreeSet<String>>,
}

impl OwnerArchive {
    fn insert(&mut self, item: ArchivedItem) {
        for tag in &item.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(item.id.clone());
        }
        self.items.insert(item.id.clone(), item);
    }

    fn remove(&mut self, id: &str) -> Option<ArchivedItem> {
        let item = self.items.remove(id)?;
        for tag in &item.tags {
            if let Some(ids) = self.tags.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(item)
    }

    /// Ids carrying at least one of the requested tags, via the index.
    fn tagged_ids(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for tag in tags {
            if let Some(tagged) = self.tags.get(tag) {
                ids.extend(tagged.iter().cloned());
            }
        }
        ids
    }
}

pub struct MemoryArchiveStore {
    owners: DashMap<BareJid, OwnerArchive>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
        }
    }
}

impl Default for MemoryArchiveStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    #[instrument(skip(self, item), fields(owner = %item.owner, archive_id = %item.id))]
    async fn append(&self, item: ArchivedItem) -> Result<(), ArchiveError> {
        self.owners.entry(item.owner.clone()).or_default().insert(item);
        Ok(())
    }

    async fn scan(
        &self,
        owner: &BareJid,
        range: &ScanRange,
    ) -> Result<Vec<ArchivedItem>, ArchiveError> {
        let Some(archive) = self.owners.get(owner) else {
            return Ok(Vec::new());
        };

        let tagged = (!range.tags.is_empty()).then(|| archive.tagged_ids(&range.tags));

        let items = archive
            .items
            .values()
            .filter(|item| {
                if let Some(peer) = &range.peer {
                    if item.peer.bare() != peer {
                        return false;
                    }
                }
                if let Some(start) = range.start {
                    if item.timestamp < start {
                        return false;
                    }
                }
                if let Some(end) = range.end {
                    if item.timestamp >= end {
                        return false;
                    }
                }
                if let Some(tagged) = &tagged {
                    if !tagged.contains(&item.id) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        Ok(items)
    }

    async fn get(&self, owner: &BareJid, id: &str) -> Result<Option<ArchivedItem>, ArchiveError> {
        Ok(self
            .owners
            .get(owner)
            .and_then(|archive| archive.items.get(id).cloned()))
    }

    #[instrument(skip(self), fields(owner = %owner, peer = %peer))]
    async fn delete_range(
        &self,
        owner: &BareJid,
        peer: &BareJid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, ArchiveError> {
        let Some(mut archive) = self.owners.get_mut(owner) else {
            return Ok(0);
        };

        let doomed: Vec<String> = archive
            .items
            .values()
            .filter(|item| {
                item.peer.bare() == peer && item.timestamp >= from && item.timestamp < to
            })
            .map(|item| item.id.clone())
            .collect();

        for id in &doomed {
            archive.remove(id);
        }
        debug!(deleted = doomed.len(), "archive range deleted");
        Ok(doomed.len() as u64)
    }

    #[instrument(skip(self))]
    async fn delete_before_for_domain(
        &self,
        domain: &str,
        before: DateTime<Utc>,
    ) -> Result<u64, ArchiveError> {
        let mut deleted = 0u64;
        for mut entry in self.owners.iter_mut() {
            if entry.key().domain() != domain {
                continue;
            }
            let archive = entry.value_mut();
            let doomed: Vec<String> = archive
                .items
                .values()
                .filter(|item| item.timestamp < before)
                .map(|item| item.id.clone())
                .collect();
            for id in &doomed {
                archive.remove(id);
            }
            deleted += doomed.len() as u64;
        }
        debug!(deleted, "expired records deleted for domain");
        Ok(deleted)
    }

    async fn count(&self, owner: &BareJid) -> Result<u64, ArchiveError> {
        Ok(self
            .owners
            .get(owner)
            .map(|archive| archive.items.len() as u64)
            .unwrap_or(0))
    }
}
