//! Archive storage backends.
//!
//! `ArchiveStore` is the persistence seam: an ordered per-owner record
//! space plus its tag index, mutated atomically per record. Two backends
//! ship: a dashmap-sharded in-memory store and a libSQL store. Filtering,
//! pagination and aggregation live above this seam and are shared.

mod memory;
mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::ArchiveError;
use crate::identity::BareJid;
use crate::item::ArchivedItem;

pub use memory::MemoryArchiveStore;
pub use sql::{LibsqlArchiveStore, ARCHIVE_SCHEMA};

/// Allocator of time-sortable archive ids.
///
/// UUID v7 laid out by hand over the record's *logical* timestamp rather
/// than the wall clock, so a backdated (delayed) message still receives an
/// id that sorts into its chronological place. The 48-bit millisecond field
/// comes straight from the logical timestamp, rand_a carries the
/// sub-millisecond microseconds, and the low bits hold an atomic insertion
/// sequence. Id lexical order therefore equals
/// `(timestamp, insertion sequence)` order, including under concurrent
/// appends and regardless of generation order.
pub struct ArchiveIdGenerator {
    sequence: AtomicU64,
}

impl ArchiveIdGenerator {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self, timestamp: DateTime<Utc>) -> String {
        let millis = timestamp.timestamp_millis().max(0) as u64;
        let sub_ms_micros = u64::from(timestamp.timestamp_subsec_micros() % 1_000);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        // unix_ts_ms (48) | version (4) | rand_a (12)
        let high = (millis << 16) | (0x7 << 12) | sub_ms_micros;
        // variant (2) | sequence (62)
        let low = (0b10 << 62) | (seq & ((1 << 62) - 1));
        Uuid::from_u64_pair(high, low).to_string()
    }
}

impl Default for ArchiveIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Constraints pushed down into a backend scan. The scan narrows; the
/// `FilterPredicate` above remains the source of truth for matching.
#[derive(Debug, Clone, Default)]
pub struct ScanRange {
    /// Restrict to one conversation partner, by bare form.
    pub peer: Option<BareJid>,
    /// Half-open `[start, end)` on the logical timestamp.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Narrow through the tag index to records carrying any of these.
    pub tags: BTreeSet<String>,
}

/// Durable, ordered record store keyed by owner.
///
/// Records arrive with their id already allocated; a backend persists the
/// record and its tag-index entries as one atomic unit and never
/// deduplicates. Scans return an ascending (by id, which is the archive
/// order) snapshot; a scan racing a write sees either none or all of a
/// record plus its tag entries, never a torn write.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn append(&self, item: ArchivedItem) -> Result<(), ArchiveError>;

    async fn scan(
        &self,
        owner: &BareJid,
        range: &ScanRange,
    ) -> Result<Vec<ArchivedItem>, ArchiveError>;

    /// Point lookup within an owner's archive.
    async fn get(&self, owner: &BareJid, id: &str) -> Result<Option<ArchivedItem>, ArchiveError>;

    /// Delete the owner/peer records with timestamp in `[from, to)` along
    /// with their tag-index entries. Returns the number of records removed;
    /// an empty range is a zero-deletion success.
    async fn delete_range(
        &self,
        owner: &BareJid,
        peer: &BareJid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, ArchiveError>;

    /// Delete every record of every owner under `domain` strictly older
    /// than `before`, regardless of peer or tag. The retention primitive.
    async fn delete_before_for_domain(
        &self,
        domain: &str,
        before: DateTime<Utc>,
    ) -> Result<u64, ArchiveError>;

    /// Total records in the owner's archive.
    async fn count(&self, owner: &BareJid) -> Result<u64, ArchiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ids_sort_with_logical_timestamps() {
        let ids = ArchiveIdGenerator::new();
        let early = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap();

        // Generated out of order, as a delayed message would be.
        let late_id = ids.next_id(late);
        let early_id = ids.next_id(early);
        assert!(early_id < late_id);
    }

    #[test]
    fn ids_sort_within_a_single_millisecond() {
        let ids = ArchiveIdGenerator::new();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let earlier = base + chrono::Duration::microseconds(100);
        let later = base + chrono::Duration::microseconds(900);

        // Same millisecond, generated out of order.
        let later_id = ids.next_id(later);
        let earlier_id = ids.next_id(earlier);
        assert!(earlier_id < later_id);
    }

    #[test]
    fn generator_is_shareable_across_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ArchiveIdGenerator>();
    }

    #[test]
    fn same_timestamp_ids_are_distinct_and_ordered() {
        let ids = ArchiveIdGenerator::new();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut generated: Vec<String> = (0..64).map(|_| ids.next_id(ts)).collect();
        let sorted = {
            let mut s = generated.clone();
            s.sort();
            s
        };
        assert_eq!(generated, sorted);
        generated.dedup();
        assert_eq!(generated.len(), 64);
    }
}
