//! Archive repository facade.
//!
//! Composes the store, filter, paginator, aggregator and sweeper into the
//! public operations. Writes go straight to the store (which owns
//! record/tag atomicity); reads run a pushed-down scan, then the filter
//! predicate, then pagination or per-peer grouping.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use minidom::Element;
use tracing::{debug, instrument};

use crate::collections::group_by_peer;
use crate::criteria::QueryCriteria;
use crate::error::ArchiveError;
use crate::filter::FilterPredicate;
use crate::identity::{BareJid, Jid};
use crate::item::{ArchivedItem, Collection, Direction};
use crate::page::{paginate, ItemPage};
use crate::retention::RetentionSweeper;
use crate::stanza;
use crate::store::{ArchiveIdGenerator, ArchiveStore, ScanRange};

pub struct ArchiveRepository {
    store: Arc<dyn ArchiveStore>,
    ids: ArchiveIdGenerator,
    sweeper: RetentionSweeper,
}

impl ArchiveRepository {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self {
            ids: ArchiveIdGenerator::new(),
            sweeper: RetentionSweeper::new(store.clone()),
            store,
        }
    }

    /// Durably record one message. Returns the allocated archive id.
    ///
    /// A delivery-delay stamp in the payload backdates the record relative
    /// to `timestamp` (normally the wall-clock archive time). Identical
    /// calls produce distinct records; the archive never deduplicates.
    #[instrument(skip(self, payload, tags), fields(owner = %owner, peer = %peer))]
    pub async fn archive_message(
        &self,
        owner: &BareJid,
        peer: &Jid,
        direction: Direction,
        timestamp: DateTime<Utc>,
        payload: &Element,
        tags: &BTreeSet<String>,
    ) -> Result<String, ArchiveError> {
        let timestamp = stanza::delay_stamp(payload).unwrap_or(timestamp);
        let id = self.ids.next_id(timestamp);

        let item = ArchivedItem {
            id: id.clone(),
            owner: owner.clone(),
            peer: peer.clone(),
            direction,
            conversation_type: stanza::conversation_type(payload),
            timestamp,
            body: stanza::body_text(payload),
            payload: String::from(payload),
            tags: tags.clone(),
        };
        self.store.append(item).await?;

        debug!(archive_id = %id, "message archived");
        Ok(id)
    }

    /// Matching records as one page, ascending by `(timestamp, id)`.
    pub async fn query_items(&self, criteria: &QueryCriteria) -> Result<ItemPage, ArchiveError> {
        criteria.validate()?;
        let matched = self.matched_items(criteria).await?;
        paginate(matched, &criteria.paging, criteria.cursor_mode)
    }

    /// One row per distinct peer with at least one record matching the
    /// criteria, anchored at the earliest match.
    pub async fn query_collections(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<Vec<Collection>, ArchiveError> {
        criteria.validate()?;
        let matched = self.matched_items(criteria).await?;
        Ok(group_by_peer(&matched))
    }

    /// Delete the owner/peer records with timestamp in `[from, to)`.
    /// Deleting an empty range succeeds with zero deletions.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn remove_items(
        &self,
        owner: &BareJid,
        peer: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(), ArchiveError> {
        if from > to {
            return Err(ArchiveError::Validation(format!(
                "removal range starts after it ends: {} > {}",
                from, to
            )));
        }
        let peer = BareJid::new(peer)?;
        let deleted = self.store.delete_range(owner, &peer, from, to).await?;
        debug!(deleted, "items removed");
        Ok(())
    }

    /// Retention sweep: drop every record under `domain` strictly older
    /// than `before`. The naive cutoff is interpreted as UTC.
    pub async fn delete_expired_messages(
        &self,
        domain: &BareJid,
        before: NaiveDateTime,
    ) -> Result<(), ArchiveError> {
        self.sweeper.sweep(domain, before.and_utc()).await?;
        Ok(())
    }

    /// Point lookup by archive id.
    pub async fn get_item(
        &self,
        owner: &BareJid,
        id: &str,
    ) -> Result<Option<ArchivedItem>, ArchiveError> {
        self.store.get(owner, id).await
    }

    /// Total records in the owner's archive.
    pub async fn count_items(&self, owner: &BareJid) -> Result<u64, ArchiveError> {
        self.store.count(owner).await
    }

    async fn matched_items(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<Vec<ArchivedItem>, ArchiveError> {
        let range = ScanRange {
            peer: criteria.with.clone(),
            start: criteria.start,
            end: criteria.end,
            tags: criteria.tags.clone(),
        };
        let scanned = self.store.scan(criteria.questioner(), &range).await?;

        let predicate = FilterPredicate::from_criteria(criteria);
        Ok(scanned
            .into_iter()
            .filter(|item| predicate.matches(item))
            .collect())
    }
}
