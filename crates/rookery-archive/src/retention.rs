//! Domain-level retention sweep.
//!
//! The only operation scoped by domain rather than by single owner:
//! retention policy is administered at the server level. Scheduling of
//! periodic sweeps belongs to the hosting server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::ArchiveError;
use crate::identity::BareJid;
use crate::store::ArchiveStore;

pub struct RetentionSweeper {
    store: Arc<dyn ArchiveStore>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Delete every record under `domain` strictly older than `before`.
    /// Returns the number of records removed.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn sweep(
        &self,
        domain: &BareJid,
        before: DateTime<Utc>,
    ) -> Result<u64, ArchiveError> {
        let deleted = self
            .store
            .delete_before_for_domain(domain.domain(), before)
            .await?;
        debug!(deleted, "retention sweep finished");
        Ok(deleted)
    }
}
