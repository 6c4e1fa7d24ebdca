//! libSQL archive backend.
//!
//! Durable storage for archived messages and their tag index. Record and
//! tag rows are written inside one transaction, so readers observe either
//! the whole record or nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::Connection;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{ArchiveStore, ScanRange};
use crate::error::ArchiveError;
use crate::identity::{BareJid, Jid};
use crate::item::{ArchivedItem, ConversationType, Direction};

/// Separator for the tag list folded into a scan row.
const TAG_SEP: char = '\u{1f}';

/// SQL schema for archive storage.
pub const ARCHIVE_SCHEMA: &str = r#"
-- Archived conversation messages, one row per record
CREATE TABLE IF NOT EXISTS archive_messages (
    -- Primary key: UUID v7 over the logical timestamp (time-sortable)
    id TEXT PRIMARY KEY,
    -- Owning archive, normalized bare JID
    owner_jid TEXT NOT NULL,
    -- Domain of the owner, for retention sweeps
    owner_domain TEXT NOT NULL,
    -- Conversation partner as archived (may carry a resource)
    peer_jid TEXT NOT NULL,
    -- Bare form of the partner, used for comparison and indexing
    peer_bare_jid TEXT NOT NULL,
    -- "incoming" | "outgoing"
    direction TEXT NOT NULL,
    -- "chat" | "groupchat"
    conversation_type TEXT NOT NULL DEFAULT 'chat',
    -- Logical timestamp, RFC 3339 UTC with fixed micros so text order
    -- equals time order
    timestamp TEXT NOT NULL,
    -- Raw serialized message stanza
    payload TEXT NOT NULL,
    -- Text body extracted at write time (substring search)
    body TEXT
);

CREATE INDEX IF NOT EXISTS idx_archive_owner_id
    ON archive_messages(owner_jid, id);
CREATE INDEX IF NOT EXISTS idx_archive_owner_peer_ts
    ON archive_messages(owner_jid, peer_bare_jid, timestamp);
CREATE INDEX IF NOT EXISTS idx_archive_domain_ts
    ON archive_messages(owner_domain, timestamp);

-- Tag index: (owner, tag) -> record. Rows live and die with the record.
CREATE TABLE IF NOT EXISTS archive_tags (
    owner_jid TEXT NOT NULL,
    tag TEXT NOT NULL,
    message_id TEXT NOT NULL,
    PRIMARY KEY (owner_jid, tag, message_id)
);

CREATE INDEX IF NOT EXISTS idx_archive_tags_message
    ON archive_tags(message_id);
"#;

/// libSQL-based archive store.
#[derive(Clone)]
pub struct LibsqlArchiveStore {
    /// For in-memory databases this must be a persistent connection.
    conn: Arc<Mutex<Connection>>,
    initialized: Arc<std::sync::atomic::AtomicBool>,
}

impl LibsqlArchiveStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            initialized: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Share a connection with other components of the hosting server.
    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            initialized: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Open a local database file (`:memory:` works for tests).
    pub async fn open_local(path: &str) -> Result<Self, ArchiveError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ArchiveError::Storage(e.to_string()))?;
        let conn = db.connect().map_err(|e| ArchiveError::Storage(e.to_string()))?;
        Ok(Self::new(conn))
    }

    /// Initialize the schema if not already done.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), ArchiveError> {
        if self.initialized.load(std::sync::atomic::Ordering::Acquire) {
            return Ok(());
        }

        let conn = self.conn.lock().await;
        conn.execute_batch(ARCHIVE_SCHEMA).await?;

        self.initialized
            .store(true, std::sync::atomic::Ordering::Release);
        debug!("archive schema initialized");
        Ok(())
    }

    fn encode_ts(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn decode_ts(raw: &str) -> Result<DateTime<Utc>, ArchiveError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ArchiveError::Storage(format!("invalid stored timestamp: {}", e)))
    }

    fn row_to_item(row: &libsql::Row) -> Result<ArchivedItem, ArchiveError> {
        let id: String = row.get(0)?;
        let owner_jid: String = row.get(1)?;
        let peer_jid: String = row.get(2)?;
        let direction_raw: String = row.get(3)?;
        let type_raw: String = row.get(4)?;
        let timestamp_raw: String = row.get(5)?;
        let payload: String = row.get(6)?;
        let body: Option<String> = row.get(7).ok();
        let tags_raw: Option<String> = row.get(8).ok();

        let direction = Direction::parse(&direction_raw)
            .ok_or_else(|| ArchiveError::Storage(format!("invalid direction: {}", direction_raw)))?;
        let conversation_type = ConversationType::parse(&type_raw)
            .ok_or_else(|| ArchiveError::Storage(format!("invalid conversation type: {}", type_raw)))?;

        Ok(ArchivedItem {
            id,
            owner: BareJid::new(&owner_jid)
                .map_err(|e| ArchiveError::Storage(format!("invalid stored owner: {}", e)))?,
            peer: Jid::new(&peer_jid)
                .map_err(|e| ArchiveError::Storage(format!("invalid stored peer: {}", e)))?,
            direction,
            conversation_type,
            timestamp: Self::decode_ts(&timestamp_raw)?,
            payload,
            body,
            tags: tags_raw
                .map(|raw| raw.split(TAG_SEP).map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl ArchiveStore for LibsqlArchiveStore {
    #[instrument(skip(self, item), fields(owner = %item.owner, archive_id = %item.id))]
    async fn append(&self, item: ArchivedItem) -> Result<(), ArchiveError> {
        self.initialize().await?;

        let conn = self.conn.lock().await;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            INSERT INTO archive_messages (
                id, owner_jid, owner_domain, peer_jid, peer_bare_jid,
                direction, conversation_type, timestamp, payload, body
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            libsql::params![
                item.id.as_str(),
                item.owner.as_str(),
                item.owner.domain(),
                item.peer.to_string(),
                item.peer.bare().as_str(),
                item.direction.as_str(),
                item.conversation_type.as_str(),
                Self::encode_ts(item.timestamp),
                item.payload.as_str(),
                item.body.as_deref(),
            ],
        )
        .await?;

        for tag in &item.tags {
            tx.execute(
                "INSERT INTO archive_tags (owner_jid, tag, message_id) VALUES (?1, ?2, ?3)",
                libsql::params![item.owner.as_str(), tag.as_str(), item.id.as_str()],
            )
            .await?;
        }

        tx.commit().await?;
        debug!("message stored in archive");
        Ok(())
    }

    #[instrument(skip(self, range), fields(owner = %owner))]
    async fn scan(
        &self,
        owner: &BareJid,
        range: &ScanRange,
    ) -> Result<Vec<ArchivedItem>, ArchiveError> {
        self.initialize().await?;

        let mut sql = String::from(
            r#"
            SELECT
                m.id, m.owner_jid, m.peer_jid, m.direction, m.conversation_type,
                m.timestamp, m.payload, m.body,
                (SELECT group_concat(t.tag, char(31))
                   FROM archive_tags t WHERE t.message_id = m.id) AS tags
            FROM archive_messages m
            WHERE m.owner_jid = ?1
            "#,
        );

        let mut params: Vec<libsql::Value> = vec![owner.as_str().into()];
        let mut param_index = 2;

        if let Some(peer) = &range.peer {
            sql.push_str(&format!(" AND m.peer_bare_jid = ?{}", param_index));
            params.push(peer.as_str().into());
            param_index += 1;
        }
        if let Some(start) = range.start {
            sql.push_str(&format!(" AND m.timestamp >= ?{}", param_index));
            params.push(Self::encode_ts(start).into());
            param_index += 1;
        }
        if let Some(end) = range.end {
            sql.push_str(&format!(" AND m.timestamp < ?{}", param_index));
            params.push(Self::encode_ts(end).into());
            param_index += 1;
        }
        if !range.tags.is_empty() {
            let placeholders: Vec<String> = (0..range.tags.len())
                .map(|i| format!("?{}", param_index + i))
                .collect();
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM archive_tags t
                    WHERE t.message_id = m.id AND t.tag IN ({}))",
                placeholders.join(", ")
            ));
            for tag in &range.tags {
                params.push(tag.as_str().into());
            }
        }

        // Id order is the archive order.
        sql.push_str(" ORDER BY m.id ASC");

        let conn = self.conn.lock().await;
        let mut rows = conn.query(&sql, params).await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_item(&row)?);
        }
        Ok(items)
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn get(&self, owner: &BareJid, id: &str) -> Result<Option<ArchivedItem>, ArchiveError> {
        self.initialize().await?;

        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                r#"
                SELECT
                    m.id, m.owner_jid, m.peer_jid, m.direction, m.conversation_type,
                    m.timestamp, m.payload, m.body,
                    (SELECT group_concat(t.tag, char(31))
                       FROM archive_tags t WHERE t.message_id = m.id) AS tags
                FROM archive_messages m
                WHERE m.owner_jid = ?1 AND m.id = ?2
                "#,
                libsql::params![owner.as_str(), id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(owner = %owner, peer = %peer))]
    async fn delete_range(
        &self,
        owner: &BareJid,
        peer: &BareJid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, ArchiveError> {
        self.initialize().await?;

        let from = Self::encode_ts(from);
        let to = Self::encode_ts(to);

        let conn = self.conn.lock().await;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            DELETE FROM archive_tags WHERE message_id IN (
                SELECT id FROM archive_messages
                WHERE owner_jid = ?1 AND peer_bare_jid = ?2
                  AND timestamp >= ?3 AND timestamp < ?4
            )
            "#,
            libsql::params![owner.as_str(), peer.as_str(), from.as_str(), to.as_str()],
        )
        .await?;

        let deleted = tx
            .execute(
                r#"
                DELETE FROM archive_messages
                WHERE owner_jid = ?1 AND peer_bare_jid = ?2
                  AND timestamp >= ?3 AND timestamp < ?4
                "#,
                libsql::params![owner.as_str(), peer.as_str(), from.as_str(), to.as_str()],
            )
            .await?;

        tx.commit().await?;
        debug!(deleted, "archive range deleted");
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn delete_before_for_domain(
        &self,
        domain: &str,
        before: DateTime<Utc>,
    ) -> Result<u64, ArchiveError> {
        self.initialize().await?;

        let before = Self::encode_ts(before);

        let conn = self.conn.lock().await;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            DELETE FROM archive_tags WHERE message_id IN (
                SELECT id FROM archive_messages
                WHERE owner_domain = ?1 AND timestamp < ?2
            )
            "#,
            libsql::params![domain, before.as_str()],
        )
        .await?;

        let deleted = tx
            .execute(
                "DELETE FROM archive_messages WHERE owner_domain = ?1 AND timestamp < ?2",
                libsql::params![domain, before.as_str()],
            )
            .await?;

        tx.commit().await?;
        debug!(deleted, "expired records deleted for domain");
        Ok(deleted)
    }

    async fn count(&self, owner: &BareJid) -> Result<u64, ArchiveError> {
        self.initialize().await?;

        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM archive_messages WHERE owner_jid = ?1",
                libsql::params![owner.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get(0)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArchiveIdGenerator;
    use chrono::TimeZone;

    async fn create_test_store() -> LibsqlArchiveStore {
        LibsqlArchiveStore::open_local(":memory:").await.unwrap()
    }

    fn owner() -> BareJid {
        BareJid::new("owner@test").unwrap()
    }

    fn item(ids: &ArchiveIdGenerator, seconds: u32, tags: &[&str]) -> ArchivedItem {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, seconds).unwrap();
        ArchivedItem {
            id: ids.next_id(timestamp),
            owner: owner(),
            peer: Jid::new("buddy@test/res").unwrap(),
            direction: Direction::Incoming,
            conversation_type: ConversationType::Chat,
            timestamp,
            payload: format!("<message>{}</message>", seconds),
            body: Some(format!("msg {}", seconds)),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn store_and_retrieve_roundtrip() {
        let store = create_test_store().await;
        let ids = ArchiveIdGenerator::new();
        let original = item(&ids, 7, &["#a", "#b"]);
        let id = original.id.clone();
        store.append(original.clone()).await.unwrap();

        let got = store.get(&owner(), &id).await.unwrap().expect("stored item");
        assert_eq!(got.id, id);
        assert_eq!(got.body.as_deref(), Some("msg 7"));
        assert_eq!(got.direction, Direction::Incoming);
        assert_eq!(got.timestamp, original.timestamp);
        assert_eq!(got.peer.to_string(), "buddy@test/res");
        assert_eq!(got.tags, original.tags);
    }

    #[tokio::test]
    async fn scan_orders_by_id_and_narrows_by_tag() {
        let store = create_test_store().await;
        let ids = ArchiveIdGenerator::new();
        store.append(item(&ids, 2, &[])).await.unwrap();
        store.append(item(&ids, 1, &["#x"])).await.unwrap();
        store.append(item(&ids, 3, &["#x", "#y"])).await.unwrap();

        let all = store.scan(&owner(), &ScanRange::default()).await.unwrap();
        let seconds: Vec<i64> = all.iter().map(|it| it.timestamp.timestamp() % 60).collect();
        assert_eq!(seconds, [1, 2, 3]);

        let range = ScanRange {
            tags: ["#x".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(store.scan(&owner(), &range).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_range_removes_tag_rows_with_records() {
        let store = create_test_store().await;
        let ids = ArchiveIdGenerator::new();
        store.append(item(&ids, 1, &["#x"])).await.unwrap();
        store.append(item(&ids, 20, &["#x"])).await.unwrap();

        let deleted = store
            .delete_range(
                &owner(),
                &BareJid::new("buddy@test").unwrap(),
                Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 10).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let conn = store.conn.lock().await;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM archive_tags", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let tag_rows: i64 = row.get(0).unwrap();
        assert_eq!(tag_rows, 1);
    }

    #[tokio::test]
    async fn retention_sweep_scoped_by_owner_domain() {
        let store = create_test_store().await;
        let ids = ArchiveIdGenerator::new();
        store.append(item(&ids, 1, &[])).await.unwrap();
        store.append(item(&ids, 50, &[])).await.unwrap();

        let mut foreign = item(&ids, 1, &[]);
        foreign.owner = BareJid::new("user@elsewhere").unwrap();
        store.append(foreign).await.unwrap();

        let cutoff = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap();
        let deleted = store.delete_before_for_domain("test", cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count(&owner()).await.unwrap(), 1);
        assert_eq!(
            store
                .count(&BareJid::new("user@elsewhere").unwrap())
                .await
                .unwrap(),
            1
        );
    }
}
