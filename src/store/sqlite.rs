//! SQLite implementation of the sentiment store
//!
//! Append-only `sentiments` table, WAL mode, schema created idempotently at
//! startup. The connection sits behind a mutex; writes happen once per topic
//! per run and reads are small indexed scans, so a single connection is
//! plenty.

use super::{SentimentRecord, SentimentStore, StoreError};
use crate::slug::is_valid_slug;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sentiments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    topic           TEXT NOT NULL,
    slug            TEXT NOT NULL,
    query           TEXT NOT NULL,
    count           INTEGER NOT NULL,
    score           REAL NOT NULL,
    std_dev         REAL NOT NULL,
    variance        REAL NOT NULL,
    fetched_at      TEXT NOT NULL,
    last_seen_id    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sentiments_slug ON sentiments (slug, fetched_at);
CREATE INDEX IF NOT EXISTS idx_sentiments_topic ON sentiments (topic, fetched_at);
"#;

/// SQLite-backed `SentimentStore`.
pub struct SqliteSentimentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSentimentStore {
    /// Open (or create) the database at `db_path` and ensure the schema
    /// exists. Enables WAL mode so API reads don't block pipeline writes.
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        log::info!("📊 sentiment store ready at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared query path for the slug/topic lookups. `field` is a column
    /// name from a fixed whitelist, never caller input.
    fn get_by_field(
        &self,
        field: &'static str,
        value: &str,
        limit: u32,
    ) -> Result<Vec<SentimentRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT id, topic, slug, query, count, score, std_dev, variance, fetched_at, last_seen_id
             FROM sentiments
             WHERE {} = ?1
             ORDER BY fetched_at DESC, id DESC
             LIMIT ?2",
            field
        );

        // SQLite treats a negative LIMIT as unbounded
        let effective_limit: i64 = if limit == 0 { -1 } else { i64::from(limit) };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![value, effective_limit], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        if records.is_empty() {
            return Err(StoreError::NotFound);
        }

        Ok(records)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SentimentRecord> {
    let fetched_at: String = row.get(8)?;
    let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(SentimentRecord {
        id: row.get(0)?,
        topic: row.get(1)?,
        slug: row.get(2)?,
        query: row.get(3)?,
        count: row.get(4)?,
        score: row.get(5)?,
        std_dev: row.get(6)?,
        variance: row.get(7)?,
        fetched_at,
        last_seen_id: row.get(9)?,
    })
}

#[async_trait]
impl SentimentStore for SqliteSentimentStore {
    async fn save(&self, record: SentimentRecord) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO sentiments (
                topic, slug, query, count, score, std_dev, variance, fetched_at, last_seen_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            rusqlite::params![
                record.topic,
                record.slug,
                record.query,
                record.count,
                record.score,
                record.std_dev,
                record.variance,
                record.fetched_at.to_rfc3339(),
                record.last_seen_id,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn get_by_slug(&self, slug: &str, limit: u32) -> Result<Vec<SentimentRecord>, StoreError> {
        if !is_valid_slug(slug) {
            return Err(StoreError::InvalidSlug(slug.to_string()));
        }
        self.get_by_field("slug", slug, limit)
    }

    async fn get_by_topic(
        &self,
        topic: &str,
        limit: u32,
    ) -> Result<Vec<SentimentRecord>, StoreError> {
        self.get_by_field("topic", topic, limit)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SentimentRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, topic, slug, query, count, score, std_dev, variance, fetched_at, last_seen_id
             FROM sentiments WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map([id], row_to_record)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (NamedTempFile, SqliteSentimentStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteSentimentStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, store)
    }

    fn make_record(slug: &str, fetched_at_secs: i64, last_seen_id: i64) -> SentimentRecord {
        SentimentRecord {
            id: 0,
            topic: slug.replace('-', " "),
            slug: slug.to_string(),
            query: format!("#{}", slug),
            count: 4,
            score: 0.325,
            std_dev: 0.4787,
            variance: 0.2292,
            fetched_at: Utc.timestamp_opt(fetched_at_secs, 0).unwrap(),
            last_seen_id,
        }
    }

    #[tokio::test]
    async fn test_save_returns_generated_id() {
        let (_temp, store) = create_test_store();

        let id1 = store.save(make_record("bitcoin", 1_700_000_000, 10)).await.unwrap();
        let id2 = store.save(make_record("bitcoin", 1_700_000_600, 20)).await.unwrap();

        assert!(id1 > 0);
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn test_get_by_slug_most_recent_first() {
        let (_temp, store) = create_test_store();

        store.save(make_record("bitcoin", 1_700_000_000, 10)).await.unwrap();
        store.save(make_record("bitcoin", 1_700_001_200, 30)).await.unwrap();
        store.save(make_record("bitcoin", 1_700_000_600, 20)).await.unwrap();
        store.save(make_record("ethereum", 1_700_002_000, 99)).await.unwrap();

        let records = store.get_by_slug("bitcoin", 0).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].last_seen_id, 30);
        assert_eq!(records[1].last_seen_id, 20);
        assert_eq!(records[2].last_seen_id, 10);

        // limit caps the window from the most recent end
        let records = store.get_by_slug("bitcoin", 1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_seen_id, 30);
    }

    #[tokio::test]
    async fn test_get_by_slug_not_found() {
        let (_temp, store) = create_test_store();

        let result = store.get_by_slug("missing-topic", 1).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_get_by_slug_rejects_malformed_slug() {
        let (_temp, store) = create_test_store();
        store.save(make_record("bitcoin", 1_700_000_000, 10)).await.unwrap();

        let result = store.get_by_slug("Not A Slug", 1).await;
        assert!(matches!(result, Err(StoreError::InvalidSlug(_))));
    }

    #[tokio::test]
    async fn test_get_by_topic() {
        let (_temp, store) = create_test_store();

        store.save(make_record("dogecoin-to-the-moon", 1_700_000_000, 5)).await.unwrap();

        let records = store.get_by_topic("dogecoin to the moon", 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slug, "dogecoin-to-the-moon");

        let result = store.get_by_topic("unknown", 10).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let (_temp, store) = create_test_store();

        let id = store.save(make_record("bitcoin", 1_700_000_000, 10)).await.unwrap();

        let record = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.slug, "bitcoin");
        assert_eq!(record.count, 4);
        assert_eq!(record.fetched_at, Utc.timestamp_opt(1_700_000_000, 0).unwrap());

        assert!(store.get_by_id(id + 1000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let (_temp, store) = create_test_store();

        // Two runs for the same topic produce two rows, not an update
        store.save(make_record("bitcoin", 1_700_000_000, 10)).await.unwrap();
        store.save(make_record("bitcoin", 1_700_000_600, 20)).await.unwrap();

        let records = store.get_by_slug("bitcoin", 0).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
    }
}
