//! Persistence seam for sentiment summaries
//!
//! The pipeline writes through the `SentimentStore` trait so the backing
//! database is a swappable adapter. The concrete SQLite implementation
//! lives in `store::sqlite`; tests substitute in-memory mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod sqlite;

pub use sqlite::SqliteSentimentStore;

/// Store-level errors.
///
/// `NotFound` is an expected outcome, not a fault: the fetch stage maps it
/// to "no checkpoint yet" and proceeds from zero.
#[derive(Debug)]
pub enum StoreError {
    /// No records matched the query
    NotFound,
    /// Slug did not conform to the URL-safe slug format; rejected before
    /// any store access
    InvalidSlug(String),
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "no results found"),
            StoreError::InvalidSlug(s) => write!(f, "{} is not a valid URL slug", s),
            StoreError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Aggregated sentiment for one topic over one run.
///
/// One record is appended per topic per completed run; history is never
/// updated in place. `last_seen_id` is the checkpoint the next run resumes
/// from and is not exposed through the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentRecord {
    /// Store-generated identifier; 0 until saved
    #[serde(default)]
    pub id: i64,
    pub topic: String,
    pub slug: String,
    pub query: String,
    pub count: i64,
    /// Final mean score over the run's samples
    pub score: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub last_seen_id: i64,
}

/// Database capability for storing and retrieving sentiment summaries.
#[async_trait]
pub trait SentimentStore: Send + Sync {
    /// Append a new record, returning its generated identifier.
    async fn save(&self, record: SentimentRecord) -> Result<i64, StoreError>;

    /// Fetch historical records for a slugified topic name, most recent
    /// first, up to `limit` records (0 fetches all). Fails with
    /// `StoreError::NotFound` when nothing matches and with
    /// `StoreError::InvalidSlug` before any store access when the slug is
    /// malformed.
    async fn get_by_slug(&self, slug: &str, limit: u32) -> Result<Vec<SentimentRecord>, StoreError>;

    /// Same semantics as `get_by_slug`, keyed by the raw topic name.
    async fn get_by_topic(
        &self,
        topic: &str,
        limit: u32,
    ) -> Result<Vec<SentimentRecord>, StoreError>;

    /// Fetch a single record by id; None when no record exists.
    async fn get_by_id(&self, id: i64) -> Result<Option<SentimentRecord>, StoreError>;
}
