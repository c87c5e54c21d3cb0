//! Fetch worker pool
//!
//! One task per configured topic pages backward through the search
//! collaborator, newest first, resuming from the topic's persisted
//! checkpoint. Accepted posts go onto the shared raw-post channel; the
//! channel closes once every topic task has finished.

use super::types::{FoundPost, RawPost};
use crate::config::TopicSpec;
use crate::slug::slugify;
use crate::store::SentimentStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capability for querying the external post search service.
///
/// Results are expected newest-first. Errors must surface to the caller;
/// the fetch stage decides what to abandon.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetch up to `page_size` posts matching `query` with
    /// `since_id < post_id < max_id + 1` (i.e. ids at or below `since_id`
    /// excluded, ids above `max_id` excluded).
    async fn search(
        &self,
        query: &str,
        since_id: i64,
        max_id: i64,
        page_size: usize,
    ) -> Result<Vec<FoundPost>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Worker pool that searches for posts across the configured topics.
///
/// Call [`Searcher::run`] once per pipeline run; topic tasks share no
/// mutable state with each other.
pub struct Searcher {
    client: Arc<dyn SearchClient>,
    store: Arc<dyn SentimentStore>,
    topics: Vec<Arc<TopicSpec>>,
    min_results: usize,
    max_age: Duration,
}

impl Searcher {
    /// Create a searcher over the given topics.
    ///
    /// Topics must be non-empty and `min_results` at least 1; both are
    /// rejected here so no run ever starts misconfigured.
    pub fn new(
        topics: Vec<TopicSpec>,
        min_results: usize,
        max_age: Duration,
        client: Arc<dyn SearchClient>,
        store: Arc<dyn SentimentStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if topics.is_empty() {
            return Err("searcher: topics must not be empty".into());
        }
        if min_results < 1 {
            return Err("searcher: min_results must be > 0".into());
        }

        Ok(Self {
            client,
            store,
            topics: topics.into_iter().map(Arc::new).collect(),
            min_results,
            max_age,
        })
    }

    /// Run one concurrent search across all topics, emitting accepted posts
    /// to `tx`. Returns once every topic task has finished; the raw channel
    /// closes when the last sender clone drops.
    pub async fn run(&self, token: CancellationToken, tx: mpsc::Sender<RawPost>) {
        let mut handles = Vec::with_capacity(self.topics.len());

        for spec in &self.topics {
            handles.push(tokio::spawn(search_topic(
                spec.clone(),
                self.client.clone(),
                self.store.clone(),
                self.min_results,
                self.max_age,
                token.clone(),
                tx.clone(),
            )));
        }
        drop(tx);

        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Look up the checkpoint for a topic: the `last_seen_id` of its most
/// recent persisted summary.
async fn last_seen_id(
    store: &dyn SentimentStore,
    spec: &TopicSpec,
) -> Result<i64, crate::store::StoreError> {
    let records = store.get_by_slug(&slugify(&spec.topic), 1).await?;
    Ok(records.first().map(|r| r.last_seen_id).unwrap_or(0))
}

/// Fetch loop for a single topic.
///
/// Backward pagination: the cursor starts at the maximum representable id
/// and drops to one less than the smallest id seen each page, while
/// `since_id` pins the floor at the checkpoint. Stops once enough posts are
/// collected, or after examining 3× that many without collecting enough
/// (the give-up guard for low-yield queries).
async fn search_topic(
    spec: Arc<TopicSpec>,
    client: Arc<dyn SearchClient>,
    store: Arc<dyn SentimentStore>,
    min_results: usize,
    max_age: Duration,
    token: CancellationToken,
    tx: mpsc::Sender<RawPost>,
) {
    let checkpoint = match last_seen_id(store.as_ref(), &spec).await {
        Ok(id) => id,
        Err(e) => {
            // Expected on a topic's first run; degrade to a full window.
            log::warn!(
                "⚠️  no checkpoint for topic '{}', searching from 0: {}",
                spec.topic,
                e
            );
            0
        }
    };

    let page_size = min_results.min(100);
    let query = spec.query.trim().to_string();

    log::info!(
        "🔍 searching topic '{}' (query: {:?}, from_id: {})",
        spec.topic,
        query,
        checkpoint
    );

    let mut collected = 0usize;
    let mut seen = 0usize;
    let mut cursor = i64::MAX;

    while collected < min_results && seen < min_results * 3 {
        // Cancel before the next fetch, but still let any posts already
        // fetched below flow through.
        if token.is_cancelled() {
            log::info!("🛑 search for topic '{}' stopping: cancelled", spec.topic);
            return;
        }

        let page = match client.search(&query, checkpoint, cursor - 1, page_size).await {
            Ok(page) => page,
            Err(e) => {
                log::error!("❌ search failed for topic '{}': {}", spec.topic, e);
                return;
            }
        };

        if page.is_empty() {
            // Results exhausted; neither counter would advance.
            break;
        }

        for post in page {
            // Track the oldest id as the pagination cursor
            if cursor > post.post_id {
                cursor = post.post_id;
            }

            seen += 1;

            // Never re-emit posts at or below the checkpoint, even if the
            // collaborator ignored since_id.
            if post.post_id <= checkpoint {
                continue;
            }

            let created_at = match DateTime::parse_from_rfc3339(&post.created_at) {
                Ok(t) => t.with_timezone(&Utc),
                Err(_) => continue,
            };

            // Skip old posts to keep results relevant
            if Utc::now().signed_duration_since(created_at) > max_age {
                continue;
            }

            let raw = RawPost {
                topic: spec.clone(),
                post_id: post.post_id,
                is_repost: post.is_repost,
                text: post.text,
            };

            if tx.send(raw).await.is_err() {
                // Downstream gone; nothing left to do for this topic
                return;
            }
            collected += 1;
        }
    }

    log::debug!(
        "🔍 topic '{}' done: {} collected, {} seen",
        spec.topic,
        collected,
        seen
    );
}
