//! Aggregation stage
//!
//! A single task owns the per-run map of running aggregates: it is the only
//! reader and writer, so the per-post update path needs no locking. At end
//! of stream every topic with at least one folded sample is finalized and
//! appended to the store.

use super::stats::RunningAggregate;
use super::types::ScoredPost;
use crate::slug::slugify;
use crate::store::{SentimentRecord, SentimentStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Folds scored posts into per-topic summaries and persists them.
pub struct Aggregator {
    store: Arc<dyn SentimentStore>,
}

/// Topic display names are normalized once here so the persisted record and
/// its slug agree regardless of how the spec was written in the topics file.
fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

impl Aggregator {
    pub fn new(store: Arc<dyn SentimentStore>) -> Self {
        Self { store }
    }

    /// Consume the scored channel until it closes, then finalize and persist
    /// one record per topic that produced at least one sample.
    ///
    /// Returns the number of summaries persisted. The aggregator carries no
    /// cancellation token: a cancelled run closes the channel upstream, and
    /// everything that already reached this queue is still folded and
    /// flushed.
    pub async fn run(&self, mut rx: mpsc::Receiver<ScoredPost>) -> usize {
        let mut aggregates: HashMap<String, RunningAggregate> = HashMap::new();

        while let Some(scored) = rx.recv().await {
            let aggregate = aggregates.entry(scored.topic.topic.clone()).or_default();

            aggregate.fold(scored.score);
            aggregate.observe_post_id(scored.post_id);

            // Kept idempotently current; later samples may overwrite
            // denormalized topic text.
            aggregate.topic = normalize_topic(&scored.topic.topic);
            aggregate.query = scored.topic.query.clone();
        }

        let mut saved = 0usize;

        for (topic, aggregate) in aggregates {
            // Every entry was created by a first sample, so count ≥ 1 holds
            // here by construction.
            let stats = aggregate.finalize();
            let slug = slugify(&aggregate.topic);

            let record = SentimentRecord {
                id: 0,
                topic: aggregate.topic.clone(),
                slug: slug.clone(),
                query: aggregate.query.clone(),
                count: aggregate.count,
                score: stats.mean,
                std_dev: stats.std_dev,
                variance: stats.variance,
                fetched_at: Utc::now(),
                last_seen_id: aggregate.max_post_id_seen,
            };

            match self.store.save(record).await {
                Ok(id) => {
                    log::info!(
                        "💾 saved summary: topic='{}' slug={} id={} score={:.4} count={} stddev={:.4} variance={:.4}",
                        aggregate.topic,
                        slug,
                        id,
                        stats.mean,
                        aggregate.count,
                        stats.std_dev,
                        stats.variance
                    );
                    saved += 1;
                }
                Err(e) => {
                    log::error!("❌ failed to save summary for topic '{}': {}", topic, e);
                }
            }
        }

        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicSpec;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory store capturing saves; optionally fails for one slug.
    struct CapturingStore {
        saved: Mutex<Vec<SentimentRecord>>,
        fail_slug: Option<String>,
    }

    impl CapturingStore {
        fn new() -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail_slug: None,
            }
        }

        fn failing_for(slug: &str) -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail_slug: Some(slug.to_string()),
            }
        }
    }

    #[async_trait]
    impl SentimentStore for CapturingStore {
        async fn save(&self, record: SentimentRecord) -> Result<i64, StoreError> {
            if self.fail_slug.as_deref() == Some(record.slug.as_str()) {
                return Err(StoreError::Database(
                    rusqlite::Error::ExecuteReturnedResults,
                ));
            }
            let mut saved = self.saved.lock().unwrap();
            saved.push(record);
            Ok(saved.len() as i64)
        }

        async fn get_by_slug(
            &self,
            _slug: &str,
            _limit: u32,
        ) -> Result<Vec<SentimentRecord>, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn get_by_topic(
            &self,
            _topic: &str,
            _limit: u32,
        ) -> Result<Vec<SentimentRecord>, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn get_by_id(&self, _id: i64) -> Result<Option<SentimentRecord>, StoreError> {
            Ok(None)
        }
    }

    fn scored(topic: &Arc<TopicSpec>, post_id: i64, score: f32) -> ScoredPost {
        ScoredPost {
            post_id,
            score,
            magnitude: score.abs() * 2.0,
            topic: topic.clone(),
        }
    }

    fn topic(name: &str) -> Arc<TopicSpec> {
        Arc::new(TopicSpec {
            topic: name.to_string(),
            query: format!("#{}", name.to_lowercase()),
        })
    }

    async fn run_aggregator(store: Arc<CapturingStore>, posts: Vec<ScoredPost>) -> usize {
        let aggregator = Aggregator::new(store);
        let (tx, rx) = mpsc::channel(100);
        for post in posts {
            tx.send(post).await.unwrap();
        }
        drop(tx);
        aggregator.run(rx).await
    }

    #[tokio::test]
    async fn test_three_topics_four_scores_each() {
        let store = Arc::new(CapturingStore::new());
        let scores = [0.5f32, -0.2, 0.1, 0.9];

        let mut posts = Vec::new();
        for (t, name) in ["Bitcoin", "Ethereum", "Dogecoin"].iter().enumerate() {
            let spec = topic(name);
            for (i, &score) in scores.iter().enumerate() {
                // Distinct ids per topic; max is the last one
                posts.push(scored(&spec, (t as i64 + 1) * 1000 + i as i64, score));
            }
        }

        let saved_count = run_aggregator(store.clone(), posts).await;
        assert_eq!(saved_count, 3);

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 3);

        for record in saved.iter() {
            assert_eq!(record.count, 4);
            assert!((record.score - 0.325).abs() < 1e-4);
            // Sample variance of [0.5, -0.2, 0.1, 0.9] with Bessel's
            // correction is 0.6875 / 3
            assert!((record.variance - 0.6875 / 3.0).abs() < 1e-4);
            assert!((record.std_dev - (0.6875f64 / 3.0).sqrt()).abs() < 1e-4);
        }

        let bitcoin = saved.iter().find(|r| r.slug == "bitcoin").unwrap();
        assert_eq!(bitcoin.last_seen_id, 1003);
        assert_eq!(bitcoin.topic, "bitcoin");
        assert_eq!(bitcoin.query, "#bitcoin");
    }

    #[tokio::test]
    async fn test_interleaved_arrival_order_does_not_matter() {
        let store = Arc::new(CapturingStore::new());
        let a = topic("Bitcoin");
        let b = topic("Ethereum");

        // Topics interleaved, ids out of order within each topic
        let posts = vec![
            scored(&a, 12, 0.5),
            scored(&b, 7, 0.9),
            scored(&a, 99, -0.2),
            scored(&a, 3, 0.1),
            scored(&b, 2, -0.7),
            scored(&a, 40, 0.9),
        ];

        run_aggregator(store.clone(), posts).await;

        let saved = store.saved.lock().unwrap();
        let bitcoin = saved.iter().find(|r| r.slug == "bitcoin").unwrap();
        let ethereum = saved.iter().find(|r| r.slug == "ethereum").unwrap();

        assert_eq!(bitcoin.count, 4);
        assert_eq!(bitcoin.last_seen_id, 99);
        assert!((bitcoin.score - 0.325).abs() < 1e-4);

        assert_eq!(ethereum.count, 2);
        assert_eq!(ethereum.last_seen_id, 7);
        assert!((ethereum.score - 0.1).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_empty_stream_persists_nothing() {
        let store = Arc::new(CapturingStore::new());
        let saved_count = run_aggregator(store.clone(), Vec::new()).await;

        assert_eq!(saved_count, 0);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_sample_topic_has_zero_variance() {
        let store = Arc::new(CapturingStore::new());
        let spec = topic("Bitcoin");

        run_aggregator(store.clone(), vec![scored(&spec, 5, 0.7)]).await;

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].count, 1);
        assert!((saved[0].score - f64::from(0.7f32)).abs() < 1e-9);
        assert_eq!(saved[0].variance, 0.0);
        assert_eq!(saved[0].std_dev, 0.0);
    }

    #[tokio::test]
    async fn test_persistence_failure_for_one_topic_spares_others() {
        let store = Arc::new(CapturingStore::failing_for("bitcoin"));

        let a = topic("Bitcoin");
        let b = topic("Ethereum");
        let posts = vec![
            scored(&a, 1, 0.5),
            scored(&a, 2, 0.1),
            scored(&b, 3, -0.4),
        ];

        let saved_count = run_aggregator(store.clone(), posts).await;

        assert_eq!(saved_count, 1);
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].slug, "ethereum");
    }

    #[tokio::test]
    async fn test_topic_name_normalized_for_record_and_slug() {
        let store = Arc::new(CapturingStore::new());
        let spec = topic("  Dogecoin To The Moon  ");

        run_aggregator(store.clone(), vec![scored(&spec, 1, 0.2)]).await;

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved[0].topic, "dogecoin to the moon");
        assert_eq!(saved[0].slug, "dogecoin-to-the-moon");
    }
}
