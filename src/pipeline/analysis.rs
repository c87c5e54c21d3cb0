//! Sentiment analysis worker pool
//!
//! A fixed number of workers compete for posts from one shared receiver, so
//! fast topics never starve slow ones. Each post's text is normalized to
//! Unicode NFC before submission, giving the sentiment service consistent
//! byte sequences regardless of upstream encoding quirks.

use super::types::{RawPost, ScoredPost, SentimentScore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use unicode_normalization::UnicodeNormalization;

/// Capability for scoring one document's sentiment.
#[async_trait]
pub trait SentimentClient: Send + Sync {
    async fn analyze(
        &self,
        text: &str,
        language: &str,
    ) -> Result<SentimentScore, Box<dyn std::error::Error + Send + Sync>>;
}

/// Worker pool that scores raw posts through the sentiment collaborator.
pub struct Analyzer {
    client: Arc<dyn SentimentClient>,
    num_workers: usize,
}

impl Analyzer {
    pub fn new(
        client: Arc<dyn SentimentClient>,
        num_workers: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if num_workers < 1 {
            return Err("analyzer: num_workers must be > 0".into());
        }

        Ok(Self { client, num_workers })
    }

    /// Run the pool until the raw channel closes or the token fires.
    ///
    /// Returns only when every worker has exited (barrier), at which point
    /// the last clone of `tx` drops and the scored channel closes exactly
    /// once.
    pub async fn run(
        &self,
        token: CancellationToken,
        rx: mpsc::Receiver<RawPost>,
        tx: mpsc::Sender<ScoredPost>,
    ) {
        let rx = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(self.num_workers);

        for worker_id in 0..self.num_workers {
            handles.push(tokio::spawn(analyze_worker(
                worker_id,
                self.client.clone(),
                token.clone(),
                rx.clone(),
                tx.clone(),
            )));
        }
        drop(tx);

        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// One analysis worker: dequeue, normalize, score, emit.
///
/// Cancellation is checked between dequeues; an in-flight call to the
/// sentiment collaborator is never interrupted. A single post's failure is
/// logged and dropped without disturbing the rest of the queue.
async fn analyze_worker(
    worker_id: usize,
    client: Arc<dyn SentimentClient>,
    token: CancellationToken,
    rx: Arc<Mutex<mpsc::Receiver<RawPost>>>,
    tx: mpsc::Sender<ScoredPost>,
) {
    loop {
        let post = tokio::select! {
            _ = token.cancelled() => {
                log::debug!("🛑 analysis worker {} stopping: cancelled", worker_id);
                return;
            }
            post = async { rx.lock().await.recv().await } => match post {
                Some(post) => post,
                // Raw channel closed and drained
                None => return,
            },
        };

        let normalized: String = post.text.nfc().collect();

        match client.analyze(&normalized, "en").await {
            Ok(sentiment) => {
                let scored = ScoredPost {
                    post_id: post.post_id,
                    score: sentiment.score,
                    magnitude: sentiment.magnitude,
                    topic: post.topic,
                };

                if tx.send(scored).await.is_err() {
                    // Aggregator gone; no point continuing
                    return;
                }
            }
            Err(e) => {
                log::warn!(
                    "⚠️  analysis failed (topic: '{}', post: {}): {}",
                    post.topic.topic,
                    post.post_id,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicSpec;
    use std::sync::Mutex as StdMutex;

    fn raw_post(post_id: i64, text: &str) -> RawPost {
        RawPost {
            topic: Arc::new(TopicSpec {
                topic: "Bitcoin".to_string(),
                query: "#bitcoin".to_string(),
            }),
            post_id,
            is_repost: false,
            text: text.to_string(),
        }
    }

    /// Records every text it receives and returns a fixed score.
    struct RecordingSentimentClient {
        received: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl SentimentClient for RecordingSentimentClient {
        async fn analyze(
            &self,
            text: &str,
            _language: &str,
        ) -> Result<SentimentScore, Box<dyn std::error::Error + Send + Sync>> {
            self.received.lock().unwrap().push(text.to_string());
            Ok(SentimentScore {
                score: 0.5,
                magnitude: 1.0,
            })
        }
    }

    /// Fails for texts containing a marker, succeeds otherwise.
    struct FlakySentimentClient;

    #[async_trait]
    impl SentimentClient for FlakySentimentClient {
        async fn analyze(
            &self,
            text: &str,
            _language: &str,
        ) -> Result<SentimentScore, Box<dyn std::error::Error + Send + Sync>> {
            if text.contains("poison") {
                return Err("sentiment service rejected document".into());
            }
            Ok(SentimentScore {
                score: -0.2,
                magnitude: 0.4,
            })
        }
    }

    async fn run_pool(
        client: Arc<dyn SentimentClient>,
        workers: usize,
        posts: Vec<RawPost>,
    ) -> Vec<ScoredPost> {
        let analyzer = Analyzer::new(client, workers).unwrap();

        let (raw_tx, raw_rx) = mpsc::channel(100);
        let (scored_tx, mut scored_rx) = mpsc::channel(100);

        for post in posts {
            raw_tx.send(post).await.unwrap();
        }
        drop(raw_tx);

        analyzer.run(CancellationToken::new(), raw_rx, scored_tx).await;

        let mut scored = Vec::new();
        while let Some(post) = scored_rx.recv().await {
            scored.push(post);
        }
        scored
    }

    #[tokio::test]
    async fn test_pool_scores_all_posts_and_closes_output() {
        let client = Arc::new(RecordingSentimentClient {
            received: StdMutex::new(Vec::new()),
        });

        let posts: Vec<_> = (1..=20).map(|i| raw_post(i, "great day")).collect();
        let scored = run_pool(client, 4, posts).await;

        assert_eq!(scored.len(), 20);
        assert!(scored.iter().all(|s| (s.score - 0.5).abs() < f32::EPSILON));

        let mut ids: Vec<_> = scored.iter().map(|s| s.post_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_text_is_nfc_normalized_before_submission() {
        let client = Arc::new(RecordingSentimentClient {
            received: StdMutex::new(Vec::new()),
        });

        // "é" as 'e' + combining acute accent (NFD form)
        let decomposed = "caf\u{0065}\u{0301}";
        let composed = "caf\u{00e9}";

        run_pool(client.clone(), 1, vec![raw_post(1, decomposed)]).await;

        let received = client.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], composed);
    }

    #[tokio::test]
    async fn test_single_failure_drops_item_but_pool_continues() {
        let posts = vec![
            raw_post(1, "fine"),
            raw_post(2, "poison document"),
            raw_post(3, "also fine"),
        ];

        let scored = run_pool(Arc::new(FlakySentimentClient), 2, posts).await;

        let mut ids: Vec<_> = scored.iter().map(|s| s.post_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_workers() {
        let client = Arc::new(RecordingSentimentClient {
            received: StdMutex::new(Vec::new()),
        });
        let analyzer = Analyzer::new(client, 3).unwrap();

        let (raw_tx, raw_rx) = mpsc::channel::<RawPost>(10);
        let (scored_tx, mut scored_rx) = mpsc::channel(10);

        let token = CancellationToken::new();
        token.cancel();

        // Keep the raw channel open: only cancellation can stop the pool
        analyzer.run(token, raw_rx, scored_tx).await;
        drop(raw_tx);

        assert!(scored_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_constructor_rejects_zero_workers() {
        let client: Arc<dyn SentimentClient> = Arc::new(FlakySentimentClient);
        assert!(Analyzer::new(client, 0).is_err());
    }
}
