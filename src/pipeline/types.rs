//! Core pipeline data types
//!
//! Items flowing between the three stages. Topic specs are shared by Arc so
//! every stage sees the same immutable definition without copies.

use crate::config::TopicSpec;
use std::sync::Arc;

/// A post found by the search stage, before sentiment analysis.
///
/// Lives only on the raw-post channel; never persisted.
#[derive(Debug, Clone)]
pub struct RawPost {
    /// The topic whose query matched this post
    pub topic: Arc<TopicSpec>,

    /// The post's identifier in the external service
    pub post_id: i64,

    /// Whether the post is a repost of another post
    pub is_repost: bool,

    /// Post body text as returned by the search service
    pub text: String,
}

/// A post the sentiment service has scored.
#[derive(Debug, Clone)]
pub struct ScoredPost {
    pub post_id: i64,

    /// Overall sentiment in [-1, 1]
    pub score: f32,

    /// Strength of the sentiment, ≥ 0
    pub magnitude: f32,

    pub topic: Arc<TopicSpec>,
}

/// One search hit as the search collaborator reports it.
#[derive(Debug, Clone)]
pub struct FoundPost {
    pub post_id: i64,
    pub text: String,
    /// Creation time as an RFC 3339 string; parsed (and possibly rejected)
    /// by the fetch stage
    pub created_at: String,
    pub is_repost: bool,
}

/// Sentiment service response for one document.
#[derive(Debug, Clone, Copy)]
pub struct SentimentScore {
    pub score: f32,
    pub magnitude: f32,
}
