//! # Sentiment analysis pipeline
//!
//! Three concurrent stages joined by bounded hand-off channels:
//!
//! ```text
//! topics
//!     ↓
//! [Searcher]   one task per topic, checkpointed backward pagination
//!     ↓ raw-post channel
//! [Analyzer]   N workers sharing one queue, sentiment scoring
//!     ↓ scored-post channel
//! [Aggregator] single consumer, Welford fold per topic
//!     ↓
//! persisted summaries (one record per topic per run)
//! ```
//!
//! The bounded channels double as back-pressure: a slow aggregator throttles
//! analysis, which throttles fetch, so memory stays bounded without an
//! explicit rate limiter. No mutable state crosses task boundaries except
//! through the channels; topic specs travel as immutable `Arc` values.
//!
//! Cancellation is cooperative: the runner hands every stage one per-run
//! token, polled at iteration boundaries (before each page fetch, between
//! dequeues), never mid-call into a collaborator.
//!
//! ## Module Organization
//!
//! - `types` - Items flowing between stages (RawPost, ScoredPost)
//! - `stats` - Welford running mean/variance accumulator
//! - `search` - Fetch worker pool and the `SearchClient` seam
//! - `analysis` - Sentiment worker pool and the `SentimentClient` seam
//! - `aggregate` - Single-consumer aggregation and persistence
//! - `runner` - Per-run wiring and the interval scheduler

pub mod aggregate;
pub mod analysis;
pub mod runner;
pub mod search;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use aggregate::Aggregator;
pub use analysis::{Analyzer, SentimentClient};
pub use runner::{RunPhase, Runner};
pub use search::{SearchClient, Searcher};
pub use stats::{FinalizedStats, RunningAggregate};
pub use types::{FoundPost, RawPost, ScoredPost, SentimentScore};
