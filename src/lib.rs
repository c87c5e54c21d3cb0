//! # sentiflow
//!
//! A daemon that periodically searches a microblog service for posts
//! matching configured topics, scores each post with an external sentiment
//! service, and folds the scores into per-topic running statistics (mean,
//! sample variance, count, checkpoint). One summary record per topic is
//! appended to SQLite per run; a small HTTP API serves the stored history.
//!
//! ## Module Organization
//!
//! - `pipeline` - The three-stage fetch → analyze → aggregate pipeline
//! - `store` - Persistence trait and the SQLite adapter
//! - `clients` - HTTP adapters for the search and sentiment services
//! - `api` - Read-only HTTP API over stored summaries
//! - `config` - Environment configuration and the TOML topics file
//! - `slug` - URL-safe slug derivation and validation

pub mod api;
pub mod clients;
pub mod config;
pub mod pipeline;
pub mod slug;
pub mod store;

pub use config::{Config, TopicSpec};
pub use store::{SentimentRecord, SentimentStore, StoreError};
