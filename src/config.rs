//! Runtime configuration and topic definitions
//!
//! Runtime settings come from environment variables with sensible defaults;
//! the topic list comes from a TOML file so operators can edit subjects
//! without touching the environment.
//!
//! Topics file format:
//!
//! ```toml
//! [[topics]]
//! topic = "Bitcoin"
//! query = "#bitcoin OR $BTC"
//! ```

use serde::Deserialize;
use std::env;
use std::fs;

/// A configured subject of interest with its search expression.
///
/// Immutable once loaded; shared across pipeline stages by Arc.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicSpec {
    /// Human-readable display name, at least 3 code points
    pub topic: String,
    /// Search expression handed to the search collaborator, at least 3
    /// code points
    pub query: String,
}

#[derive(Debug, Deserialize)]
struct TopicsFile {
    topics: Vec<TopicSpec>,
}

/// Configuration for the sentiflow runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address (IP:port) the read API listens on
    pub listen_address: String,

    /// Hostname reported by the API index endpoint
    pub hostname: String,

    /// Path to the SQLite database file
    pub db_path: String,

    /// Path to the TOML file containing topic definitions
    pub topics_path: String,

    /// Minimum qualifying posts to collect per topic per run
    pub min_results: usize,

    /// Maximum post age accepted by the fetch stage, in seconds
    pub max_post_age_secs: u64,

    /// Number of concurrent sentiment analysis workers
    pub analysis_workers: usize,

    /// How often an analysis run starts, in seconds
    pub run_interval_secs: u64,

    /// Capacity of the raw and scored hand-off channels
    pub channel_buffer: usize,

    /// Base URL of the post search service
    pub search_url: String,

    /// Base URL of the sentiment analysis service
    pub sentiment_url: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SENTIFLOW_ADDRESS` (default: 0.0.0.0:8080)
    /// - `SENTIFLOW_HOSTNAME` (default: localhost)
    /// - `SENTIFLOW_DB_PATH` (default: sentiflow.db)
    /// - `SENTIFLOW_TOPICS_CONFIG` (default: ./topics.toml)
    /// - `SENTIFLOW_MIN_RESULTS` (default: 50)
    /// - `SENTIFLOW_MAX_POST_AGE_SECS` (default: 900)
    /// - `SENTIFLOW_ANALYSIS_WORKERS` (default: 10)
    /// - `SENTIFLOW_RUN_INTERVAL_SECS` (default: 600)
    /// - `SENTIFLOW_CHANNEL_BUFFER` (default: 1000)
    /// - `SENTIFLOW_SEARCH_URL` (default: http://localhost:9090)
    /// - `SENTIFLOW_SENTIMENT_URL` (default: http://localhost:9091)
    pub fn from_env() -> Self {
        Self {
            listen_address: env::var("SENTIFLOW_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            hostname: env::var("SENTIFLOW_HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),

            db_path: env::var("SENTIFLOW_DB_PATH").unwrap_or_else(|_| "sentiflow.db".to_string()),

            topics_path: env::var("SENTIFLOW_TOPICS_CONFIG")
                .unwrap_or_else(|_| "./topics.toml".to_string()),

            min_results: env::var("SENTIFLOW_MIN_RESULTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),

            max_post_age_secs: env::var("SENTIFLOW_MAX_POST_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(900),

            analysis_workers: env::var("SENTIFLOW_ANALYSIS_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            run_interval_secs: env::var("SENTIFLOW_RUN_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),

            channel_buffer: env::var("SENTIFLOW_CHANNEL_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            search_url: env::var("SENTIFLOW_SEARCH_URL")
                .unwrap_or_else(|_| "http://localhost:9090".to_string()),

            sentiment_url: env::var("SENTIFLOW_SENTIMENT_URL")
                .unwrap_or_else(|_| "http://localhost:9091".to_string()),
        }
    }
}

/// Load and validate topic definitions from a TOML file.
///
/// Every entry must carry at least 3 code points in both topic and query;
/// validation failures reject the whole file before any work is scheduled.
pub fn load_topics(path: &str) -> Result<Vec<TopicSpec>, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("failed to read topics file {}: {}", path, e))?;

    let parsed: TopicsFile = toml::from_str(&raw)?;
    validate_topics(&parsed.topics)?;

    Ok(parsed.topics)
}

/// Validate a topic list without touching the filesystem.
pub fn validate_topics(topics: &[TopicSpec]) -> Result<(), Box<dyn std::error::Error>> {
    if topics.is_empty() {
        return Err("topics must not be empty".into());
    }

    for spec in topics {
        let topic_len = spec.topic.chars().count();
        if topic_len < 3 {
            return Err(format!(
                "topics must be at least 3 characters long: {:?} is only {}",
                spec.topic, topic_len
            )
            .into());
        }

        let query_len = spec.query.chars().count();
        if query_len < 3 {
            return Err(format!(
                "queries must be at least 3 characters long: {:?} is only {}",
                spec.query, query_len
            )
            .into());
        }
    }

    Ok(())
}
