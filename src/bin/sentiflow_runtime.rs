//! Sentiflow Runtime
//!
//! This binary wires the whole daemon together:
//! - Opens the SQLite store (schema created idempotently)
//! - Builds the HTTP clients for the search and sentiment services
//! - Spawns the run scheduler (immediate first run, then one per interval)
//! - Serves the read API
//! - Shuts down cooperatively on CTRL+C
//!
//! Usage:
//!   cargo run --release --bin sentiflow_runtime
//!
//! Environment variables (see `config::Config::from_env` for the full list):
//!   SENTIFLOW_ADDRESS - API listen address (default: 0.0.0.0:8080)
//!   SENTIFLOW_DB_PATH - SQLite database path (default: sentiflow.db)
//!   SENTIFLOW_TOPICS_CONFIG - Topics TOML file (default: ./topics.toml)
//!   SENTIFLOW_RUN_INTERVAL_SECS - Run interval (default: 600)

use dotenv::dotenv;
use log::{error, info};
use sentiflow::api::{self, ApiState};
use sentiflow::clients::{HttpSearchClient, HttpSentimentClient};
use sentiflow::config::{load_topics, Config};
use sentiflow::pipeline::{Aggregator, Analyzer, Runner, Searcher};
use sentiflow::store::{SentimentStore, SqliteSentimentStore};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    info!("🚀 Sentiflow Runtime");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Topics file: {}", config.topics_path);
    info!("   ├─ Run interval: {}s", config.run_interval_secs);
    info!("   ├─ Min results per topic: {}", config.min_results);
    info!("   ├─ Max post age: {}s", config.max_post_age_secs);
    info!("   ├─ Analysis workers: {}", config.analysis_workers);
    info!("   └─ Listening on: {}", config.listen_address);

    // Topic definitions are validated before any work is scheduled
    let topics = load_topics(&config.topics_path)?;
    info!("✅ Loaded {} topics", topics.len());

    // Datastore
    let store: Arc<dyn SentimentStore> = Arc::new(SqliteSentimentStore::new(&config.db_path)?);

    // Collaborator clients
    let search_client = Arc::new(HttpSearchClient::new(&config.search_url)?);
    let sentiment_client = Arc::new(HttpSentimentClient::new(&config.sentiment_url)?);

    // Pipeline stages
    let searcher = Searcher::new(
        topics,
        config.min_results,
        chrono::Duration::seconds(config.max_post_age_secs as i64),
        search_client,
        store.clone(),
    )?;
    let analyzer = Analyzer::new(sentiment_client, config.analysis_workers)?;
    let aggregator = Aggregator::new(store.clone());

    let runner = Arc::new(Runner::new(
        searcher,
        analyzer,
        aggregator,
        Duration::from_secs(config.run_interval_secs),
        config.channel_buffer,
    ));

    // One root token; scheduler and API both observe it
    let token = CancellationToken::new();

    let scheduler_runner = runner.clone();
    let scheduler_token = token.clone();
    let scheduler = tokio::spawn(async move {
        scheduler_runner.run_scheduler(scheduler_token).await;
    });

    let api_state = ApiState {
        store,
        hostname: config.hostname.clone(),
    };
    let api_token = token.clone();
    let listen_address = config.listen_address.clone();
    let api_server = tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, &listen_address, api_token).await {
            error!("❌ API server failed: {}", e);
        }
    });

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    // Cooperative shutdown: stages stop at their next token check
    token.cancel();

    let _ = scheduler.await;
    let _ = api_server.await;

    info!("✅ Sentiflow runtime stopped");
    Ok(())
}
