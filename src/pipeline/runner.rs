//! Run orchestration and scheduling
//!
//! Each run wires fresh hand-off channels between the three stages, starts
//! them against one per-run cancellation token, and waits for the stream to
//! drain. The scheduler triggers an immediate first run and then one per
//! interval; ticks that land while a run is still in flight are skipped, so
//! runs never overlap.

use super::aggregate::Aggregator;
use super::analysis::Analyzer;
use super::search::Searcher;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a single run, tracked for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run in flight
    Idle,
    /// All three stages live
    Running,
    /// Fetch finished; analysis and aggregation consuming what remains
    Draining,
}

/// Owns the three pipeline stages and drives scheduled runs.
pub struct Runner {
    searcher: Arc<Searcher>,
    analyzer: Arc<Analyzer>,
    aggregator: Arc<Aggregator>,
    run_interval: Duration,
    channel_buffer: usize,
}

impl Runner {
    pub fn new(
        searcher: Searcher,
        analyzer: Analyzer,
        aggregator: Aggregator,
        run_interval: Duration,
        channel_buffer: usize,
    ) -> Self {
        Self {
            searcher: Arc::new(searcher),
            analyzer: Arc::new(analyzer),
            aggregator: Arc::new(aggregator),
            run_interval,
            channel_buffer: channel_buffer.max(1),
        }
    }

    /// Execute one complete run: fetch → analyze → aggregate.
    ///
    /// Returns the number of summaries persisted. Cancelling `token` stops
    /// the fetch and analysis stages at their next check; whatever already
    /// reached the aggregator's queue is still flushed.
    pub async fn run_once(&self, token: &CancellationToken) -> usize {
        let started = Instant::now();
        let run_token = token.child_token();

        let (raw_tx, raw_rx) = mpsc::channel(self.channel_buffer);
        let (scored_tx, scored_rx) = mpsc::channel(self.channel_buffer);

        log::info!("🔄 run started (phase: {:?})", RunPhase::Running);

        let searcher = self.searcher.clone();
        let fetch_token = run_token.clone();
        let fetch = tokio::spawn(async move {
            searcher.run(fetch_token, raw_tx).await;
        });

        let analyzer = self.analyzer.clone();
        let analysis_token = run_token.clone();
        let analysis = tokio::spawn(async move {
            analyzer.run(analysis_token, raw_rx, scored_tx).await;
        });

        let aggregator = self.aggregator.clone();
        let aggregation = tokio::spawn(async move { aggregator.run(scored_rx).await });

        // Fetch pool drained; its output channel is now closed
        let _ = fetch.await;
        log::debug!("🔄 run draining (phase: {:?})", RunPhase::Draining);

        let _ = analysis.await;
        let saved = aggregation.await.unwrap_or(0);

        log::info!(
            "✅ run finished (phase: {:?}, summaries: {}, duration: {}ms)",
            RunPhase::Idle,
            saved,
            started.elapsed().as_millis()
        );

        saved
    }

    /// Scheduler loop: an immediate first run, then one per interval until
    /// the token fires. A tick that lands mid-run is skipped rather than
    /// queued, so a slow run never stacks a second one behind it.
    pub async fn run_scheduler(&self, token: CancellationToken) {
        let mut timer = interval(self.run_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "⏰ scheduler started (interval: {}s)",
            self.run_interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    log::info!("🛑 scheduler stopping: cancelled");
                    return;
                }
                _ = timer.tick() => {
                    self.run_once(&token).await;
                }
            }
        }
    }
}
