//! ⏰ The Scheduler — ingestion cycles on a metronome, with a memory.
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. MISSION CONTROL — ONE MONITOR, MANY TIMESTAMPS
//!
//! Every N seconds, the same ritual: derive a window from the bookmark,
//! ask the catalog what shook, scrub the answers, file them, advance the
//! bookmark. The catalog is moody — sometimes it times out, sometimes it
//! returns HTML with feelings — so the ritual carries a retry budget and
//! an exponential patience curve.
//!
//! Previously, on Temblor: the checkpoint module swore the window would
//! survive any restart. This module is where that oath gets cashed. A
//! crashed process reboots, reads the bookmark, recomputes the exact same
//! window, and carries on. The overlap from a failed cycle? Re-fetched,
//! re-upserted, absorbed by idempotence. No backlog queue. No drama. 🦆
//!
//! ---
//!
//! # The three commandments of a cycle
//! 1. Exactly ONE cycle in flight, ever. The gate mutex is not decorative.
//! 2. The checkpoint advances ONLY after fetch + persist + checkpoint-write
//!    all land. A failed cycle leaves the bookmark alone.
//! 3. A bad record is a statistic, not a failure. A bad PAYLOAD is a failure,
//!    not a panic. Nothing here is ever a panic.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogBackend, CatalogError};
use crate::common::{
    Checkpoint, Clock, CycleOutcome, CycleSummary, FetchWindow, IngestionStatus, UpsertOutcome,
};
use crate::normalizer::normalize;
use crate::store::{EventStore, StoreBackend};

// ⏰ SchedulerConfig — the knobs of the metronome, living here with the
// scheduler because a config three modules from its consumer is a config
// nobody updates correctly.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// 🔁 Seconds between cycle starts. The heartbeat.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// 🪟 First-run window length: with no checkpoint to resume from, look
    /// back this many seconds from now. After that, the checkpoint rules.
    #[serde(default = "default_fetch_window_secs")]
    pub fetch_window_secs: u64,
    /// 📊 Magnitude floor passed to the catalog. Below this, the planet's
    /// small talk stays upstream.
    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,
    /// 🔁 Total fetch attempts per cycle, first try included. Not "retries".
    /// The off-by-one wars were fought so you wouldn't have to.
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,
    /// ⏳ First backoff pause, milliseconds. Doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// ⏳ Backoff ceiling, milliseconds. Exponential growth meets a wall.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_cycle_interval_secs() -> u64 {
    300
}

fn default_fetch_window_secs() -> u64 {
    3_600
}

fn default_min_magnitude() -> f64 {
    2.5
}

fn default_max_fetch_attempts() -> u32 {
    4
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            fetch_window_secs: default_fetch_window_secs(),
            min_magnitude: default_min_magnitude(),
            max_fetch_attempts: default_max_fetch_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

/// 🎬 Where a cycle currently is in its ritual. Traced at every transition
/// so a stuck cycle confesses its location in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Normalizing,
    Persisting,
    Backoff,
}

fn enter(phase: CyclePhase) {
    debug!(phase = ?phase, "🎬 cycle phase transition");
}

/// ⏳ min(base × 2^attempt, cap), where `attempt` counts completed failures
/// (first retry waits the base). Saturating everywhere — a misconfigured
/// base of u64::MAX should produce a long nap, not an overflow panic.
fn backoff_delay(failed_attempts: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let doubled = base_ms.saturating_mul(1u64.checked_shl(failed_attempts).unwrap_or(u64::MAX));
    Duration::from_millis(doubled.min(cap_ms))
}

/// ⏰ The ingestion scheduler: owns the catalog handle, talks to the store,
/// and publishes a scorecard per cycle on two channels — a queue of
/// [`CycleSummary`]s for the reporter and a watch of [`IngestionStatus`]
/// for anyone who only cares about "the latest".
#[derive(Debug)]
pub struct Scheduler {
    catalog: CatalogBackend,
    store: Arc<StoreBackend>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    summaries: async_channel::Sender<CycleSummary>,
    status: watch::Sender<IngestionStatus>,
    // 🔒 the "exactly one cycle in flight" guarantee, as a lock instead of
    // a comment hoping really hard
    gate: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        catalog: CatalogBackend,
        store: Arc<StoreBackend>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
        summaries: async_channel::Sender<CycleSummary>,
        status: watch::Sender<IngestionStatus>,
    ) -> Self {
        Self { catalog, store, clock, config, summaries, status, gate: Mutex::new(()) }
    }

    /// 🪟 Derive this cycle's marching orders. Start = the persisted
    /// bookmark, or (first run ever) one configured window back from now.
    /// End = now, clamped so a backwards-stepping clock can't produce a
    /// window that ends before it starts. NTP does what NTP does.
    async fn next_window(&self) -> FetchWindow {
        let now = self.clock.now();
        let start = match self.store.load_checkpoint().await {
            Some(checkpoint) => checkpoint.window_end,
            None => now - chrono::Duration::seconds(self.config.fetch_window_secs as i64),
        };
        FetchWindow { start, end: now.max(start), min_magnitude: self.config.min_magnitude }
    }

    /// 📡 Fetch with the retry budget. Transient errors burn attempts and
    /// buy naps; permanent errors and an empty budget end the matter.
    /// Returns the records (or the final error) plus attempts spent.
    async fn fetch_with_retries(
        &self,
        window: &FetchWindow,
    ) -> (Result<Vec<crate::catalog::RawRecord>, CatalogError>, u32) {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            enter(CyclePhase::Fetching);
            match self.catalog.fetch(window).await {
                Ok(records) => return (Ok(records), attempts),
                Err(err) if err.is_transient() && attempts < self.config.max_fetch_attempts => {
                    let delay =
                        backoff_delay(attempts - 1, self.config.backoff_base_ms, self.config.backoff_cap_ms);
                    warn!(
                        attempt = attempts,
                        budget = self.config.max_fetch_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "⏳ catalog flinched ({err}), backing off before the next attempt"
                    );
                    enter(CyclePhase::Backoff);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return (Err(err), attempts),
            }
        }
    }

    /// 🔁 Run exactly one ingestion cycle, start to scorecard.
    ///
    /// Never returns an error: a cycle that goes wrong returns a summary
    /// with `CycleOutcome::Failed` and the bookmark untouched, and the next
    /// cycle proceeds on schedule as if nothing happened. (Something
    /// happened. It's in the logs.)
    pub async fn run_cycle(&self) -> CycleSummary {
        let _in_flight = self.gate.lock().await;
        let window = self.next_window().await;
        debug!(
            start = %window.start,
            end = %window.end,
            min_magnitude = window.min_magnitude,
            "🔁 cycle starting"
        );

        let mut summary = CycleSummary {
            window,
            records_seen: 0,
            records_accepted: 0,
            records_rejected: 0,
            records_created: 0,
            records_updated: 0,
            attempts: 0,
            outcome: CycleOutcome::Succeeded,
        };

        // 📡 fetch
        let (fetched, attempts) = self.fetch_with_retries(&window).await;
        summary.attempts = attempts;
        let raw_records = match fetched {
            Ok(records) => records,
            Err(err) => {
                warn!(attempts, "💀 cycle lost to the catalog: {err}");
                summary.outcome = CycleOutcome::Failed { reason: err.to_string() };
                return self.publish(summary, None).await;
            }
        };
        summary.records_seen = raw_records.len() as u64;

        // 🧹 normalize — per-record verdicts, batch never held hostage
        enter(CyclePhase::Normalizing);
        let mut accepted = Vec::with_capacity(raw_records.len());
        for raw in &raw_records {
            match normalize(raw) {
                Ok(record) => accepted.push(record),
                Err(reason) => {
                    summary.records_rejected += 1;
                    warn!(id = raw.id.as_deref().unwrap_or("<no id>"), "🗑️ record bounced: {reason}");
                }
            }
        }
        summary.records_accepted = accepted.len() as u64;

        // 🗃️ persist — a store that errors here fails the WHOLE cycle, so
        // the un-checkpointed window comes around again and idempotence
        // cleans up whatever half-landed
        enter(CyclePhase::Persisting);
        for record in accepted {
            match self.store.upsert(record, self.clock.now()).await {
                Ok(UpsertOutcome::Created) => summary.records_created += 1,
                Ok(UpsertOutcome::Updated) => summary.records_updated += 1,
                Err(err) => {
                    warn!("💀 store refused an upsert mid-cycle: {err:#}");
                    summary.outcome = CycleOutcome::Failed { reason: format!("store error: {err:#}") };
                    return self.publish(summary, None).await;
                }
            }
        }

        // 📌 advance the bookmark — the last thing that can still fail
        let checkpoint = Checkpoint { window_end: window.end, completed_at: self.clock.now() };
        if let Err(err) = self.store.save_checkpoint(checkpoint).await {
            warn!("💀 checkpoint write failed; the window will be re-fetched: {err:#}");
            summary.outcome = CycleOutcome::Failed { reason: format!("checkpoint error: {err:#}") };
            return self.publish(summary, None).await;
        }

        info!(
            seen = summary.records_seen,
            accepted = summary.records_accepted,
            rejected = summary.records_rejected,
            created = summary.records_created,
            updated = summary.records_updated,
            attempts = summary.attempts,
            "✅ cycle complete, bookmark advanced"
        );
        enter(CyclePhase::Idle);
        self.publish(summary, Some(checkpoint)).await
    }

    /// 📊 Ship the scorecard on both channels and hand it back. The watch
    /// always reflects the latest cycle; the checkpoint field only moves on
    /// success, because a failed cycle has no business updating bookmarks.
    async fn publish(&self, summary: CycleSummary, checkpoint: Option<Checkpoint>) -> CycleSummary {
        self.status.send_modify(|status| {
            status.last_cycle_summary = Some(summary.clone());
            if let Some(checkpoint) = checkpoint {
                status.last_success_checkpoint = Some(checkpoint);
            }
        });
        // 📤 a closed summary queue means the reporter is gone — a shutdown
        // race, not a crisis
        if self.summaries.send(summary.clone()).await.is_err() {
            debug!("📤 summary queue closed; reporter has left the building");
        }
        summary
    }

    /// 🔁 The periodic loop: tick, cycle, repeat, until the shutdown watch
    /// says stop. Shutdown is honored ONLY between cycles — a cycle in
    /// flight always runs to its verdict, because a half-persisted,
    /// un-checkpointed window is exactly the mess this design exists to
    /// avoid leaving behind.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.cycle_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("🛑 shutdown observed between cycles; scheduler standing down");
                        return Ok(());
                    }
                    continue;
                }
            }

            let summary = self.run_cycle().await;
            if !summary.succeeded() {
                debug!("🔁 cycle failed; next one proceeds on schedule regardless");
            }
            if *shutdown.borrow() {
                info!("🛑 shutdown observed at cycle boundary; scheduler standing down");
                return Ok(());
            }
        }
    }
}
