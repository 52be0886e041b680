//! 🧵 Workers: the backbone of temblor, the unsung heroes, the ones who
//! actually do the work while `run()` takes all the credit in the sprint retro.
//!
//! 🚀 This module is like a factory floor, except instead of hard hats
//! we wear `#[derive(Debug)]` and instead of OSHA violations
//! we have borrow checker violations. 🦆
//!
//! Two employees on the floor:
//! - [`IngestWorker`] runs the scheduler's periodic loop until shutdown.
//! - [`ReportWorker`] drains the summary queue and prints the scoreboard.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use std::sync::Arc;

use anyhow::Result;
use async_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::common::CycleSummary;
use crate::report::render_cycle_table;
use crate::scheduler::Scheduler;

/// 🏗️ A background worker, that does work. duh.
///
/// 🎯 The trait that all workers must implement, like a social contract
/// but enforced by the compiler instead of polite society.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" — Seinfeld, on Rust
pub trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<()>>;
}

/// ⏰ The IngestWorker: owns the scheduler loop for the life of the process.
/// Wakes up, runs a cycle, goes back to waiting. The most punctual employee
/// this codebase will ever have.
#[derive(Debug)]
pub struct IngestWorker {
    scheduler: Arc<Scheduler>,
    shutdown: watch::Receiver<bool>,
}

impl IngestWorker {
    /// 🏗️ Hand it the scheduler and the shutdown line. It needs nothing else
    /// and will accept nothing else.
    pub fn new(scheduler: Arc<Scheduler>, shutdown: watch::Receiver<bool>) -> Self {
        Self { scheduler, shutdown }
    }
}

impl Worker for IngestWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            info!("⏰ IngestWorker clocking in");
            self.scheduler.run(self.shutdown).await?;
            info!("⏰ IngestWorker clocking out");
            Ok(())
        })
    }
}

/// 📊 The ReportWorker: patient, tireless, and deeply unbothered by the
/// chaos happening upstream. It receives scorecards. It prints scorecards.
/// It asks no questions. It is, in many ways, the most emotionally stable
/// part of this entire codebase.
#[derive(Debug)]
pub struct ReportWorker {
    summaries: Receiver<CycleSummary>,
}

impl ReportWorker {
    pub fn new(summaries: Receiver<CycleSummary>) -> Self {
        Self { summaries }
    }
}

impl Worker for ReportWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📊 ReportWorker started draining the summary queue...");
            loop {
                match self.summaries.recv().await {
                    Ok(summary) => {
                        // 🎨 one table per cycle, into the log stream
                        info!("📊 ingestion cycle scorecard:\n{}", render_cycle_table(&summary));
                    }
                    Err(_) => {
                        // Channel is empty and closed — the scheduler is gone
                        debug!("🏁 ReportWorker: queue closed. Shutting down.");
                        return Ok(());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CycleOutcome, FetchWindow};
    use chrono::{TimeZone, Utc};

    fn summary() -> CycleSummary {
        let noon = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        CycleSummary {
            window: FetchWindow { start: noon, end: noon, min_magnitude: 2.5 },
            records_seen: 1,
            records_accepted: 1,
            records_rejected: 0,
            records_created: 1,
            records_updated: 0,
            attempts: 1,
            outcome: CycleOutcome::Succeeded,
        }
    }

    #[tokio::test]
    async fn the_one_where_the_reporter_works_until_the_lights_go_out() {
        let (tx, rx) = async_channel::bounded(4);
        let handle = ReportWorker::new(rx).start();

        tx.send(summary()).await.expect("the queue was open a second ago");
        tx.send(summary()).await.expect("still open");
        drop(tx); // 🏁 lights out

        let outcome = handle.await.expect("the reporter panicked on the job");
        assert!(outcome.is_ok(), "a closed queue is a clean shutdown, not an error");
    }
}
