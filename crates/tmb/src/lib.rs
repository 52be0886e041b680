//! 🌋 temblor — a seismic event ingester with a bookmark and a deadline.
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. A TERMINAL — NOW
//!
//! Somewhere, the ground is moving. Somewhere else, a public catalog is
//! writing that down in GeoJSON. And HERE, on a timer, this crate fetches
//! the latest window of quakes, scrubs each record at the normalizer's
//! customs desk, files the survivors into a dedup store keyed by the
//! catalog's own ids, and advances a crash-proof checkpoint so a restart
//! picks up exactly — EXACTLY — where it left off.
//!
//! On top of the store sits a query engine: filters, sorting, honest
//! pagination. Underneath it all, a journal, because RAM has commitment
//! issues. 🦆
//!
//! ---
//!
//! # The tour, module by module
//! - [`catalog`] — the upstream feed: a real HTTP client and a scripted stunt double.
//! - [`normalizer`] — one record in, a canonical event or a typed rejection out.
//! - [`store`] — dedup/upsert persistence plus the checkpoint. RAM or journal-backed.
//! - [`scheduler`] — periodic cycles, bounded backoff, bookmark discipline.
//! - [`query`] — criteria → validated plan → one filter pass → a page that adds up.
//! - [`service`] — the front desk: list, get, status, and the admin eraser.
//! - [`report`] + [`workers`] — the scoreboard and the two background employees.
//! - [`app_config`] — figment-powered TOML + `TMB_*` env, defaults included.
//!
//! Embedders take [`service::EventService`] and wire the pieces themselves;
//! the impatient call [`run`] and get the whole daemon.

pub mod app_config;
pub mod catalog;
pub mod common;
pub mod normalizer;
pub mod query;
pub mod report;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod workers;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

pub use app_config::{AppConfig, StoreConfig, load_config};

use catalog::{CatalogBackend, UsgsCatalog};
use common::{IngestionStatus, SystemClock};
use scheduler::Scheduler;
use service::EventService;
use store::{FileStore, InMemoryStore, StoreBackend};
use workers::{IngestWorker, ReportWorker, Worker};

/// 🚀 Assemble the whole machine from a config and run it until ctrl-c.
///
/// Wiring order matters and is worth narrating once: the store opens first
/// (it may need to replay a journal), the catalog client builds second, the
/// scheduler takes both plus the system clock, and the two workers clock in
/// last. Shutdown is a watch flag the scheduler honors at cycle boundaries —
/// a cycle in flight always finishes its paperwork.
pub async fn run(app_config: AppConfig) -> Result<()> {
    // 🗃️ store first — a journal replay failure should stop the show before
    // anything starts fetching
    let store: Arc<StoreBackend> = match app_config.store {
        StoreConfig::InMemory => {
            info!("🗃️ in-memory store selected; nothing will survive a restart, as requested");
            Arc::new(StoreBackend::InMemory(InMemoryStore::new()))
        }
        StoreConfig::File(file_config) => Arc::new(StoreBackend::File(
            FileStore::open(file_config)
                .await
                .context("💀 Could not open the journal-backed store. No store, no show.")?,
        )),
    };

    // 📡 the real catalog client
    let catalog = CatalogBackend::Usgs(UsgsCatalog::new(app_config.catalog)?);

    // 📤 the two observability channels: a queue of scorecards for the
    // reporter, a watch of "latest status" for the front desk
    let (summary_tx, summary_rx) =
        async_channel::bounded(app_config.runtime.summary_queue_capacity);
    let (status_tx, status_rx) = watch::channel(IngestionStatus::default());

    let scheduler = Arc::new(Scheduler::new(
        catalog,
        Arc::clone(&store),
        Arc::new(SystemClock),
        app_config.scheduler,
        summary_tx,
        status_tx,
    ));
    let service = EventService::new(Arc::clone(&store), app_config.query, status_rx);

    // 🧵 clock the workers in
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest_handle = IngestWorker::new(Arc::clone(&scheduler), shutdown_rx).start();
    let report_handle = ReportWorker::new(summary_rx).start();
    info!("🚀 temblor is up: ingesting on schedule, ctrl-c to stand down");

    // 🛑 wait for the operator to say when
    tokio::signal::ctrl_c()
        .await
        .context("💀 Failed to listen for ctrl-c. The OS is screening our calls.")?;
    info!("🛑 ctrl-c received; finishing the current cycle and standing down");
    // send fails only if every receiver is gone, i.e. the worker already left
    let _ = shutdown_tx.send(true);

    ingest_handle
        .await
        .context("💀 The ingest worker vanished without filing its resignation.")?
        .context("💀 The ingest worker resigned WITH an error. Exit interview attached.")?;

    // 📤 dropping the scheduler releases the last summary sender, which
    // closes the queue, which sends the reporter home
    drop(scheduler);
    report_handle
        .await
        .context("💀 The report worker vanished mid-sentence.")??;

    // 📊 one last status line for the operator's scrollback
    let status = service.ingestion_status();
    match status.last_success_checkpoint {
        Some(checkpoint) => info!(
            window_end = %checkpoint.window_end,
            "✅ temblor stood down cleanly; the bookmark is safe on disk"
        ),
        None => info!("✅ temblor stood down; no cycle succeeded this run, bookmark unchanged"),
    }
    Ok(())
}
