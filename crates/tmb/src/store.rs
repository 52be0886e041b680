//! 🗃️ Stores — where events go to be deduplicated, persisted, and found again.
//!
//! 🚰 The catalog pours the data, the normalizer scrubs it, and this module
//! is the vault it all lands in. And if the vault loses a record, we panic!
//! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency for persistence. Need a RAM-only
//! store for tests? A journal-backed one that survives a `kill -9`? We've
//! got a backend for that. We have exactly two backends. The DMV has more
//! forms, but ours dedupe.
//!
//! # The contract, carved into the trait
//! - `upsert` is keyed by `external_id` and idempotent: replay the same
//!   normalized record and nothing observable changes except the bookkeeping.
//! - `ingested_at` is stamped on `Created` and NEVER touched on `Updated`.
//! - Writes to one key never block writes or reads on another key.
//! - `scan` hands back the default ordering: `occurred_at` descending, ties
//!   broken by `external_id` ascending, so pagination is deterministic and
//!   two events from the same second stop playing musical chairs.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{Checkpoint, NormalizedEvent, SeismicEvent, UpsertOutcome};

pub(crate) mod file_store;
pub(crate) mod in_mem_store;

// 🎯 Re-export so callers can do `store::FileStoreConfig` instead of
// spelunking into `store::file_store::FileStoreConfig`.
pub use file_store::{FileStore, FileStoreConfig};
pub use in_mem_store::InMemoryStore;

/// 🗃️ The dedup/upsert store: keyed event persistence plus the ingestion
/// checkpoint that lets a restarted process resume the right fetch window.
///
/// The checkpoint lives HERE, alongside the events, and not in some process
/// global — a restart that forgets where it was is a restart that either
/// re-ingests a month or silently skips one. Both have happened to someone.
/// Neither will happen here.
#[async_trait]
pub trait EventStore: std::fmt::Debug + Send + Sync {
    /// 🔄 Insert-or-update keyed by `external_id`. `now` stamps
    /// `ingested_at` if (and only if) this is a `Created`.
    async fn upsert(&self, record: NormalizedEvent, now: DateTime<Utc>) -> Result<UpsertOutcome>;
    /// 🔍 Point lookup by external id.
    async fn get(&self, external_id: &str) -> Option<SeismicEvent>;
    /// 📜 Every stored event, default-ordered. The query engine filters and
    /// re-sorts on top; the store owns the canonical base ordering.
    async fn scan(&self) -> Vec<SeismicEvent>;
    /// 🗑️ Administrative delete — the ingestion path NEVER calls this.
    /// Returns the evicted event, if there was one.
    async fn remove(&self, external_id: &str) -> Result<Option<SeismicEvent>>;
    /// 📌 The last successful cycle's bookmark, if any cycle ever succeeded.
    async fn load_checkpoint(&self) -> Option<Checkpoint>;
    /// 📌 Advance the bookmark. Called only after a cycle fully succeeds.
    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()>;
}

/// 📐 The one true base ordering: freshest quake first, ties settled
/// alphabetically by id so identical timestamps don't shuffle between
/// queries. Two quakes in the same second happen more often than you'd
/// hope — aftershocks travel in packs.
pub(crate) fn default_order(events: &mut [SeismicEvent]) {
    events.sort_by(|a, b| {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| a.external_id.cmp(&b.external_id))
    });
}

/// 🎭 The many faces of a store — a polymorphic casting call for persistence.
///
/// Mirrors the catalog backend enum on the other side of the pipeline.
/// Whoever designed this was clearly a fan of symmetry. Or ran out of ideas.
/// Hard to tell. The scheduler and the query surface stay blissfully
/// ignorant of where events actually live. Ignorance is a feature. It's
/// called "abstraction". We put it in the docs.
#[derive(Debug)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    File(FileStore),
}

#[async_trait]
impl EventStore for StoreBackend {
    async fn upsert(&self, record: NormalizedEvent, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        match self {
            StoreBackend::InMemory(store) => store.upsert(record, now).await,
            StoreBackend::File(store) => store.upsert(record, now).await,
        }
    }

    async fn get(&self, external_id: &str) -> Option<SeismicEvent> {
        match self {
            StoreBackend::InMemory(store) => store.get(external_id).await,
            StoreBackend::File(store) => store.get(external_id).await,
        }
    }

    async fn scan(&self) -> Vec<SeismicEvent> {
        match self {
            StoreBackend::InMemory(store) => store.scan().await,
            StoreBackend::File(store) => store.scan().await,
        }
    }

    async fn remove(&self, external_id: &str) -> Result<Option<SeismicEvent>> {
        match self {
            StoreBackend::InMemory(store) => store.remove(external_id).await,
            StoreBackend::File(store) => store.remove(external_id).await,
        }
    }

    async fn load_checkpoint(&self) -> Option<Checkpoint> {
        match self {
            StoreBackend::InMemory(store) => store.load_checkpoint().await,
            StoreBackend::File(store) => store.load_checkpoint().await,
        }
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.save_checkpoint(checkpoint).await,
            StoreBackend::File(store) => store.save_checkpoint(checkpoint).await,
        }
    }
}
