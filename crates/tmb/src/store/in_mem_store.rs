//! # Previously, on Temblor...
//!
//! 🎬 The events were homeless. Fresh off the normalizer, validated, canonical,
//! and with absolutely nowhere to be deduplicated. Someone had to take them in.
//! Someone with a sharded concurrent map and no fear of commitment.
//!
//! That someone was this module.
//!
//! `InMemoryStore` is the RAM-resident [`EventStore`]: a DashMap keyed by
//! `external_id`, which buys exactly the concurrency contract the store
//! promises — per-key writer serialization via the entry API, readers that
//! never queue behind writers on other keys, and zero global locks having
//! a main-character moment.
//!
//! 🦆
//!
//! ⚠️ RAM means RAM: this backend forgets everything on restart, checkpoint
//! included. Perfect for tests and local runs. For actual durability, the
//! file store wraps one of these and writes the receipts to disk.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use crate::common::{Checkpoint, NormalizedEvent, SeismicEvent, UpsertOutcome};
use crate::store::{EventStore, default_order};

/// 🗃️ The in-memory event vault.
///
/// 🔒 Concurrency model, for the record (pun intended):
/// - `events`: DashMap. The entry API takes a shard write lock for the one
///   key being upserted — two writers on the same id serialize, writers on
///   different ids (almost always different shards) don't even wave at each
///   other, and readers on other keys sail straight through.
/// - `checkpoint`: one tiny RwLock, touched once per cycle. It could be a
///   semaphore, a channel, or an interpretive dance; it's a RwLock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    events: DashMap<String, SeismicEvent>,
    checkpoint: RwLock<Option<Checkpoint>>,
}

impl InMemoryStore {
    /// 🚀 An empty vault, full of potential, unmarred by tectonics.
    /// This is the most hopeful a store will ever be. Downhill from here.
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔄 The merge itself — the explicit per-key compare-and-swap the whole
    /// store is built around. Returns the outcome AND the post-merge state,
    /// because the file store journals exactly what the map now holds.
    ///
    /// `Created`: mint with `ingested_at = now`. `Updated`: bulldoze the
    /// mutable fields, leave `ingested_at` alone. The entry guard makes the
    /// read-modify-write atomic per key — no lost updates, no
    /// `UpsertConflict` ever escaping to a caller.
    pub(crate) fn apply(
        &self,
        record: NormalizedEvent,
        now: DateTime<Utc>,
    ) -> (UpsertOutcome, SeismicEvent) {
        match self.events.entry(record.external_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let stored = occupied.get_mut();
                stored.overwrite_mutable(record);
                (UpsertOutcome::Updated, stored.clone())
            }
            Entry::Vacant(vacant) => {
                let event = SeismicEvent::from_normalized(record, now);
                vacant.insert(event.clone());
                (UpsertOutcome::Created, event)
            }
        }
    }

    /// 📼 Replay path for the file store: insert a journaled event verbatim,
    /// `ingested_at` and all. Later journal lines for the same id overwrite
    /// earlier ones — the journal is append-only, the map keeps the finale.
    pub(crate) fn insert_replayed(&self, event: SeismicEvent) {
        self.events.insert(event.external_id.clone(), event);
    }

    /// 🗑️ Raw eviction, no journaling — the file store appends its own
    /// tombstone around this.
    pub(crate) fn evict(&self, external_id: &str) -> Option<SeismicEvent> {
        self.events.remove(external_id).map(|(_, event)| event)
    }

    /// 📏 How many distinct events live here. Compaction math needs this.
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    /// 📼 Checkpoint replay for the file store's open path.
    pub(crate) async fn set_checkpoint(&self, checkpoint: Option<Checkpoint>) {
        *self.checkpoint.write().await = checkpoint;
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn upsert(&self, record: NormalizedEvent, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        // ✅ nothing to flush, nothing to fsync, nothing to regret
        let (outcome, _merged) = self.apply(record, now);
        Ok(outcome)
    }

    async fn get(&self, external_id: &str) -> Option<SeismicEvent> {
        self.events.get(external_id).map(|entry| entry.value().clone())
    }

    async fn scan(&self) -> Vec<SeismicEvent> {
        // 📜 clone-out snapshot, then sort. Queries get a stable view and the
        // map's shard locks are held for exactly one clone each — an
        // in-flight ingestion cycle never waits on a slow reader.
        let mut events: Vec<SeismicEvent> =
            self.events.iter().map(|entry| entry.value().clone()).collect();
        default_order(&mut events);
        events
    }

    async fn remove(&self, external_id: &str) -> Result<Option<SeismicEvent>> {
        Ok(self.evict(external_id))
    }

    async fn load_checkpoint(&self) -> Option<Checkpoint> {
        *self.checkpoint.read().await
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        *self.checkpoint.write().await = Some(checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, magnitude: f64, occurred_ms: i64) -> NormalizedEvent {
        NormalizedEvent {
            external_id: id.to_string(),
            latitude: 35.7,
            longitude: 139.7,
            depth_km: 10.0,
            magnitude,
            occurred_at: DateTime::from_timestamp_millis(occurred_ms).unwrap(),
            description: Some("somewhere tectonic".to_string()),
            source_url: None,
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn the_one_where_the_second_ingestion_changes_nothing_but_bookkeeping() {
        let store = InMemoryStore::new();
        let first = store.upsert(record("us001", 5.5, 1_000), t(100)).await.unwrap();
        assert_eq!(first, UpsertOutcome::Created);

        // 🔄 identical record, later clock — idempotence on trial
        let second = store.upsert(record("us001", 5.5, 1_000), t(200)).await.unwrap();
        assert_eq!(second, UpsertOutcome::Updated);

        let stored = store.get("us001").await.expect("the event checked in and never left");
        assert_eq!(
            stored.ingested_at,
            t(100),
            "💀 ingested_at drifted on replay. The bookkeeping is cooking the books."
        );
        assert_eq!(store.len(), 1, "one id, one event, no clones");
    }

    #[tokio::test]
    async fn the_one_where_newer_data_bulldozes_older_data() {
        let store = InMemoryStore::new();
        store.upsert(record("us002", 6.0, 1_000), t(100)).await.unwrap();
        store.upsert(record("us002", 6.4, 1_000), t(200)).await.unwrap();

        let stored = store.get("us002").await.unwrap();
        assert_eq!(stored.magnitude, 6.4, "last writer wins, as advertised");
        assert_eq!(stored.ingested_at, t(100), "history stays put while data moves");
    }

    #[tokio::test]
    async fn the_one_where_the_default_ordering_holds_the_line() {
        let store = InMemoryStore::new();
        // 📜 deliberately inserted out of order, with a timestamp tie to settle
        store.upsert(record("bbb", 5.0, 2_000), t(1)).await.unwrap();
        store.upsert(record("aaa", 5.0, 2_000), t(1)).await.unwrap();
        store.upsert(record("zzz", 5.0, 9_000), t(1)).await.unwrap();
        store.upsert(record("mmm", 5.0, 1_000), t(1)).await.unwrap();

        let ids: Vec<String> =
            store.scan().await.into_iter().map(|event| event.external_id).collect();
        // freshest first; the 2_000 tie settled alphabetically
        assert_eq!(ids, vec!["zzz", "aaa", "bbb", "mmm"]);
    }

    #[tokio::test]
    async fn the_one_where_every_external_id_is_one_of_a_kind() {
        let store = InMemoryStore::new();
        for round in 0..3 {
            for id in ["q1", "q2", "q3"] {
                store.upsert(record(id, 5.0 + round as f64, 1_000), t(round)).await.unwrap();
            }
        }
        let events = store.scan().await;
        assert_eq!(events.len(), 3);
        let mut ids: Vec<&str> = events.iter().map(|e| e.external_id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3, "💀 duplicate external_ids in the store. The one job.");
    }

    #[tokio::test]
    async fn the_one_where_concurrent_upserts_to_one_key_take_turns() {
        use std::sync::Arc;
        let store = Arc::new(InMemoryStore::new());

        // 🧵 40 tasks, one key. The entry lock referees; exactly one Created.
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.upsert(record("contested", 5.0 + i as f64 * 0.01, 1_000), t(i)).await
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == UpsertOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1, "💀 multiple Created for one key — the referee slept");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_the_checkpoint_is_just_a_bookmark() {
        let store = InMemoryStore::new();
        assert!(store.load_checkpoint().await.is_none());

        let checkpoint = Checkpoint { window_end: t(3_600), completed_at: t(3_605) };
        store.save_checkpoint(checkpoint).await.unwrap();
        assert_eq!(store.load_checkpoint().await, Some(checkpoint));
    }
}
