//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The disk was quiet. Too quiet. A lone process had been tasked with keeping
//! quake records alive across restarts — just persistence, they said. Simple,
//! they said. Then the process died mid-write, the last journal line ended in
//! an ellipsis, and somewhere a checkpoint pointed at a window that never
//! finished.
//!
//! This module is the durable [`EventStore`]: an [`InMemoryStore`] for reads
//! (queries never touch disk) with every merge receipted to an append-only
//! NDJSON journal, plus a checkpoint file written tmp-then-rename so a crash
//! leaves either the old bookmark or the new one — never half of each.
//!
//! 🚰 upsert → merge in RAM → one JSON line to the journal → fsync-ish flush
//! 📼 restart → replay journal (last line per id wins) → compact if bloated
//! 💀 disk full → your problem now, but at least the error message is artisanal
//! 🦆 (mandatory, no notes)
//!
//! # Crash-safety, the honest version
//! A torn final line (process died mid-append) is detected at replay, warned
//! about, and skipped — the event it described is also the event whose cycle
//! never checkpointed, so the next window re-fetches it. Idempotent upserts
//! make the replay boring, which is the highest compliment in persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memchr::memchr_iter;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::common::{Checkpoint, NormalizedEvent, SeismicEvent, UpsertOutcome};
use crate::store::{EventStore, InMemoryStore};

// 📏 below this many journal entries, compaction is not worth the rewrite —
// the file is small enough that nobody cares about the duplicates
const COMPACT_FLOOR: usize = 64;

// 📂 FileStoreConfig — "It's just a file", said no sysadmin ever before the
// disk filled up. Lives here, next to the store that uses it, because configs
// should live near the thing they configure. Socks, feet, etc.
#[derive(Debug, Deserialize, Clone)]
pub struct FileStoreConfig {
    /// 📼 The append-only NDJSON journal. One JSON line per merge receipt.
    #[serde(default = "default_journal_file")]
    pub journal_file: String,
    /// 📌 The checkpoint file. Tiny. JSON. Rewritten whole, via tmp + rename.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
}

fn default_journal_file() -> String {
    "temblor.events.ndjson".to_string()
}

fn default_checkpoint_file() -> String {
    "temblor.checkpoint.json".to_string()
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            journal_file: default_journal_file(),
            checkpoint_file: default_checkpoint_file(),
        }
    }
}

/// 📼 One journal line. Either a post-merge event state or a tombstone from
/// an administrative delete. Replay applies them in file order; the last
/// word per `external_id` stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum JournalEntry {
    Event(SeismicEvent),
    Tombstone { external_id: String },
}

/// 📂 The journal-backed store: RAM in front, receipts behind.
///
/// Every read is served by the inner [`InMemoryStore`] — same per-key
/// concurrency contract, same default ordering, zero disk on the query path.
/// Writes append the POST-merge state, so replay never has to re-run merge
/// logic: the journaled event already carries the correct `ingested_at`
/// from its first persistence, however many updates ago that was.
///
/// 🔒 The append handle lives behind a Mutex: merges parallelize per key,
/// the journal is one file and takes its lines single file. (The pun is
/// load-bearing. Do not remove.)
#[derive(Debug)]
pub struct FileStore {
    mem: InMemoryStore,
    config: FileStoreConfig,
    journal: Mutex<File>,
}

impl FileStore {
    /// 🚀 Open (or create) the store: replay the journal into RAM, load the
    /// checkpoint, compact if the journal has gone full scrapbook, and leave
    /// an append handle ready for new receipts.
    pub async fn open(config: FileStoreConfig) -> Result<Self> {
        let mem = InMemoryStore::new();

        // 📼 replay — absent file means first boot, anything else is real
        let mut replayed_entries = 0usize;
        let mut torn_tail = false;
        match tokio::fs::read(&config.journal_file).await {
            Ok(bytes) => {
                replayed_entries = replay_journal(&bytes, &mem);
                // 🩹 a file that doesn't end in a newline ends in a torn line.
                // Remember that — appending onto it would weld the next
                // (checkpointed!) receipt to the wreckage and lose it at the
                // NEXT replay, which is real data loss, not archaeology.
                torn_tail = bytes.last().is_some_and(|byte| *byte != b'\n');
                debug!(
                    "📼 replayed {} journal entries into {} live events",
                    replayed_entries,
                    mem.len()
                );
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // ✨ first boot. empty vault. the journal begins today.
            }
            Err(err) => {
                return Err(err).context(format!(
                    "💀 The journal at '{}' exists but would not be read. We knocked. We pleaded. We checked permissions. The door remained closed.",
                    config.journal_file
                ));
            }
        }

        // 📌 checkpoint — same deal, absence is a fresh start not a failure
        match tokio::fs::read(&config.checkpoint_file).await {
            Ok(bytes) => {
                let checkpoint: Checkpoint = serde_json::from_slice(&bytes).context(format!(
                    "💀 The checkpoint file '{}' contains something, but that something is not a checkpoint. Refusing to guess where ingestion left off.",
                    config.checkpoint_file
                ))?;
                mem.set_checkpoint(Some(checkpoint)).await;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).context(format!(
                    "💀 Could not read the checkpoint file '{}'. The bookmark may exist. We will never know. Fix the filesystem and try again.",
                    config.checkpoint_file
                ));
            }
        }

        // 🗜️ compaction: when the scrapbook holds twice as many receipts as
        // live events, rewrite it to one line per event. Happens at open,
        // before the append handle exists, so nobody races the rewrite.
        if replayed_entries > COMPACT_FLOOR && replayed_entries > 2 * mem.len() {
            compact_journal(&config, &mem).await?;
            // ✨ the rewrite ends every line properly; no tail left to seal
            torn_tail = false;
            debug!(
                "🗜️ compacted journal: {} entries → {} live events",
                replayed_entries,
                mem.len()
            );
        }

        let mut journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.journal_file)
            .await
            .context(format!(
                "💀 Could not open '{}' for appending. The journal is the whole durability story. No journal, no store, no deal.",
                config.journal_file
            ))?;

        // 🩹 seal the torn line NOW, before any receipt is appended. The
        // half-line stays unreadable (its cycle never checkpointed, the
        // window returns), but everything written after it starts on a
        // fresh line and survives every future replay.
        if torn_tail {
            journal.write_all(b"\n").await.context(format!(
                "💀 Could not seal the torn final line of '{}'. Appending onto it would eat the next event, so we stop here instead.",
                config.journal_file
            ))?;
            journal
                .flush()
                .await
                .context("💀 Flushing the seal newline failed. The tear remains. So do we, at this error.")?;
        }

        Ok(Self { mem, config, journal: Mutex::new(journal) })
    }

    /// 📼 Serialize one entry, append it, flush it. The flush is the
    /// difference between "persisted" and "persisted, narrator: it was not".
    async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .context("💀 An event refused to serialize. This should be impossible. It was not impossible.")?;
        line.push('\n');

        let mut journal = self.journal.lock().await;
        journal.write_all(line.as_bytes()).await.context(format!(
            "💀 The journal at '{}' rejected an append. Disk full? Permissions drift? Either way the receipt did not land, and we are saying so loudly.",
            self.config.journal_file
        ))?;
        journal.flush().await.context("💀 Flush failed — the bytes are in a buffer somewhere, which is a polite way of saying nowhere.")?;
        Ok(())
    }
}

/// 📼 Walk the journal bytes line by line (memchr does the newline hunting)
/// and apply each entry to the in-memory map. Returns how many entries
/// applied. Unparsable lines are warned about and skipped — a torn tail
/// from a mid-append crash is expected archaeology, not a fatal find.
fn replay_journal(bytes: &[u8], mem: &InMemoryStore) -> usize {
    let mut applied = 0usize;
    let mut line_start = 0usize;
    // 🔍 every newline, located at memcpy speeds, plus one synthetic cut at
    // EOF for a final line that never got its newline (see: torn tail)
    for line_end in memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len())) {
        if line_end <= line_start {
            line_start = line_end + 1;
            continue;
        }
        let line = &bytes[line_start..line_end];
        line_start = line_end + 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<JournalEntry>(line) {
            Ok(JournalEntry::Event(event)) => {
                // last line per id wins — the map is the reducer
                mem.insert_replayed(event);
                applied += 1;
            }
            Ok(JournalEntry::Tombstone { external_id }) => {
                mem.evict(&external_id);
                applied += 1;
            }
            Err(err) => {
                // ⚠️ torn or corrupt line. The cycle that wrote it never
                // checkpointed, so the data returns on the next window.
                warn!("⚠️ skipping unreadable journal line ({} bytes): {}", line.len(), err);
            }
        }
    }
    applied
}

/// 🗜️ Rewrite the journal as exactly one line per live event, tmp + rename
/// so a crash mid-compaction leaves the old (bloated but correct) journal.
async fn compact_journal(config: &FileStoreConfig, mem: &InMemoryStore) -> Result<()> {
    let events = mem.scan().await;
    let mut compacted = String::new();
    for event in events {
        compacted.push_str(
            &serde_json::to_string(&JournalEntry::Event(event))
                .context("💀 An event that deserialized fine refused to re-serialize. Escalating to philosophy.")?,
        );
        compacted.push('\n');
    }

    let tmp_path = format!("{}.tmp", config.journal_file);
    tokio::fs::write(&tmp_path, compacted).await.context(format!(
        "💀 Could not write the compacted journal to '{tmp_path}'. The old journal survives, bloated but honest."
    ))?;
    tokio::fs::rename(&tmp_path, &config.journal_file).await.context(
        "💀 The rename at the end of compaction failed. So close. The tmp file is stranded at the altar.",
    )?;
    Ok(())
}

#[async_trait]
impl EventStore for FileStore {
    async fn upsert(&self, record: NormalizedEvent, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        // 🔄 merge in RAM first, then receipt the post-merge state. If the
        // append fails, the cycle reports failure and never checkpoints, so
        // the record comes around again — the invariant that saves us.
        let (outcome, merged) = self.mem.apply(record, now);
        self.append(&JournalEntry::Event(merged)).await?;
        Ok(outcome)
    }

    async fn get(&self, external_id: &str) -> Option<SeismicEvent> {
        self.mem.get(external_id).await
    }

    async fn scan(&self) -> Vec<SeismicEvent> {
        self.mem.scan().await
    }

    async fn remove(&self, external_id: &str) -> Result<Option<SeismicEvent>> {
        let evicted = self.mem.evict(external_id);
        if evicted.is_some() {
            // 🪦 the tombstone makes the delete survive a restart
            self.append(&JournalEntry::Tombstone { external_id: external_id.to_string() }).await?;
        }
        Ok(evicted)
    }

    async fn load_checkpoint(&self) -> Option<Checkpoint> {
        self.mem.load_checkpoint().await
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        self.mem.save_checkpoint(checkpoint).await?;
        // 📌 whole-file rewrite via tmp + rename: the bookmark is either the
        // old one or the new one, never a Frankenstein of both
        let json = serde_json::to_vec(&checkpoint)
            .context("💀 A checkpoint — two timestamps in a trench coat — failed to serialize. Somehow.")?;
        let tmp_path = format!("{}.tmp", self.config.checkpoint_file);
        tokio::fs::write(&tmp_path, json).await.context(format!(
            "💀 Could not write the checkpoint tmp file '{tmp_path}'. The bookmark stays where it was."
        ))?;
        tokio::fs::rename(&tmp_path, &self.config.checkpoint_file)
            .await
            .context("💀 Checkpoint rename failed at the finish line. The old bookmark stands.")?;
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
            latitude: -33.4,
            longitude: -70.6,
            depth_km: 35.0,
            magnitude,
            occurred_at: DateTime::from_timestamp_millis(occurred_ms).unwrap(),
            description: Some("offshore Valparaiso".to_string()),
            source_url: None,
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn config_in(dir: &tempfile::TempDir) -> FileStoreConfig {
        FileStoreConfig {
            journal_file: dir.path().join("events.ndjson").to_string_lossy().into_owned(),
            checkpoint_file: dir.path().join("checkpoint.json").to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn the_one_where_the_process_dies_and_nobody_notices() {
        let dir = tempfile::tempdir().expect("💀 no tempdir, no test, no justice");
        let config = config_in(&dir);

        {
            let store = FileStore::open(config.clone()).await.unwrap();
            store.upsert(record("cl001", 6.9, 5_000), t(100)).await.unwrap();
            store.upsert(record("cl002", 5.1, 9_000), t(101)).await.unwrap();
            store
                .save_checkpoint(Checkpoint { window_end: t(3_600), completed_at: t(3_601) })
                .await
                .unwrap();
            // 💀 store dropped here. simulated `kill -9`, minus the adrenaline.
        }

        let reborn = FileStore::open(config).await.unwrap();
        let events = reborn.scan().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].external_id, "cl002", "freshest quake first, even after a resurrection");
        assert_eq!(
            reborn.get("cl001").await.unwrap().ingested_at,
            t(100),
            "💀 replay re-stamped ingested_at. The journal lied about history."
        );
        assert_eq!(
            reborn.load_checkpoint().await,
            Some(Checkpoint { window_end: t(3_600), completed_at: t(3_601) })
        );
    }

    #[tokio::test]
    async fn the_one_where_updates_survive_but_history_does_not_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        {
            let store = FileStore::open(config.clone()).await.unwrap();
            store.upsert(record("cl003", 6.0, 5_000), t(100)).await.unwrap();
            store.upsert(record("cl003", 6.3, 5_000), t(200)).await.unwrap();
        }

        let reborn = FileStore::open(config).await.unwrap();
        let events = reborn.scan().await;
        assert_eq!(events.len(), 1, "two journal lines, one event — the map is the reducer");
        assert_eq!(events[0].magnitude, 6.3);
        assert_eq!(events[0].ingested_at, t(100));
    }

    #[tokio::test]
    async fn the_one_where_the_scrapbook_gets_decluttered() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        {
            let store = FileStore::open(config.clone()).await.unwrap();
            // 📼 100 receipts for one event — sentimental, but heavy
            for round in 0..100 {
                store.upsert(record("hoarder", 5.0 + round as f64 * 0.01, 1_000), t(round)).await.unwrap();
            }
        }

        // 🗜️ reopen triggers compaction (100 entries >> 2 * 1 live event)
        let _reborn = FileStore::open(config.clone()).await.unwrap();
        let journal = std::fs::read_to_string(&config.journal_file).unwrap();
        let lines = journal.lines().filter(|line| !line.trim().is_empty()).count();
        assert_eq!(lines, 1, "💀 compaction left {lines} lines for one event. Marie Kondo weeps.");
    }

    #[tokio::test]
    async fn the_one_where_a_torn_final_line_is_quietly_buried() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        {
            let store = FileStore::open(config.clone()).await.unwrap();
            store.upsert(record("cl004", 5.5, 7_000), t(100)).await.unwrap();
        }
        // 💀 simulate a crash mid-append: half a JSON line, no newline, no dignity
        {
            use std::io::Write;
            let mut raw = std::fs::OpenOptions::new()
                .append(true)
                .open(&config.journal_file)
                .unwrap();
            raw.write_all(br#"{"Event":{"external_id":"cl005","latitu"#).unwrap();
        }

        let reborn = FileStore::open(config).await.unwrap();
        assert_eq!(reborn.scan().await.len(), 1, "the torn line stays buried");
        assert!(reborn.get("cl004").await.is_some());

        // ✅ and the journal still accepts new receipts after the incident
        reborn.upsert(record("cl006", 4.9, 8_000), t(300)).await.unwrap();
        assert_eq!(reborn.scan().await.len(), 2);
    }

    #[tokio::test]
    async fn the_one_where_the_next_receipt_refuses_to_share_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        {
            let store = FileStore::open(config.clone()).await.unwrap();
            store.upsert(record("cl010", 5.5, 7_000), t(100)).await.unwrap();
        }
        // 💀 crash mid-append: half a receipt, no newline
        {
            use std::io::Write;
            let mut raw = std::fs::OpenOptions::new()
                .append(true)
                .open(&config.journal_file)
                .unwrap();
            raw.write_all(br#"{"Event":{"external_id":"cl011","latitu"#).unwrap();
        }

        // 🔄 first reopen: a full cycle lands an event AND its checkpoint
        {
            let store = FileStore::open(config.clone()).await.unwrap();
            store.upsert(record("cl012", 6.1, 9_000), t(200)).await.unwrap();
            store
                .save_checkpoint(Checkpoint { window_end: t(9_000), completed_at: t(9_001) })
                .await
                .unwrap();
        }

        // 🔄 second reopen: the checkpointed event MUST still exist. If its
        // receipt got welded onto the torn line, the checkpoint says "done"
        // while the store says "never heard of it" — the one lie this
        // design cannot absorb.
        let reborn = FileStore::open(config).await.unwrap();
        assert!(
            reborn.get("cl012").await.is_some(),
            "💀 a checkpointed event vanished across a restart. The torn tail ate its receipt."
        );
        assert!(reborn.get("cl010").await.is_some());
        assert!(reborn.get("cl011").await.is_none(), "the torn half-event stays dead");
        assert_eq!(
            reborn.load_checkpoint().await,
            Some(Checkpoint { window_end: t(9_000), completed_at: t(9_001) })
        );
    }

    #[tokio::test]
    async fn the_one_where_a_tombstone_means_forever() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        {
            let store = FileStore::open(config.clone()).await.unwrap();
            store.upsert(record("cl007", 5.0, 1_000), t(100)).await.unwrap();
            store.upsert(record("cl008", 5.2, 2_000), t(100)).await.unwrap();
            let evicted = store.remove("cl007").await.unwrap();
            assert!(evicted.is_some());
        }

        let reborn = FileStore::open(config).await.unwrap();
        assert!(reborn.get("cl007").await.is_none(), "💀 the deleted came back. Zombie data.");
        assert!(reborn.get("cl008").await.is_some());
    }
}
