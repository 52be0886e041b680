//! 📦 Common data structures — the building blocks of temblor
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. SEISMIC MONITORING STATION — 3:47 AM
//!
//! 🌩️  The needle on the drum plotter twitches. Somewhere under the Pacific,
//! two tectonic plates have a disagreement about personal space. Eleven
//! minutes later, a JSON document describing that disagreement arrives at
//! our doorstep, slightly damp and missing half its fields.
//!
//! A senior engineer squints at the payload. They were supposed to be asleep.
//! Their coffee is cold. The plates do not care. The plates have never cared.
//!
//! ✅ And then — a `SeismicEvent` is minted. Quietly. Carrying its epicenter
//! coordinates like a responsible adult carrying groceries in one trip (ALL
//! of them, no second trips, this is a point of honor). It knows where it
//! happened. It knows when. It does not know why. Neither do we. Geology is
//! complicated.
//!
//! 🦆
//!
//! This module defines the humble yet load-bearing structs that ferry quake
//! data from the upstream catalog to the store and out through the query
//! engine. They don't ask questions. They carry the data. They are the
//! postal workers of this codebase. Please tip your postal workers.
//!
//! ---
//!
//! ⚠️  NOTE: When the singularity occurs, these structs will still be exactly
//! this shape. The AGI will find the field names quaint. The AGI can file a PR.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 🕐 The time source the core consumes instead of calling `Utc::now()`
/// wherever it feels like it.
///
/// Every `ingested_at` stamp and every fetch window bound flows through one
/// of these. Tests hand in a frozen clock and suddenly time is deterministic,
/// which is more than can be said for time in general.
///
/// Ancient proverb: "He who calls `Utc::now()` in the merge path, flakes in CI."
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// ⏰ What time is it? The only question this trait is qualified to answer.
    fn now(&self) -> DateTime<Utc>;
}

/// 🕐 The production clock. It asks the operating system. The operating
/// system asks NTP. NTP asks an atomic clock. Turtles, but synchronized ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 🌍 A normalized seismic event — validated, canonical, and not yet stored.
///
/// This is what the normalizer hands to the store: every required field
/// present and sane, zero `Option`s among the required set, and crucially
/// NO `ingested_at`. That stamp belongs to the store, assigned at first
/// persistence and never again. The normalizer stays deterministic; the
/// store handles the one non-deterministic field. Division of labor. 🎯
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// 🏷️ The upstream catalog's id for this event. Globally unique.
    /// Immutable. The one true dedup key. Guard it with your life.
    pub external_id: String,
    /// 📍 Epicenter latitude, degrees, in [-90, 90].
    pub latitude: f64,
    /// 📍 Epicenter longitude, degrees, in [-180, 180]. Zero is the Greenwich
    /// meridian, not "missing". Ships sink over this distinction.
    pub longitude: f64,
    /// 📏 Hypocenter depth in kilometers, >= 0. Zero means "at the surface",
    /// which is a perfectly legal (and deeply alarming) place for a quake.
    pub depth_km: f64,
    /// 📊 Magnitude on one monotonic scale. Comparable. Sortable. Scary above 7.
    pub magnitude: f64,
    /// ⏰ When the ground actually moved, UTC.
    pub occurred_at: DateTime<Utc>,
    /// 📝 Free-text location blurb ("42km SSW of somewhere, Alaska"). Optional.
    pub description: Option<String>,
    /// 🔗 Link back to the catalog's detail page. Optional.
    pub source_url: Option<String>,
}

/// 🌋 A stored seismic event — a [`NormalizedEvent`] that made it into the
/// store and picked up its `ingested_at` badge at the door.
///
/// Mutable-field updates overwrite everything except `external_id` (identity)
/// and `ingested_at` (history). The serde derives double as the journal
/// format and the outbound API shape, which keeps the two from drifting
/// apart like every hand-rolled mapping layer eventually does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    pub external_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub occurred_at: DateTime<Utc>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    /// 🗃️ UTC instant of first successful persistence. Set once, on create.
    /// Never overwritten. Not on update. Not on replay. Not for you, either.
    pub ingested_at: DateTime<Utc>,
}

impl SeismicEvent {
    /// 🏗️ Mint a stored event from a normalized one. This is the ONLY place
    /// `ingested_at` gets assigned. The store calls it on `Created`.
    pub(crate) fn from_normalized(record: NormalizedEvent, ingested_at: DateTime<Utc>) -> Self {
        Self {
            external_id: record.external_id,
            latitude: record.latitude,
            longitude: record.longitude,
            depth_km: record.depth_km,
            magnitude: record.magnitude,
            occurred_at: record.occurred_at,
            description: record.description,
            source_url: record.source_url,
            ingested_at,
        }
    }

    /// 🔄 Last-writer-wins on the mutable fields. `external_id` is identity
    /// and `ingested_at` is history — both stay put while everything else
    /// gets bulldozed by the newer record. The catalog revises magnitudes
    /// for days after a big event, so "newer wins" is the correct policy,
    /// not just the lazy one. (It is also the lazy one. Win-win.)
    pub(crate) fn overwrite_mutable(&mut self, record: NormalizedEvent) {
        self.latitude = record.latitude;
        self.longitude = record.longitude;
        self.depth_km = record.depth_km;
        self.magnitude = record.magnitude;
        self.occurred_at = record.occurred_at;
        self.description = record.description;
        self.source_url = record.source_url;
    }
}

/// 🪟 One ingestion cycle's marching orders: a UTC time range plus the
/// magnitude floor below which the catalog keeps its rumbles to itself.
///
/// Ephemeral by design — derived fresh each cycle from the persisted
/// [`Checkpoint`], never trusted to process memory. A crashed process
/// recomputes the exact same window on restart and carries on like nothing
/// happened. (Something happened. We don't talk about it.)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 📊 Minimum magnitude the catalog should bother reporting.
    pub min_magnitude: f64,
}

/// 📌 The persisted "we got this far" marker.
///
/// `window_end` is the end bound of the last cycle that fully succeeded —
/// the next window starts exactly there. Failed cycles do NOT advance this,
/// so their span gets re-fetched next time and idempotent upserts absorb
/// the overlap. No backlog queue. No drama. Just a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 🪟 End bound of the last successful window. The next cycle resumes here.
    pub window_end: DateTime<Utc>,
    /// ⏰ When that cycle wrapped up. Observability, not control flow.
    pub completed_at: DateTime<Utc>,
}

/// 🎲 What an upsert did: minted a new row or steamrolled an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    /// ✨ First sighting of this `external_id`. `ingested_at` was stamped.
    Created,
    /// 🔄 Seen it before. Mutable fields overwritten, `ingested_at` untouched.
    Updated,
}

/// 🏁 How a cycle ended. There are two kinds of cycles: the ones that
/// succeeded, and the ones with a story to tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// ✅ Fetch landed, records processed, checkpoint advanced.
    /// Rejected records do NOT spoil this — a bad record is a statistic,
    /// not a failure.
    Succeeded,
    /// 💀 The catalog defeated us this round — transient errors past the
    /// retry cap, or a payload so mangled serde refused to dignify it.
    /// The next cycle proceeds on its normal schedule, unbothered.
    Failed { reason: String },
}

/// 📊 The per-cycle scorecard — every count an on-call human asks for at
/// 3 AM, aggregated once per window and shipped to whoever's watching.
///
/// Record-level sadness (rejects) lives ONLY here and in warn logs. It never
/// propagates as an error, because one mangled record aborting a 400-record
/// batch is how you end up with a pager duty horror story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// 🪟 The window this cycle covered.
    pub window: FetchWindow,
    /// 📥 Raw records the catalog handed over.
    pub records_seen: u64,
    /// ✅ Records that survived normalization.
    pub records_accepted: u64,
    /// 🗑️ Records the normalizer bounced. Counted, logged, not mourned.
    pub records_rejected: u64,
    /// ✨ Upserts that minted a new event.
    pub records_created: u64,
    /// 🔄 Upserts that refreshed an existing event.
    pub records_updated: u64,
    /// 🔁 Fetch attempts spent (1 = first try worked, like in the brochure).
    pub attempts: u32,
    /// 🏁 The verdict.
    pub outcome: CycleOutcome,
}

impl CycleSummary {
    /// ✅ Did this cycle advance the checkpoint?
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Succeeded)
    }
}

/// 📡 The ingestion-status snapshot the outbound surface serves: the latest
/// cycle's scorecard plus the last place we successfully bookmarked.
/// Both `Option` because a freshly booted process has done neither yet —
/// and unlike the original system, we admit that instead of serving zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionStatus {
    pub last_cycle_summary: Option<CycleSummary>,
    pub last_success_checkpoint: Option<Checkpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn normalized(id: &str, magnitude: f64) -> NormalizedEvent {
        NormalizedEvent {
            external_id: id.to_string(),
            latitude: 38.32,
            longitude: 142.37,
            depth_km: 29.0,
            magnitude,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 11, 5, 46, 24).unwrap(),
            description: Some("off the coast of somewhere".to_string()),
            source_url: None,
        }
    }

    #[test]
    fn the_one_where_ingested_at_survives_the_bulldozer() {
        let first_seen = Utc.with_ymd_and_hms(2024, 3, 11, 6, 0, 0).unwrap();
        let mut stored = SeismicEvent::from_normalized(normalized("us1234", 8.9), first_seen);

        // 🔄 the catalog revised the magnitude downward, as it does
        stored.overwrite_mutable(normalized("us1234", 9.1));

        assert_eq!(stored.magnitude, 9.1);
        assert_eq!(
            stored.ingested_at, first_seen,
            "💀 ingested_at moved on update. History has been rewritten. Orwell warned us."
        );
        assert_eq!(stored.external_id, "us1234");
    }

    #[test]
    fn the_one_where_a_failed_cycle_knows_it_failed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let summary = CycleSummary {
            window: FetchWindow { start: now, end: now, min_magnitude: 4.5 },
            records_seen: 0,
            records_accepted: 0,
            records_rejected: 0,
            records_created: 0,
            records_updated: 0,
            attempts: 3,
            outcome: CycleOutcome::Failed { reason: "the catalog ghosted us".to_string() },
        };
        assert!(!summary.succeeded());
    }
}
