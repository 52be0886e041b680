//! 🧹 The Normalizer — customs and border control for raw quake records.
//!
//! 🎬 *[a conveyor belt of GeoJSON features rolls toward a single inspection desk]*
//! *[one record has no magnitude. it is sweating.]*
//! *[the inspector does not raise their voice. the inspector has a stamp.]*
//!
//! One raw record in, exactly one of two things out: a canonical
//! [`NormalizedEvent`] with every required field present and sane, or a
//! typed [`RejectReason`] naming the field that sank it. No exceptions-as-
//! control-flow, no half-validated records limping into the store, no
//! batch-wide collateral damage from one bad feature.
//!
//! ⚠️ THE ZERO RULE, carved in stone: `0` is a VALUE. Depth 0 is a surface
//! quake. Longitude 0 is the Greenwich meridian. Epoch time 0 is a very
//! punctual event in 1970. Presence is checked with `Option`, never with
//! truthiness — the system this replaces used a falsy-check and silently
//! dropped perfectly good records at the meridian. We do not speak its name.
//!
//! 🦆 (the duck cleared customs. the duck had all its fields.)

use chrono::{TimeZone, Utc};
use thiserror::Error;

use crate::catalog::RawRecord;
use crate::common::NormalizedEvent;

/// 🗑️ Why a record got bounced. One variant, one stamp: the record was
/// incomplete, and `field` names the first required thing it was missing
/// (or carrying in an unusable state).
///
/// Rejections are per-record verdicts, never errors — they surface only as
/// cycle-summary counts and warn logs. A reject aborting a batch would be
/// like one bad passport shutting down the airport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("record is missing or cannot use required field `{field}`")]
    IncompleteRecord { field: &'static str },
}

/// 🧹 Validate and transform one raw record into canonical form.
///
/// Checks, in order of how often upstream actually flubs them:
/// 1. `external_id` present and non-empty — without it, dedup is a prayer.
/// 2. `magnitude` present and finite — NaN is not a magnitude, it's a mood.
/// 3. a coordinate triple `[longitude, latitude, depth_km]` with lon/lat in
///    range. Negative depth gets clamped to 0: the catalog reports small
///    negative depths for events above the reference ellipsoid, and those
///    are real quakes, not garbage.
/// 4. an epoch-milliseconds event time that chrono will vouch for.
///
/// Deterministic: same input, same output, every time. `ingested_at` is NOT
/// assigned here — that's the store's moment, at persistence, where the one
/// non-deterministic field belongs.
pub fn normalize(raw: &RawRecord) -> Result<NormalizedEvent, RejectReason> {
    // 🏷️ identity first — an event with no id cannot be deduplicated,
    // only duplicated, which is the opposite of the job
    let external_id = match raw.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(RejectReason::IncompleteRecord { field: "external_id" }),
    };

    // 📊 magnitude: present AND finite. A 0.0 sails through — tiny quakes
    // are still quakes. NaN and the infinities are shown the door.
    let magnitude = match raw.properties.mag {
        Some(mag) if mag.is_finite() => mag,
        _ => return Err(RejectReason::IncompleteRecord { field: "magnitude" }),
    };

    // 🗺️ the GeoJSON triple: [lon, lat, depth]. In that order. Always that
    // order. Swapping these once put an Alaskan quake in Antarctica.
    let coords = &raw.geometry.coordinates;
    if coords.len() < 3 {
        return Err(RejectReason::IncompleteRecord { field: "coordinates" });
    }
    let (longitude, latitude, raw_depth) = (coords[0], coords[1], coords[2]);
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(RejectReason::IncompleteRecord { field: "longitude" });
    }
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(RejectReason::IncompleteRecord { field: "latitude" });
    }
    if !raw_depth.is_finite() {
        return Err(RejectReason::IncompleteRecord { field: "depth_km" });
    }
    // 📏 clamp shallow-above-ellipsoid depths to the surface; keep the
    // depth >= 0 invariant without rejecting real data
    let depth_km = raw_depth.max(0.0);

    // ⏰ epoch milliseconds → UTC. `time: 0` is midnight, Jan 1 1970 — a
    // legitimate if suspiciously tidy instant. Out-of-range values (chrono
    // refuses to represent them) count as unusable.
    let occurred_at = match raw.properties.time {
        Some(ms) => match Utc.timestamp_millis_opt(ms).single() {
            Some(instant) => instant,
            None => return Err(RejectReason::IncompleteRecord { field: "occurred_at" }),
        },
        None => return Err(RejectReason::IncompleteRecord { field: "occurred_at" }),
    };

    // ✅ stamped and through. The optional fields ride along as-is.
    Ok(NormalizedEvent {
        external_id,
        latitude,
        longitude,
        depth_km,
        magnitude,
        occurred_at,
        description: raw.properties.place.clone(),
        source_url: raw.properties.url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[test]
    fn the_one_where_a_complete_record_clears_customs() {
        let raw = RawRecord::synthetic("us7000kufc", 6.8, -71.6, -33.0, 50.2, 1_700_000_000_000);
        let event = normalize(&raw).expect("💀 a fully-stocked record got bounced at the desk");
        assert_eq!(event.external_id, "us7000kufc");
        assert_eq!(event.longitude, -71.6);
        assert_eq!(event.latitude, -33.0);
        assert_eq!(event.depth_km, 50.2);
        assert_eq!(event.magnitude, 6.8);
        assert_eq!(
            event.occurred_at,
            DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap()
        );
        assert!(event.description.is_some());
    }

    #[test]
    fn the_one_where_no_magnitude_means_no_entry() {
        let mut raw = RawRecord::synthetic("us7000nomag", 5.0, 10.0, 10.0, 10.0, 1_700_000_000_000);
        raw.properties.mag = None;
        assert_eq!(
            normalize(&raw),
            Err(RejectReason::IncompleteRecord { field: "magnitude" })
        );
    }

    #[test]
    fn the_one_where_zero_is_a_value_not_an_absence() {
        // 📏 surface quake on the Greenwich meridian at the stroke of epoch —
        // statistically improbable, categorically valid
        let raw = RawRecord::synthetic("greenwich0", 0.0, 0.0, 51.4, 0.0, 0);
        let event = normalize(&raw)
            .expect("💀 zero got treated as missing. The falsy-check ghost walks again.");
        assert_eq!(event.longitude, 0.0);
        assert_eq!(event.depth_km, 0.0);
        assert_eq!(event.magnitude, 0.0);
        assert_eq!(event.occurred_at.timestamp_millis(), 0);
    }

    #[test]
    fn the_one_where_the_timestamp_never_showed_up() {
        let mut raw = RawRecord::synthetic("us7000notime", 5.0, 10.0, 10.0, 10.0, 0);
        raw.properties.time = None;
        assert_eq!(
            normalize(&raw),
            Err(RejectReason::IncompleteRecord { field: "occurred_at" })
        );
    }

    #[test]
    fn the_one_where_the_triple_is_a_double() {
        let mut raw = RawRecord::synthetic("us7000flat", 5.0, 10.0, 10.0, 10.0, 1_000);
        raw.geometry.coordinates = vec![10.0, 10.0];
        assert_eq!(
            normalize(&raw),
            Err(RejectReason::IncompleteRecord { field: "coordinates" })
        );
    }

    #[test]
    fn the_one_where_latitude_91_gets_laughed_out() {
        let raw = RawRecord::synthetic("santa1", 5.0, 10.0, 91.0, 10.0, 1_000);
        assert_eq!(
            normalize(&raw),
            Err(RejectReason::IncompleteRecord { field: "latitude" })
        );
    }

    #[test]
    fn the_one_where_nan_magnitude_is_a_mood_not_a_measurement() {
        let mut raw = RawRecord::synthetic("us7000nan", 5.0, 10.0, 10.0, 10.0, 1_000);
        raw.properties.mag = Some(f64::NAN);
        assert_eq!(
            normalize(&raw),
            Err(RejectReason::IncompleteRecord { field: "magnitude" })
        );
    }

    #[test]
    fn the_one_where_a_quake_floats_slightly_above_the_ellipsoid() {
        // 📏 USGS reports depth -1.2 for some shallow events. Clamped, kept.
        let raw = RawRecord::synthetic("us7000float", 4.6, 10.0, 10.0, -1.2, 1_000);
        let event = normalize(&raw).expect("above-ellipsoid events are real events");
        assert_eq!(event.depth_km, 0.0);
    }

    #[test]
    fn the_one_where_normalize_is_boringly_deterministic() {
        let raw = RawRecord::synthetic("us7000same", 6.1, 142.3, 38.3, 29.0, 1_700_000_000_000);
        let first = normalize(&raw);
        let second = normalize(&raw);
        // 🔄 same input, same output. the only acceptable kind of déjà vu.
        assert_eq!(first, second);
    }
}
