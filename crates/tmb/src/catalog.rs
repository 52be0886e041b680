//! 📡 Catalogs — where the raw quake data comes from.
//!
//! 🎬 *[camera pans across a government data center]*
//! 🎬 *[a rack server hums the hum of the underfunded]*
//! 🎬 "Somewhere in this building... is a GeoJSON endpoint."
//! 🎬 *[record scratch]* 🦆
//!
//! This module is the casting agency for upstream catalogs. Need the real
//! USGS feed? A scripted in-memory stand-in for tests? We've got a backend
//! for that. The trait is deliberately tiny: one window in, raw records out,
//! and a typed error taxonomy so the scheduler can tell "try again in a bit"
//! from "do not bother until next cycle".
//!
//! ⚠️ Retry policy does NOT live here. A catalog client makes exactly one
//! bounded-timeout request per `fetch` call and reports honestly what
//! happened. Backoff, attempt caps, and the accompanying existential dread
//! are the scheduler's department. Separation of concerns: it's like church
//! and state, but for HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::FetchWindow;

pub(crate) mod scripted;
pub(crate) mod usgs;

// 🎯 Re-export the concrete types so callers can do `catalog::CatalogConfig`
// instead of spelunking into `catalog::usgs::CatalogConfig`.
// Convenience is a feature. So is not typing "catalog::usgs::" fourteen times per file.
pub use scripted::ScriptedCatalog;
pub use usgs::{CatalogConfig, UsgsCatalog};

/// 💀 The three ways a catalog fetch goes wrong, ranked by how much hope
/// remains afterward.
///
/// The split matters: the scheduler retries transient failures with backoff
/// inside the cycle, while a permanent one (`MalformedResponse`) burns the
/// whole attempt — there's no amount of waiting that un-mangles a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// 📡 The network said no, or the server answered with something that
    /// wasn't a 2xx. Includes rate-limit 429s — the catalog's polite way of
    /// saying "you again?". Transient: worth retrying after a breather.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// ⏳ The request blew past its per-call deadline. Also transient.
    /// The data is probably fine. The route to it, less so.
    #[error("catalog request exceeded its {timeout_secs}s deadline")]
    Timeout { timeout_secs: u64 },
    /// 🗑️ We got bytes, the bytes were not the GeoJSON we were promised.
    /// Permanent for this attempt — retrying a parse failure is just
    /// asking the same question louder.
    #[error("catalog returned an unparsable top-level payload: {0}")]
    MalformedResponse(String),
}

impl CatalogError {
    /// 🔁 Should the scheduler bother retrying this within the cycle?
    /// `Unavailable` and `Timeout`: yes, with backoff. `MalformedResponse`:
    /// no — the cycle is marked failed and the next one proceeds on schedule.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Unavailable(_) | CatalogError::Timeout { .. })
    }
}

/// 📥 One unvalidated event record, roughly as the upstream GeoJSON feature
/// delivers it. Every field is optional or defaulted ON PURPOSE: a record
/// missing half its organs must still deserialize, so the normalizer can
/// reject it with a reason instead of the whole batch faceplanting in serde.
///
/// Only the top-level payload shape is load-bearing at parse time.
/// Per-record garbage is a statistic; top-level garbage is a
/// [`CatalogError::MalformedResponse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// 🏷️ The catalog's event id. Absence gets this record bounced later,
    /// politely, by the normalizer. Not here.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: RawProperties,
    #[serde(default)]
    pub geometry: RawGeometry,
}

/// 📋 The `properties` bag of a GeoJSON feature — the fields we care about,
/// everything else falls on the floor and nobody mourns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProperties {
    /// 📊 Magnitude. `Option` because upstream sometimes just... doesn't.
    #[serde(default)]
    pub mag: Option<f64>,
    /// 📝 Human-readable place blurb.
    #[serde(default)]
    pub place: Option<String>,
    /// ⏰ Event time as epoch MILLIseconds. Milli. Not seconds. Not micros.
    /// An entire generation of off-by-1000x bugs lives in this field.
    #[serde(default)]
    pub time: Option<i64>,
    /// 🔗 Detail-page URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// 🗺️ The `geometry` bag. Coordinates arrive as `[longitude, latitude,
/// depth_km]` — in THAT order, because GeoJSON enjoys watching map
/// developers suffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGeometry {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// 📦 The top-level catalog payload. `features` is NOT defaulted: if the
/// response has no feature array, the payload is malformed and the whole
/// fetch attempt says so. This is the one place we're strict on parse.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatalogPayload {
    pub(crate) features: Vec<RawRecord>,
}

/// 📡 A catalog that vends raw event records for a time window.
///
/// Implement this trait and you too can be the origin of someone else's
/// data problems. Guaranteed to dispense only the finest free-range,
/// artisanal, possibly-incomplete GeoJSON.
///
/// # Contract
/// - One bounded-timeout request per `fetch` call. Zero internal retries.
/// - Per-record garbage is returned as-is; the normalizer sorts it out.
/// - Errors use the [`CatalogError`] taxonomy so the caller can tell
///   "wait and retry" from "give up gracefully".
#[async_trait]
pub trait Catalog: std::fmt::Debug + Send + Sync {
    /// 📥 Fetch every raw record the catalog has for `window`.
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRecord>, CatalogError>;
}

/// 🎭 The many faces of a catalog — a polymorphic casting call for data origins.
///
/// Each variant wraps a concrete client. The enum dispatches via
/// `impl Catalog for CatalogBackend`, so the scheduler never needs to know
/// whether records came over the wire or out of a test script.
/// Ancient proverb: "He who hardcodes the catalog client, mocks nothing and fears every deploy."
#[derive(Debug)]
pub enum CatalogBackend {
    Usgs(UsgsCatalog),
    Scripted(ScriptedCatalog),
}

#[async_trait]
impl Catalog for CatalogBackend {
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRecord>, CatalogError> {
        match self {
            CatalogBackend::Usgs(client) => client.fetch(window).await,
            CatalogBackend::Scripted(script) => script.fetch(window).await,
        }
    }
}

#[cfg(test)]
impl RawRecord {
    /// 🧪 Assembles a fully-stocked raw record for tests. Every field present,
    /// every value plausible. Break it on purpose, field by field.
    pub(crate) fn synthetic(id: &str, mag: f64, lon: f64, lat: f64, depth: f64, time_ms: i64) -> Self {
        RawRecord {
            id: Some(id.to_string()),
            properties: RawProperties {
                mag: Some(mag),
                place: Some(format!("{}km from the nearest excuse", depth as i64)),
                time: Some(time_ms),
                url: Some(format!("https://quakes.example/event/{id}")),
            },
            geometry: RawGeometry { coordinates: vec![lon, lat, depth] },
        }
    }
}
