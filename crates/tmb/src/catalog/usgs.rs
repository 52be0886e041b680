//! # 📡 THE USGS CATALOG CLIENT
//!
//! *Previously, on Temblor...*
//!
//! 🎬 COLD OPEN — INT. HOME OFFICE — 3:47 AM
//!
//! The dashboard shows a gap in the event feed. Six hours wide. One engineer,
//! alone, curls up with the FDSN web service documentation like it's a
//! mystery novel. It is a mystery novel. The mystery is why `starttime`
//! accepts fourteen date formats and the error message names none of them.
//!
//! "I'll just poll the endpoint," they whispered. "It's a government API,"
//! someone warned, once, at a conference. Nobody listened.
//!
//! 🚀 This module asks the USGS FDSN event service, very politely and with a
//! hard deadline, for every quake in a time window above a magnitude floor.
//! It makes exactly ONE request per call. It does not retry. It does not
//! hope. It reports what happened in a typed error and lets the scheduler
//! do the feelings.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::catalog::{Catalog, CatalogError, CatalogPayload, RawRecord};
use crate::common::FetchWindow;

// 📡 CatalogConfig — "It's just a REST endpoint", she said, before the 429s began.
// Lives here, next to the client that uses it, because configs should live
// near the thing they configure. Wild concept. Next up: socks living near feet.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// 📡 The FDSN event query endpoint. Scheme + host + path. All of it.
    /// Yes, the default points at the real USGS. Yes, they rate-limit.
    /// That's what the scheduler's backoff is for.
    #[serde(default = "default_catalog_url")]
    pub url: String,
    /// ⏳ Hard per-request deadline, seconds. The one promise this module
    /// makes: no call blocks past this. The catalog gets this long to
    /// answer and not one second more. Boundaries are healthy.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// 🔧 The real endpoint. Earthquakes dot USGS dot gov. The genuine article.
fn default_catalog_url() -> String {
    "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string()
}

/// ⏳ 30 seconds — the same deadline the original ingest job gave it, and
/// about as long as anyone should wait for a FeatureCollection.
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 📡 The production catalog client: one reqwest `Client`, reused across
/// requests, because spinning up a new client per call is the networking
/// equivalent of buying a new car every time you need groceries.
///
/// Stateless between calls. No retries. No cache. No opinions about what's
/// in the records — that's the normalizer's beat.
#[derive(Debug)]
pub struct UsgsCatalog {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl UsgsCatalog {
    /// 🚀 Builds the client with its timeouts baked in: 10s to connect
    /// (if the handshake takes longer, nobody's home) and the configured
    /// per-request deadline end to end.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            // 💀 "Failed to initialize http client" — a tragedy in one act.
            // The builder enters, full of promise. The TLS stack hesitates.
            // The operating system shrugs. There is only this context string.
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Catalog for UsgsCatalog {
    /// 📥 One GET, one window, one verdict.
    ///
    /// Query parameters follow the FDSN event service contract:
    /// `format=geojson`, RFC3339 `starttime`/`endtime`, and `minmagnitude`.
    /// Error mapping is the whole job here:
    /// - reqwest timeout            → [`CatalogError::Timeout`] (transient)
    /// - any other transport error  → [`CatalogError::Unavailable`] (transient)
    /// - non-2xx status (incl. 429) → [`CatalogError::Unavailable`] (transient)
    /// - unparsable top-level body  → [`CatalogError::MalformedResponse`] (permanent)
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRecord>, CatalogError> {
        // 🪟 RFC3339 with whole seconds — the one format the endpoint
        // reliably accepts without passive aggression.
        let starttime = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let endtime = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);
        trace!("📡 asking the catalog for {} → {} above M{}", starttime, endtime, window.min_magnitude);

        let response = self
            .client
            .get(&self.config.url)
            .query(&[
                ("format", "geojson".to_string()),
                ("starttime", starttime),
                ("endtime", endtime),
                ("minmagnitude", window.min_magnitude.to_string()),
            ])
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    // ⏳ the deadline did its job. the request did not.
                    CatalogError::Timeout { timeout_secs: self.config.request_timeout_secs }
                } else {
                    // 📡 DNS, TCP, TLS — pick your poison, all of them transient
                    CatalogError::Unavailable(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            // 💀 We got an answer! It just... wasn't an answer. 429 lands here
            // too — rate limiting is the catalog asking for space, and the
            // scheduler's backoff is how we give it some.
            return Err(CatalogError::Unavailable(format!(
                "catalog answered {status} instead of data"
            )));
        }

        // 📦 Read the body first, parse second — if the bytes aren't a
        // FeatureCollection we want the serde error, not a reqwest shrug.
        let body = response
            .text()
            .await
            .map_err(|err| CatalogError::Unavailable(format!("body vanished mid-read: {err}")))?;

        let payload: CatalogPayload = serde_json::from_str(&body)
            // 🗑️ top-level garbage is permanent for this attempt. No amount
            // of waiting turns HTML error pages into GeoJSON.
            .map_err(|err| CatalogError::MalformedResponse(err.to_string()))?;

        debug!("✅ catalog delivered {} raw records for the window", payload.features.len());
        Ok(payload.features)
    }
}
