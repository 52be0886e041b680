//! # Previously, on Temblor...
//!
//! 🎬 The scheduler needed a catalog that would fail on cue. The real USGS,
//! to its credit, only fails when you least need it to. Someone had to write
//! a catalog so obedient it lives entirely in RAM and does exactly what the
//! script says, take after take, no method acting.
//!
//! That someone was this module.
//!
//! `ScriptedCatalog` plays back a queue of pre-written fetch outcomes —
//! successes with records, transient tantrums, permanent parse disasters —
//! one per call, in order. When the script runs out it improvises an empty
//! batch, which is the catalog equivalent of "no lines, just vibes".
//!
//! 🦆
//!
//! ⚠️ This is for tests and local dry runs. If you deploy this to prod,
//! your dashboard will be very calm and very wrong.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::catalog::{Catalog, CatalogError, RawRecord};
use crate::common::FetchWindow;

/// 🎭 The world's most cooperative catalog. Hand it a script of fetch
/// outcomes; it performs them verbatim, one per `fetch` call.
///
/// 🔒 The `Mutex<VecDeque>` because `fetch` takes `&self` (the trait says so,
/// the scheduler shares the backend) but playback consumes the script.
/// Interior mutability: the polite name for "we'll mutate anyway, but with
/// a permission slip".
#[derive(Debug)]
pub struct ScriptedCatalog {
    script: Mutex<VecDeque<Result<Vec<RawRecord>, CatalogError>>>,
}

impl ScriptedCatalog {
    /// 🚀 Loads the script. First element answers the first `fetch`, and so
    /// on. No I/O, no config, no server to ping. The most peaceful
    /// constructor in the entire crate. Cherish it.
    pub fn new(script: Vec<Result<Vec<RawRecord>, CatalogError>>) -> Self {
        Self { script: Mutex::new(script.into()) }
    }
}

#[async_trait]
impl Catalog for ScriptedCatalog {
    /// 🎬 Deliver the next scripted outcome. Off-script calls get an empty
    /// record set — a perfectly quiet seismic interval, the kind geologists
    /// call "suspicious".
    async fn fetch(&self, _window: &FetchWindow) -> Result<Vec<RawRecord>, CatalogError> {
        self.script.lock().await.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window() -> FetchWindow {
        FetchWindow {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            min_magnitude: 4.5,
        }
    }

    #[tokio::test]
    async fn the_one_where_the_actor_follows_the_script() {
        let catalog = ScriptedCatalog::new(vec![
            Err(CatalogError::Unavailable("feed down for lunch".into())),
            Ok(vec![RawRecord::synthetic("ak0241", 5.1, -151.3, 62.9, 80.0, 1_700_000_000_000)]),
        ]);

        let first = catalog.fetch(&window()).await;
        assert!(matches!(first, Err(CatalogError::Unavailable(_))));

        let second = catalog.fetch(&window()).await.expect("take two was scripted to succeed");
        assert_eq!(second.len(), 1);

        // 🎬 off-script: quiet earth, empty batch, no complaints
        let third = catalog.fetch(&window()).await.expect("improvised silence is still a success");
        assert!(third.is_empty());
    }
}
