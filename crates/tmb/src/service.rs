//! 🛎️ The Event Service — the front desk of the whole operation.
//!
//! Everything outside this crate that wants quake data talks to one of
//! these. Listing with filters, point lookups, the ingestion status board,
//! and the one administrative eraser — all here, all thin. The service
//! holds no state of its own; it borrows the store's snapshot and the
//! scheduler's watch channel and takes credit for both. Management. 🦆
//!
//! ⚠️ Deliberately NOT in this module: anything that writes event data.
//! Ingestion owns the write path. The service can delete (an admin chore)
//! but it cannot create or update — a front desk that edits the records
//! room is how audits get interesting.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use crate::common::{IngestionStatus, SeismicEvent};
use crate::query::{EventCriteria, EventPage, QueryConfig, QueryValidationError, run_query};
use crate::store::{EventStore, StoreBackend};

/// 🛎️ The outbound surface: queries, lookups, status, and the admin eraser.
#[derive(Debug)]
pub struct EventService {
    store: Arc<StoreBackend>,
    query_config: QueryConfig,
    status: watch::Receiver<IngestionStatus>,
}

impl EventService {
    pub fn new(
        store: Arc<StoreBackend>,
        query_config: QueryConfig,
        status: watch::Receiver<IngestionStatus>,
    ) -> Self {
        Self { store, query_config, status }
    }

    /// 🔍 Filtered, sorted, paginated listing. Validation errors come back
    /// typed and whole — never a partial page with an apology.
    pub async fn list_events(
        &self,
        criteria: &EventCriteria,
    ) -> Result<EventPage, QueryValidationError> {
        // 📜 snapshot first, then pure computation — the query engine never
        // holds a store lock while it sorts
        let snapshot = self.store.scan().await;
        run_query(criteria, &self.query_config, snapshot)
    }

    /// 🔍 Point lookup by the catalog's id.
    pub async fn get_event(&self, external_id: &str) -> Option<SeismicEvent> {
        self.store.get(external_id).await
    }

    /// 🗑️ Administrative delete. The ingestion path never calls this, and
    /// note the fine print: if the upstream catalog still carries the event,
    /// the next overlapping window will politely re-create it. Deletion
    /// fights the tide; the tide is on a schedule.
    pub async fn remove_event(&self, external_id: &str) -> Result<Option<SeismicEvent>> {
        self.store.remove(external_id).await
    }

    /// 📡 The latest ingestion scorecard and bookmark, straight off the
    /// watch channel. A freshly booted process honestly reports `None`s
    /// instead of inventing zeros.
    pub fn ingestion_status(&self) -> IngestionStatus {
        self.status.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NormalizedEvent;
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    async fn service_with(ids: &[&str]) -> EventService {
        let store = InMemoryStore::new();
        for (i, id) in ids.iter().enumerate() {
            let record = NormalizedEvent {
                external_id: id.to_string(),
                latitude: -33.0,
                longitude: -71.0,
                depth_km: 30.0,
                magnitude: 5.0 + i as f64 * 0.5,
                occurred_at: Utc.timestamp_opt(1_000 + i as i64, 0).unwrap(),
                description: Some("near the trench".to_string()),
                source_url: None,
            };
            store.upsert(record, Utc.timestamp_opt(2_000, 0).unwrap()).await.unwrap();
        }
        let (_status_tx, status_rx) = watch::channel(IngestionStatus::default());
        EventService::new(
            Arc::new(StoreBackend::InMemory(store)),
            QueryConfig::default(),
            status_rx,
        )
    }

    #[tokio::test]
    async fn the_one_where_the_front_desk_finds_your_quake() {
        let service = service_with(&["cl100", "cl200"]).await;
        assert!(service.get_event("cl100").await.is_some());
        assert!(service.get_event("cl999").await.is_none());

        let page = service.list_events(&EventCriteria::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn the_one_where_validation_errors_arrive_typed_and_intact() {
        let service = service_with(&["cl100"]).await;
        let criteria = EventCriteria { page_size: Some(9_999), ..Default::default() };
        let err = service.list_events(&criteria).await.unwrap_err();
        assert!(matches!(err, QueryValidationError::PageSizeTooLarge { .. }));
    }

    #[tokio::test]
    async fn the_one_where_the_eraser_works_but_the_tide_is_coming() {
        let service = service_with(&["cl100", "cl200"]).await;
        let gone = service.remove_event("cl100").await.unwrap();
        assert!(gone.is_some());
        assert!(service.get_event("cl100").await.is_none());
        assert_eq!(service.list_events(&EventCriteria::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn the_one_where_a_fresh_boot_admits_it_knows_nothing() {
        let service = service_with(&[]).await;
        let status = service.ingestion_status();
        assert!(status.last_cycle_summary.is_none());
        assert!(status.last_success_checkpoint.is_none());
    }
}
