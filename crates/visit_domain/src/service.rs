use std::time::Instant;

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::{
    date_rules::parse_visit_date,
    error::VisitError,
    events::{VisitEventSink, VisitRegistered},
    filter::{filter_visits, VisitFilter},
    metrics::{self, FrequencyCount, Summary},
    record::{validate_records, RejectedRecord, VisitRecord},
    repository::VisitRepository,
    sort,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub visits: Vec<VisitRecord>,
    pub summary: Summary,
    pub frequencies: Vec<FrequencyCount>,
    pub rejected: Vec<RejectedRecord>,
}

/// Owns the cached visit list. The cache only changes on reload or after the
/// repository has accepted a visit.
pub struct VisitService {
    repository: Box<dyn VisitRepository>,
    records: RwLock<Vec<VisitRecord>>,
    rejected: RwLock<Vec<RejectedRecord>>,
    event_sink: Option<Box<dyn VisitEventSink>>,
}

pub struct VisitServiceBuilder {
    repository: Box<dyn VisitRepository>,
    event_sink: Option<Box<dyn VisitEventSink>>,
}

impl VisitServiceBuilder {
    pub fn new(repository: Box<dyn VisitRepository>) -> Self {
        Self {
            repository,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: Box<dyn VisitEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds an empty service; call [`VisitService::reload`] to populate it.
    pub fn build(self) -> VisitService {
        VisitService {
            repository: self.repository,
            records: RwLock::new(Vec::new()),
            rejected: RwLock::new(Vec::new()),
            event_sink: self.event_sink,
        }
    }
}

impl VisitService {
    pub fn builder(repository: Box<dyn VisitRepository>) -> VisitServiceBuilder {
        VisitServiceBuilder::new(repository)
    }

    /// Replaces the cache with a fresh fetch. A failed fetch leaves the cache empty.
    #[instrument(skip(self))]
    pub fn reload(&self) -> Result<usize, VisitError> {
        let start = Instant::now();
        let raw = match self.repository.fetch_all() {
            Ok(raw) => raw,
            Err(err) => {
                self.records.write().clear();
                self.rejected.write().clear();
                error!(%err, "unable to load visit records");
                return Err(err);
            }
        };

        let (accepted, rejected) = validate_records(raw);
        let loaded = accepted.len();
        let rejected_count = rejected.len();
        *self.records.write() = accepted;
        *self.rejected.write() = rejected;
        info!(
            loaded,
            rejected = rejected_count,
            elapsed_ms = %start.elapsed().as_millis(),
            "visit records loaded"
        );
        Ok(loaded)
    }

    pub fn records(&self) -> Vec<VisitRecord> {
        self.records.read().clone()
    }

    pub fn rejected(&self) -> Vec<RejectedRecord> {
        self.rejected.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<VisitRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn ordered(&self, now: NaiveDateTime) -> Vec<VisitRecord> {
        sort::order_visits(&self.records.read(), now)
    }

    pub fn filtered(&self, filter: VisitFilter, query: &str, now: NaiveDateTime) -> Vec<VisitRecord> {
        filter_visits(&self.ordered(now), filter, query, now)
    }

    pub fn summary(&self, now: NaiveDateTime) -> Summary {
        metrics::summarize(&self.records.read(), now)
    }

    pub fn frequencies(&self) -> Vec<FrequencyCount> {
        metrics::bucket_frequencies(&self.records.read())
    }

    pub fn snapshot(&self, filter: VisitFilter, query: &str, now: NaiveDateTime) -> DashboardSnapshot {
        let records = self.records.read();
        let ordered = sort::order_visits(&records, now);
        DashboardSnapshot {
            visits: filter_visits(&ordered, filter, query, now),
            summary: metrics::summarize(&records, now),
            frequencies: metrics::bucket_frequencies(&records),
            rejected: self.rejected(),
        }
    }

    /// Sends the visit to the repository, then restarts the record's cadence from
    /// the stored timestamp and notifies the event sink. On any failure the cache
    /// and the sink are left untouched.
    #[instrument(skip(self))]
    pub fn mark_visited(&self, id: &str, now: NaiveDateTime) -> Result<VisitRegistered, VisitError> {
        let name = self
            .get(id)
            .map(|record| record.name)
            .ok_or_else(|| VisitError::UnknownRecord(id.to_string()))?;

        let start = Instant::now();
        let stored = self.repository.mark_visited(id, now).map_err(|err| {
            error!(%err, "visit update rejected");
            err
        })?;
        self.apply_visit(id, &stored)?;

        let event = VisitRegistered {
            id: id.to_string(),
            name,
            last_verified: stored,
        };
        info!(elapsed_ms = %start.elapsed().as_millis(), "visit registered");
        if let Some(sink) = &self.event_sink {
            sink.visit_registered(&event);
        }
        Ok(event)
    }

    /// Restarts the cached record's cadence from the timestamp the repository stored.
    fn apply_visit(&self, id: &str, stored: &str) -> Result<(), VisitError> {
        let applied = parse_visit_date(stored).and_then(|visited_at| {
            let mut records = self.records.write();
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| VisitError::UnknownRecord(id.to_string()))?;
            record.schedule = record.schedule.restarted_at(visited_at)?;
            Ok(())
        });
        match &applied {
            Err(VisitError::UnknownRecord(_)) => {
                warn!(%stored, "visit accepted remotely but the record is no longer cached")
            }
            Err(err) => error!(%err, %stored, "visit accepted remotely but not applied locally"),
            Ok(()) => {}
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_rules::format_for_api;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        records: Vec<Value>,
        fail_fetch: Option<u16>,
        fail_update: Option<u16>,
        stored_text: Option<String>,
        updates: Vec<(String, String)>,
    }

    #[derive(Clone, Default)]
    struct FakeRepository(Arc<Mutex<FakeState>>);

    fn status(method: &'static str, status: u16) -> VisitError {
        VisitError::Status {
            method,
            url: "http://fake/visits".into(),
            status,
        }
    }

    impl VisitRepository for FakeRepository {
        fn fetch_all(&self) -> Result<Vec<Value>, VisitError> {
            let state = self.0.lock();
            match state.fail_fetch {
                Some(code) => Err(status("GET", code)),
                None => Ok(state.records.clone()),
            }
        }

        fn mark_visited(&self, id: &str, visited_at: NaiveDateTime) -> Result<String, VisitError> {
            let mut state = self.0.lock();
            if let Some(code) = state.fail_update {
                return Err(status("PATCH", code));
            }
            let stored = state
                .stored_text
                .clone()
                .unwrap_or_else(|| format_for_api(visited_at));
            state.updates.push((id.to_string(), stored.clone()));
            Ok(stored)
        }
    }

    fn raw(id: &str, active: bool, last: &str, frequency: i64) -> Value {
        json!({
            "id": id,
            "name": format!("Person {id}"),
            "cpf": format!("000.000.000-0{id}"),
            "active": active,
            "last_verified_date": last,
            "verify_frequency_in_days": frequency,
        })
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn seeded() -> FakeRepository {
        let repository = FakeRepository::default();
        repository.0.lock().records = vec![
            raw("1", true, "2025/01/01 10:00:00", 7),
            raw("2", true, "05/01/2025 10:00:00", 5),
            raw("3", false, "2024/12/01 10:00:00", 30),
            raw("4", true, "garbage", 7),
        ];
        repository
    }

    #[test]
    fn reload_validates_and_caches() {
        let service = VisitService::builder(Box::new(seeded())).build();
        assert!(service.records().is_empty());

        assert_eq!(service.reload().unwrap(), 3);
        assert_eq!(service.records().len(), 3);
        assert_eq!(service.rejected().len(), 1);
        assert_eq!(service.rejected()[0].id, "4");

        let summary = service.summary(now());
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.due_today, 1);
    }

    #[test]
    fn null_date_rejects_only_that_record() {
        let repository = FakeRepository::default();
        repository.0.lock().records = vec![
            raw("1", true, "2025/01/01 10:00:00", 7),
            json!({
                "id": "2",
                "name": "Person 2",
                "cpf": "000.000.000-02",
                "active": true,
                "last_verified_date": null,
                "verify_frequency_in_days": 7,
            }),
        ];
        let service = VisitService::builder(Box::new(repository)).build();

        assert_eq!(service.reload().unwrap(), 1);
        assert_eq!(service.records()[0].id, "1");
        let rejected = service.rejected();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, "2");
        assert_eq!(rejected[0].name, "Person 2");
    }

    #[test]
    fn failed_reload_clears_cache() {
        let repository = seeded();
        let service = VisitService::builder(Box::new(repository.clone())).build();
        service.reload().unwrap();

        repository.0.lock().fail_fetch = Some(503);
        let err = service.reload().unwrap_err();
        assert!(matches!(err, VisitError::Status { status: 503, .. }));
        assert!(service.records().is_empty());
        assert!(service.rejected().is_empty());

        repository.0.lock().fail_fetch = None;
        assert_eq!(service.reload().unwrap(), 3);
    }

    #[test]
    fn mark_visited_patches_only_that_record_and_notifies() {
        let repository = seeded();
        let events: Arc<Mutex<Vec<VisitRegistered>>> = Arc::default();
        let sink_events = Arc::clone(&events);
        let service = VisitService::builder(Box::new(repository.clone()))
            .with_event_sink(Box::new(move |event: &VisitRegistered| {
                sink_events.lock().push(event.clone());
            }))
            .build();
        service.reload().unwrap();
        let before = service.get("2").unwrap();

        let event = service.mark_visited("1", now()).unwrap();
        assert_eq!(event.name, "Person 1");
        assert_eq!(event.last_verified, "10/01/2025 12:00:00");

        let updated = service.get("1").unwrap();
        assert_eq!(updated.last_verified(), now());
        assert_eq!(updated.frequency_days(), 7);
        assert!(!updated.is_pending(now()));
        assert_eq!(service.get("2").unwrap(), before);

        assert_eq!(events.lock().as_slice(), [event]);
        assert_eq!(
            repository.0.lock().updates,
            [("1".to_string(), "10/01/2025 12:00:00".to_string())]
        );
    }

    #[test]
    fn failed_mark_visited_changes_nothing() {
        let repository = seeded();
        let events: Arc<Mutex<Vec<VisitRegistered>>> = Arc::default();
        let sink_events = Arc::clone(&events);
        let service = VisitService::builder(Box::new(repository.clone()))
            .with_event_sink(Box::new(move |event: &VisitRegistered| {
                sink_events.lock().push(event.clone());
            }))
            .build();
        service.reload().unwrap();
        let before = service.records();

        repository.0.lock().fail_update = Some(500);
        let err = service.mark_visited("1", now()).unwrap_err();
        assert!(matches!(err, VisitError::Status { status: 500, .. }));
        assert_eq!(service.records(), before);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn unreadable_stored_timestamp_leaves_cache_and_sink_alone() {
        let repository = seeded();
        let events: Arc<Mutex<Vec<VisitRegistered>>> = Arc::default();
        let sink_events = Arc::clone(&events);
        let service = VisitService::builder(Box::new(repository.clone()))
            .with_event_sink(Box::new(move |event: &VisitRegistered| {
                sink_events.lock().push(event.clone());
            }))
            .build();
        service.reload().unwrap();
        let before = service.records();

        repository.0.lock().stored_text = Some("sometime".into());
        let err = service.mark_visited("1", now()).unwrap_err();
        assert!(matches!(err, VisitError::Parse { .. }));
        assert_eq!(repository.0.lock().updates.len(), 1);
        assert_eq!(service.records(), before);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn visit_for_record_dropped_from_cache_is_not_applied() {
        let service = VisitService::builder(Box::new(seeded())).build();
        service.reload().unwrap();
        let before = service.records();

        let err = service.apply_visit("99", "10/01/2025 12:00:00").unwrap_err();
        assert!(matches!(err, VisitError::UnknownRecord(id) if id == "99"));
        assert_eq!(service.records(), before);
    }

    #[test]
    fn unknown_record_is_rejected_before_any_request() {
        let repository = seeded();
        let service = VisitService::builder(Box::new(repository.clone())).build();
        service.reload().unwrap();

        let err = service.mark_visited("404", now()).unwrap_err();
        assert!(matches!(err, VisitError::UnknownRecord(id) if id == "404"));
        assert!(repository.0.lock().updates.is_empty());
    }

    #[test]
    fn snapshot_orders_and_filters() {
        let service = VisitService::builder(Box::new(seeded())).build();
        service.reload().unwrap();

        let snapshot = service.snapshot(VisitFilter::All, "", now());
        let ids: Vec<_> = snapshot.visits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(snapshot.summary, service.summary(now()));
        assert_eq!(snapshot.frequencies, service.frequencies());
        assert_eq!(snapshot.rejected.len(), 1);

        let pending = service.filtered(VisitFilter::Pending, "", now());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "1");
    }
}
