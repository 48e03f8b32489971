//! Lifecycle engine: the sole authority for changing a request's status.
//!
//! Every status change goes through [`LifecycleEngine::transition`], which
//! validates against the transition table, persists under the store's
//! version guard, appends the history entry, and returns the notification
//! intents the change produced. Intents are returned rather than delivered
//! so a transport failure can never fail a committed transition.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::metrics;
use crate::notify::{NotificationIntent, NotificationKind};
use crate::request::{
    InternalNote, RequestError, RequestStatus, RequestStore, ServiceRequest, StatusHistoryEntry,
};

/// Message sent to the customer when a rejection carries no reason.
const DEFAULT_REJECTION_MESSAGE: &str = "Your request could not be approved.";

/// Validates and applies status changes on service requests.
pub struct LifecycleEngine {
    store: Arc<dyn RequestStore>,
    conflict_retries: u32,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            conflict_retries: 1,
        }
    }

    /// Override the number of internal retries after a write conflict.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    /// Apply a status change.
    ///
    /// Loads the request, checks the transition table, persists the new
    /// status under the version guard, and appends a history entry. On a
    /// write conflict the read-check-write sequence is retried a bounded
    /// number of times before `Conflict` surfaces to the caller.
    ///
    /// Returns the updated request together with the notification intents
    /// the transition produced (none for most transitions).
    pub fn transition(
        &self,
        request_id: &str,
        new_status: RequestStatus,
        acting_user_id: &str,
        reason: Option<&str>,
    ) -> Result<(ServiceRequest, Vec<NotificationIntent>), RequestError> {
        let mut attempts = 0;
        loop {
            match self.try_transition(request_id, new_status, acting_user_id, reason) {
                Err(RequestError::Conflict(id)) if attempts < self.conflict_retries => {
                    attempts += 1;
                    metrics::WRITE_CONFLICTS.inc();
                    tracing::debug!(
                        request_id = %id,
                        attempt = attempts,
                        "Write conflict during transition, retrying"
                    );
                }
                Err(e @ RequestError::Conflict(_)) => {
                    metrics::WRITE_CONFLICTS.inc();
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    fn try_transition(
        &self,
        request_id: &str,
        new_status: RequestStatus,
        acting_user_id: &str,
        reason: Option<&str>,
    ) -> Result<(ServiceRequest, Vec<NotificationIntent>), RequestError> {
        let current = self
            .store
            .get(request_id)?
            .ok_or_else(|| RequestError::NotFound(format!("service request {}", request_id)))?;

        let from = current.status;
        if !from.can_transition_to(new_status) {
            metrics::TRANSITIONS_REJECTED
                .with_label_values(&[from.as_str(), new_status.as_str()])
                .inc();
            return Err(RequestError::InvalidTransition {
                from,
                to: new_status,
            });
        }

        let mut updated = current;
        updated.status = new_status;
        let saved = self.store.save(&updated)?;

        self.store.append_history(&StatusHistoryEntry {
            service_request_id: saved.id.clone(),
            from_status: Some(from),
            to_status: new_status,
            changed_by_id: acting_user_id.to_string(),
            notes: reason.map(String::from),
            created_at: saved.updated_at,
        })?;

        metrics::TRANSITIONS_APPLIED
            .with_label_values(&[from.as_str(), new_status.as_str()])
            .inc();
        tracing::info!(
            request_id = %saved.id,
            from = from.as_str(),
            to = new_status.as_str(),
            changed_by = acting_user_id,
            "Status transition applied"
        );

        let intents = Self::intents_for(&saved, reason);
        Ok((saved, intents))
    }

    fn intents_for(request: &ServiceRequest, reason: Option<&str>) -> Vec<NotificationIntent> {
        match request.status {
            RequestStatus::Completed => vec![NotificationIntent::new(
                request.user_id.clone(),
                NotificationKind::RequestCompleted,
                json!({
                    "request_id": request.id,
                    "service_type_id": request.service_type_id,
                }),
            )],
            RequestStatus::Rejected => vec![NotificationIntent::new(
                request.user_id.clone(),
                NotificationKind::RequestRejected,
                json!({
                    "request_id": request.id,
                    "service_type_id": request.service_type_id,
                    "reason": reason.unwrap_or(DEFAULT_REJECTION_MESSAGE),
                }),
            )],
            RequestStatus::MissingDocuments => vec![NotificationIntent::new(
                request.user_id.clone(),
                NotificationKind::DocumentsNeeded,
                json!({
                    "request_id": request.id,
                    "service_type_id": request.service_type_id,
                }),
            )],
            _ => Vec::new(),
        }
    }

    /// Append a timestamped, attributed line to the staff-only note log.
    ///
    /// No status or notification side effects.
    pub fn add_internal_note(
        &self,
        request_id: &str,
        note: &str,
        acting_user_id: &str,
    ) -> Result<(), RequestError> {
        let mut attempts = 0;
        loop {
            let mut current = self
                .store
                .get(request_id)?
                .ok_or_else(|| RequestError::NotFound(format!("service request {}", request_id)))?;

            current.internal_notes.push(InternalNote {
                author_id: acting_user_id.to_string(),
                body: note.to_string(),
                created_at: Utc::now(),
            });

            match self.store.save(&current) {
                Ok(_) => return Ok(()),
                Err(RequestError::Conflict(_)) if attempts < self.conflict_retries => {
                    attempts += 1;
                    metrics::WRITE_CONFLICTS.inc();
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::request::{
        CreateRequest, GroupBy, Priority, RequestFilter, SqliteRequestStore,
    };

    fn engine_with_store() -> (LifecycleEngine, Arc<SqliteRequestStore>) {
        let store = Arc::new(SqliteRequestStore::in_memory().unwrap());
        let engine = LifecycleEngine::new(Arc::clone(&store) as Arc<dyn RequestStore>);
        (engine, store)
    }

    fn create_draft(store: &SqliteRequestStore) -> ServiceRequest {
        store
            .create(CreateRequest {
                user_id: "customer-1".to_string(),
                service_type_id: "tax-filing".to_string(),
                priority: Priority::Normal,
            })
            .unwrap()
    }

    #[test]
    fn test_legal_transition_succeeds() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        let (updated, intents) = engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();

        assert_eq!(updated.status, RequestStatus::Submitted);
        assert!(intents.is_empty());

        let fetched = store.get(&request.id).unwrap().unwrap();
        assert_eq!(fetched.status, RequestStatus::Submitted);
    }

    #[test]
    fn test_illegal_transition_fails_and_leaves_status() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        let result = engine.transition(&request.id, RequestStatus::Completed, "op-1", None);
        assert_eq!(
            result.unwrap_err(),
            RequestError::InvalidTransition {
                from: RequestStatus::Draft,
                to: RequestStatus::Completed,
            }
        );

        let fetched = store.get(&request.id).unwrap().unwrap();
        assert_eq!(fetched.status, RequestStatus::Draft);
        assert!(store.history(&request.id).unwrap().is_empty());
    }

    #[test]
    fn test_transition_on_missing_request() {
        let (engine, _store) = engine_with_store();
        let result = engine.transition("no-such-id", RequestStatus::Submitted, "op-1", None);
        assert!(matches!(result, Err(RequestError::NotFound(_))));
    }

    #[test]
    fn test_transition_appends_history() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();
        engine
            .transition(
                &request.id,
                RequestStatus::InReview,
                "op-1",
                Some("taking the case"),
            )
            .unwrap();

        let history = store.history(&request.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_status, Some(RequestStatus::Draft));
        assert_eq!(history[0].to_status, RequestStatus::Submitted);
        assert_eq!(history[1].from_status, Some(RequestStatus::Submitted));
        assert_eq!(history[1].to_status, RequestStatus::InReview);
        assert_eq!(history[1].changed_by_id, "op-1");
        assert_eq!(history[1].notes.as_deref(), Some("taking the case"));
    }

    #[test]
    fn test_completed_produces_exactly_one_owner_intent() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();
        engine
            .transition(&request.id, RequestStatus::InReview, "op-1", None)
            .unwrap();
        let (_, intents) = engine
            .transition(&request.id, RequestStatus::Completed, "op-1", None)
            .unwrap();

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, NotificationKind::RequestCompleted);
        assert_eq!(intents[0].user_id, "customer-1");
    }

    #[test]
    fn test_in_review_produces_no_intents() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();
        let (_, intents) = engine
            .transition(&request.id, RequestStatus::InReview, "op-1", None)
            .unwrap();

        assert!(intents.is_empty());
    }

    #[test]
    fn test_rejection_intent_carries_reason() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();
        engine
            .transition(&request.id, RequestStatus::InReview, "op-1", None)
            .unwrap();
        let (_, intents) = engine
            .transition(
                &request.id,
                RequestStatus::Rejected,
                "op-1",
                Some("missing power of attorney"),
            )
            .unwrap();

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, NotificationKind::RequestRejected);
        assert_eq!(
            intents[0].payload["reason"],
            "missing power of attorney"
        );
    }

    #[test]
    fn test_rejection_without_reason_uses_default_message() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();
        engine
            .transition(&request.id, RequestStatus::InReview, "op-1", None)
            .unwrap();
        let (_, intents) = engine
            .transition(&request.id, RequestStatus::Rejected, "op-1", None)
            .unwrap();

        assert_eq!(intents[0].payload["reason"], DEFAULT_REJECTION_MESSAGE);
    }

    #[test]
    fn test_closed_is_terminal_for_engine() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .transition(&request.id, RequestStatus::Closed, "op-1", None)
            .unwrap();

        for &target in RequestStatus::all() {
            let result = engine.transition(&request.id, target, "op-1", None);
            assert!(
                matches!(result, Err(RequestError::InvalidTransition { .. })),
                "closed request must reject transition to {}",
                target
            );
        }
    }

    #[test]
    fn test_add_internal_note() {
        let (engine, store) = engine_with_store();
        let request = create_draft(&store);

        engine
            .add_internal_note(&request.id, "customer called twice", "op-3")
            .unwrap();
        engine
            .add_internal_note(&request.id, "escalated to senior staff", "op-3")
            .unwrap();

        let fetched = store.get(&request.id).unwrap().unwrap();
        assert_eq!(fetched.internal_notes.len(), 2);
        assert_eq!(fetched.internal_notes[0].body, "customer called twice");
        assert_eq!(fetched.internal_notes[0].author_id, "op-3");
        assert_eq!(fetched.internal_notes[1].body, "escalated to senior staff");
        // No status side effects.
        assert_eq!(fetched.status, RequestStatus::Draft);
        assert!(store.history(&request.id).unwrap().is_empty());
    }

    #[test]
    fn test_add_internal_note_missing_request() {
        let (engine, _store) = engine_with_store();
        let result = engine.add_internal_note("no-such-id", "note", "op-1");
        assert!(matches!(result, Err(RequestError::NotFound(_))));
    }

    /// Store wrapper that fails the first N saves with Conflict, simulating
    /// a concurrent writer.
    struct ConflictingStore {
        inner: Arc<SqliteRequestStore>,
        conflicts_remaining: AtomicU32,
    }

    impl RequestStore for ConflictingStore {
        fn create(&self, request: CreateRequest) -> Result<ServiceRequest, RequestError> {
            self.inner.create(request)
        }

        fn get(&self, id: &str) -> Result<Option<ServiceRequest>, RequestError> {
            self.inner.get(id)
        }

        fn save(&self, request: &ServiceRequest) -> Result<ServiceRequest, RequestError> {
            if self
                .conflicts_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(RequestError::Conflict(request.id.clone()));
            }
            self.inner.save(request)
        }

        fn append_history(&self, entry: &StatusHistoryEntry) -> Result<(), RequestError> {
            self.inner.append_history(entry)
        }

        fn history(&self, request_id: &str) -> Result<Vec<StatusHistoryEntry>, RequestError> {
            self.inner.history(request_id)
        }

        fn list(
            &self,
            filter: &RequestFilter,
        ) -> Result<(Vec<ServiceRequest>, i64), RequestError> {
            self.inner.list(filter)
        }

        fn count(&self, filter: &RequestFilter) -> Result<i64, RequestError> {
            self.inner.count(filter)
        }

        fn count_grouped(
            &self,
            group: GroupBy,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<(String, i64)>, RequestError> {
            self.inner.count_grouped(group, from, to)
        }
    }

    #[test]
    fn test_single_conflict_is_retried() {
        let inner = Arc::new(SqliteRequestStore::in_memory().unwrap());
        let request = create_draft(&inner);

        let store = Arc::new(ConflictingStore {
            inner: Arc::clone(&inner),
            conflicts_remaining: AtomicU32::new(1),
        });
        let engine = LifecycleEngine::new(store as Arc<dyn RequestStore>);

        let (updated, _) = engine
            .transition(&request.id, RequestStatus::Submitted, "customer-1", None)
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Submitted);
    }

    #[test]
    fn test_persistent_conflict_surfaces_after_bounded_retry() {
        let inner = Arc::new(SqliteRequestStore::in_memory().unwrap());
        let request = create_draft(&inner);

        let store = Arc::new(ConflictingStore {
            inner,
            conflicts_remaining: AtomicU32::new(u32::MAX),
        });
        let engine = LifecycleEngine::new(store as Arc<dyn RequestStore>);

        let result = engine.transition(&request.id, RequestStatus::Submitted, "customer-1", None);
        assert_eq!(result.unwrap_err(), RequestError::Conflict(request.id));
    }
}
