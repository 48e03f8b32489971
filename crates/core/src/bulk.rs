//! Bulk status updates over many requests.

use std::sync::Arc;

use crate::lifecycle::LifecycleEngine;
use crate::metrics;
use crate::notify::NotificationIntent;
use crate::request::{RequestError, RequestStatus, RequestStore};

/// A single request that failed during a bulk operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkFailure {
    pub id: String,
    pub error: RequestError,
}

/// Outcome of a bulk status update. Successes and failures are reported
/// side by side; a failed item never rolls back the others.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    /// Ids updated, in input order.
    pub updated: Vec<String>,
    /// Per-id failures, in input order.
    pub failed: Vec<BulkFailure>,
    /// Notification intents from the successful transitions.
    pub intents: Vec<NotificationIntent>,
}

/// Applies one status change across many requests, item by item.
pub struct BulkOperationCoordinator {
    store: Arc<dyn RequestStore>,
    engine: Arc<LifecycleEngine>,
}

impl BulkOperationCoordinator {
    pub fn new(store: Arc<dyn RequestStore>, engine: Arc<LifecycleEngine>) -> Self {
        Self { store, engine }
    }

    /// Move every listed request to `new_status`.
    ///
    /// Fails up front when none of the ids resolve (a mistyped filter,
    /// most likely). Otherwise each id goes through the lifecycle engine
    /// independently and lands in `updated` or `failed`.
    pub fn bulk_update_status(
        &self,
        request_ids: &[String],
        new_status: RequestStatus,
        acting_user_id: &str,
        reason: Option<&str>,
    ) -> Result<BulkOutcome, RequestError> {
        let mut any_exists = false;
        for id in request_ids {
            if self.store.get(id)?.is_some() {
                any_exists = true;
                break;
            }
        }
        if !any_exists {
            return Err(RequestError::NotFound(
                "no requests matched the given ids".to_string(),
            ));
        }

        let mut outcome = BulkOutcome::default();
        for id in request_ids {
            match self
                .engine
                .transition(id, new_status, acting_user_id, reason)
            {
                Ok((updated, mut intents)) => {
                    metrics::BULK_ITEMS.with_label_values(&["updated"]).inc();
                    outcome.updated.push(updated.id);
                    outcome.intents.append(&mut intents);
                }
                Err(error) => {
                    metrics::BULK_ITEMS.with_label_values(&["failed"]).inc();
                    tracing::warn!(
                        request_id = %id,
                        to = new_status.as_str(),
                        "Bulk item failed: {}",
                        error
                    );
                    outcome.failed.push(BulkFailure {
                        id: id.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            to = new_status.as_str(),
            updated = outcome.updated.len(),
            failed = outcome.failed.len(),
            changed_by = acting_user_id,
            "Bulk status update finished"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationKind;
    use crate::request::{CreateRequest, Priority, SqliteRequestStore};

    fn setup() -> (BulkOperationCoordinator, Arc<SqliteRequestStore>) {
        let store = Arc::new(SqliteRequestStore::in_memory().unwrap());
        let engine = Arc::new(LifecycleEngine::new(
            Arc::clone(&store) as Arc<dyn RequestStore>
        ));
        let coordinator =
            BulkOperationCoordinator::new(Arc::clone(&store) as Arc<dyn RequestStore>, engine);
        (coordinator, store)
    }

    fn create_draft(store: &SqliteRequestStore, user: &str) -> String {
        store
            .create(CreateRequest {
                user_id: user.to_string(),
                service_type_id: "tax-filing".to_string(),
                priority: Priority::Normal,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_all_succeed() {
        let (coordinator, store) = setup();
        let ids = vec![
            create_draft(&store, "c-1"),
            create_draft(&store, "c-2"),
            create_draft(&store, "c-3"),
        ];

        let outcome = coordinator
            .bulk_update_status(&ids, RequestStatus::Submitted, "op-1", None)
            .unwrap();

        assert_eq!(outcome.updated, ids);
        assert!(outcome.failed.is_empty());
        assert!(outcome.intents.is_empty());
    }

    #[test]
    fn test_partial_failure_does_not_abort() {
        let (coordinator, store) = setup();
        let a = create_draft(&store, "c-1");
        let b = create_draft(&store, "c-2");
        let c = create_draft(&store, "c-3");

        // Close the middle one first so its transition to submitted fails.
        coordinator
            .engine
            .transition(&b, RequestStatus::Closed, "op-1", None)
            .unwrap();

        let ids = vec![a.clone(), b.clone(), c.clone()];
        let outcome = coordinator
            .bulk_update_status(&ids, RequestStatus::Submitted, "op-1", None)
            .unwrap();

        assert_eq!(outcome.updated, vec![a.clone(), c.clone()]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].id, b);
        assert!(matches!(
            outcome.failed[0].error,
            RequestError::InvalidTransition { .. }
        ));

        // The successes committed.
        assert_eq!(
            store.get(&a).unwrap().unwrap().status,
            RequestStatus::Submitted
        );
        assert_eq!(
            store.get(&c).unwrap().unwrap().status,
            RequestStatus::Submitted
        );
    }

    #[test]
    fn test_missing_id_becomes_item_failure() {
        let (coordinator, store) = setup();
        let a = create_draft(&store, "c-1");

        let ids = vec![a.clone(), "no-such-id".to_string()];
        let outcome = coordinator
            .bulk_update_status(&ids, RequestStatus::Submitted, "op-1", None)
            .unwrap();

        assert_eq!(outcome.updated, vec![a]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(matches!(
            outcome.failed[0].error,
            RequestError::NotFound(_)
        ));
    }

    #[test]
    fn test_no_resolving_ids_is_an_error() {
        let (coordinator, _store) = setup();

        let ids = vec!["ghost-1".to_string(), "ghost-2".to_string()];
        let result = coordinator.bulk_update_status(&ids, RequestStatus::Submitted, "op-1", None);
        assert!(matches!(result, Err(RequestError::NotFound(_))));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let (coordinator, _store) = setup();
        let result = coordinator.bulk_update_status(&[], RequestStatus::Submitted, "op-1", None);
        assert!(matches!(result, Err(RequestError::NotFound(_))));
    }

    #[test]
    fn test_intents_collected_across_items() {
        let (coordinator, store) = setup();
        let a = create_draft(&store, "c-1");
        let b = create_draft(&store, "c-2");

        for id in [&a, &b] {
            coordinator
                .engine
                .transition(id, RequestStatus::Submitted, "op-1", None)
                .unwrap();
            coordinator
                .engine
                .transition(id, RequestStatus::InReview, "op-1", None)
                .unwrap();
        }

        let ids = vec![a, b];
        let outcome = coordinator
            .bulk_update_status(&ids, RequestStatus::Completed, "op-1", None)
            .unwrap();

        assert_eq!(outcome.updated.len(), 2);
        assert_eq!(outcome.intents.len(), 2);
        assert!(outcome
            .intents
            .iter()
            .all(|i| i.kind == NotificationKind::RequestCompleted));
        assert_eq!(outcome.intents[0].user_id, "c-1");
        assert_eq!(outcome.intents[1].user_id, "c-2");
    }
}
