//! Operator assignment for service requests.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::metrics;
use crate::notify::{NotificationIntent, NotificationKind};
use crate::request::{RequestError, RequestStore, ServiceRequest};

/// A staff member who can be assigned to requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    pub display_name: String,
}

/// Lookup of known operators.
///
/// Backed by whatever holds the staff roster; the core only needs to
/// resolve an id to an operator or establish that none exists.
pub trait OperatorDirectory: Send + Sync {
    fn resolve(&self, operator_id: &str) -> Result<Option<Operator>, RequestError>;
}

/// In-memory directory, for tests and fixed-roster deployments.
#[derive(Default)]
pub struct InMemoryDirectory {
    operators: HashMap<String, Operator>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operator(mut self, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let operator = Operator {
            id: id.into(),
            display_name: display_name.into(),
        };
        self.operators.insert(operator.id.clone(), operator);
        self
    }
}

impl OperatorDirectory for InMemoryDirectory {
    fn resolve(&self, operator_id: &str) -> Result<Option<Operator>, RequestError> {
        Ok(self.operators.get(operator_id).cloned())
    }
}

/// Assigns requests to operators.
pub struct AssignmentManager {
    store: Arc<dyn RequestStore>,
    directory: Arc<dyn OperatorDirectory>,
}

impl AssignmentManager {
    pub fn new(store: Arc<dyn RequestStore>, directory: Arc<dyn OperatorDirectory>) -> Self {
        Self { store, directory }
    }

    /// Assign a request to an operator.
    ///
    /// Validates both the request and the operator. Reassignment to a
    /// different operator overwrites the previous assignment; assigning
    /// the already-assigned operator skips the write but still produces
    /// the assignment notification, so the operator gets their heads-up
    /// either way.
    pub fn assign(
        &self,
        request_id: &str,
        operator_id: &str,
        assigned_by_id: &str,
    ) -> Result<(ServiceRequest, Vec<NotificationIntent>), RequestError> {
        let operator = self
            .directory
            .resolve(operator_id)?
            .ok_or_else(|| RequestError::NotFound(format!("operator {}", operator_id)))?;

        let current = self
            .store
            .get(request_id)?
            .ok_or_else(|| RequestError::NotFound(format!("service request {}", request_id)))?;

        let saved = if current.assigned_operator_id.as_deref() == Some(operator_id) {
            current
        } else {
            let mut updated = current;
            updated.assigned_operator_id = Some(operator.id.clone());
            self.store.save(&updated)?
        };

        metrics::ASSIGNMENTS_TOTAL.inc();
        tracing::info!(
            request_id = %saved.id,
            operator_id = %operator.id,
            assigned_by = assigned_by_id,
            "Request assigned"
        );

        let intent = NotificationIntent::new(
            operator.id.clone(),
            NotificationKind::RequestAssigned,
            json!({
                "request_id": saved.id,
                "service_type_id": saved.service_type_id,
                "priority": saved.priority.as_str(),
                "assigned_by": assigned_by_id,
            }),
        );

        Ok((saved, vec![intent]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CreateRequest, Priority, SqliteRequestStore};

    fn setup() -> (AssignmentManager, Arc<SqliteRequestStore>) {
        let store = Arc::new(SqliteRequestStore::in_memory().unwrap());
        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_operator("op-1", "Ada")
                .with_operator("op-2", "Grace"),
        );
        let manager = AssignmentManager::new(
            Arc::clone(&store) as Arc<dyn RequestStore>,
            directory as Arc<dyn OperatorDirectory>,
        );
        (manager, store)
    }

    fn create_request(store: &SqliteRequestStore) -> crate::request::ServiceRequest {
        store
            .create(CreateRequest {
                user_id: "customer-1".to_string(),
                service_type_id: "residence-permit".to_string(),
                priority: Priority::High,
            })
            .unwrap()
    }

    #[test]
    fn test_assign_sets_operator_and_notifies() {
        let (manager, store) = setup();
        let request = create_request(&store);

        let (updated, intents) = manager.assign(&request.id, "op-1", "supervisor-1").unwrap();

        assert_eq!(updated.assigned_operator_id.as_deref(), Some("op-1"));
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, NotificationKind::RequestAssigned);
        assert_eq!(intents[0].user_id, "op-1");
        assert_eq!(intents[0].payload["request_id"], request.id.as_str());
        assert_eq!(intents[0].payload["priority"], "high");
        assert_eq!(intents[0].payload["assigned_by"], "supervisor-1");
    }

    #[test]
    fn test_reassign_overwrites_previous_operator() {
        let (manager, store) = setup();
        let request = create_request(&store);

        manager.assign(&request.id, "op-1", "supervisor-1").unwrap();
        let (updated, _) = manager.assign(&request.id, "op-2", "supervisor-1").unwrap();

        assert_eq!(updated.assigned_operator_id.as_deref(), Some("op-2"));
        let fetched = store.get(&request.id).unwrap().unwrap();
        assert_eq!(fetched.assigned_operator_id.as_deref(), Some("op-2"));
    }

    #[test]
    fn test_assign_same_operator_skips_write_but_notifies() {
        let (manager, store) = setup();
        let request = create_request(&store);

        let (first, _) = manager.assign(&request.id, "op-1", "supervisor-1").unwrap();
        let (second, intents) = manager.assign(&request.id, "op-1", "supervisor-1").unwrap();

        // No version bump means no second write.
        assert_eq!(second.version, first.version);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, NotificationKind::RequestAssigned);
    }

    #[test]
    fn test_assign_unknown_operator() {
        let (manager, store) = setup();
        let request = create_request(&store);

        let result = manager.assign(&request.id, "op-99", "supervisor-1");
        assert_eq!(
            result.unwrap_err(),
            RequestError::NotFound("operator op-99".to_string())
        );

        // Request untouched.
        let fetched = store.get(&request.id).unwrap().unwrap();
        assert!(fetched.assigned_operator_id.is_none());
    }

    #[test]
    fn test_assign_unknown_request() {
        let (manager, _store) = setup();
        let result = manager.assign("no-such-id", "op-1", "supervisor-1");
        assert!(matches!(result, Err(RequestError::NotFound(_))));
    }
}
