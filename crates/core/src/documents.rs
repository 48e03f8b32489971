//! Additional-document requests.

use std::sync::Arc;

use serde_json::json;

use crate::lifecycle::LifecycleEngine;
use crate::metrics;
use crate::notify::{NotificationIntent, NotificationKind};
use crate::request::{RequestError, RequestStatus, ServiceRequest};

/// Asks customers for additional documents on a request under review.
///
/// Moves the request into `missing_documents` (when it is not there
/// already) and produces a single customer notification carrying the
/// requested categories and the operator's explanation.
pub struct DocumentRequestCoordinator {
    engine: Arc<LifecycleEngine>,
}

impl DocumentRequestCoordinator {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self { engine }
    }

    pub fn request_additional_documents(
        &self,
        request_id: &str,
        categories: &[String],
        reason: &str,
        acting_user_id: &str,
    ) -> Result<(ServiceRequest, Vec<NotificationIntent>), RequestError> {
        if categories.is_empty() {
            return Err(RequestError::InvalidArgument(
                "document categories must not be empty".to_string(),
            ));
        }

        let current = self
            .engine
            .store()
            .get(request_id)?
            .ok_or_else(|| RequestError::NotFound(format!("service request {}", request_id)))?;

        let updated = if current.status == RequestStatus::MissingDocuments {
            // Repeat request for more documents; no status change needed.
            current
        } else {
            let note = format!("Requested documents: {}", categories.join(", "));
            // The engine's generic documents notification is replaced by
            // the richer one below, so only one reaches the customer.
            match self.engine.transition(
                request_id,
                RequestStatus::MissingDocuments,
                acting_user_id,
                Some(&note),
            ) {
                Ok((updated, _)) => updated,
                // A concurrent writer may have moved the request into
                // missing_documents between our read and the transition;
                // re-read and take the repeat-request path if so.
                Err(RequestError::InvalidTransition {
                    to: RequestStatus::MissingDocuments,
                    ..
                }) => {
                    let reread = self.engine.store().get(request_id)?.ok_or_else(|| {
                        RequestError::NotFound(format!("service request {}", request_id))
                    })?;
                    if reread.status != RequestStatus::MissingDocuments {
                        return Err(RequestError::InvalidTransition {
                            from: reread.status,
                            to: RequestStatus::MissingDocuments,
                        });
                    }
                    reread
                }
                Err(e) => return Err(e),
            }
        };

        metrics::DOCUMENT_REQUESTS_TOTAL.inc();
        tracing::info!(
            request_id = %updated.id,
            categories = %categories.join(","),
            requested_by = acting_user_id,
            "Additional documents requested"
        );

        let intent = NotificationIntent::new(
            updated.user_id.clone(),
            NotificationKind::DocumentsNeeded,
            json!({
                "request_id": updated.id,
                "categories": categories,
                "reason": reason,
            }),
        );

        Ok((updated, vec![intent]))
    }
}
