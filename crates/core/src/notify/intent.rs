//! Notification intents produced by mutating operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of notification to deliver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A request was assigned to an operator (sent to the operator).
    RequestAssigned,
    /// A request was completed (sent to the owning customer).
    RequestCompleted,
    /// A request was rejected (sent to the owning customer).
    RequestRejected,
    /// Additional documents are needed (sent to the owning customer).
    DocumentsNeeded,
}

impl NotificationKind {
    /// Returns the kind as a string (for logging and metric labels).
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RequestAssigned => "REQUEST_ASSIGNED",
            NotificationKind::RequestCompleted => "REQUEST_COMPLETED",
            NotificationKind::RequestRejected => "REQUEST_REJECTED",
            NotificationKind::DocumentsNeeded => "DOCUMENTS_NEEDED",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An obligation to notify a user, produced as a side effect of a
/// successful mutation.
///
/// Intents are ephemeral: the core returns them to its caller (or hands
/// them to the dispatcher) instead of delivering inline, so a delivery
/// failure can never fail the mutation that produced the intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationIntent {
    /// Recipient.
    pub user_id: String,
    pub kind: NotificationKind,
    /// Structured data for message templating.
    pub payload: Value,
}

impl NotificationIntent {
    pub fn new(user_id: impl Into<String>, kind: NotificationKind, payload: Value) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            payload,
        }
    }
}
