//! Core service-request data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a service request.
///
/// Status flow:
/// ```text
/// draft -> submitted -> in_review -> completed -> closed
///             |    ^        |            |
///             v    |        v            v
///         missing_documents rejected -> closed
///
/// Every non-terminal status can reach closed except in_review,
/// which must first resolve to completed, rejected or missing_documents.
/// ```
///
/// The adjacency encoded in [`RequestStatus::allowed_transitions`] is the
/// single source of truth for transition legality; no other component
/// re-encodes these rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created by the customer, not yet submitted.
    Draft,
    /// Submitted for processing, waiting for an operator.
    Submitted,
    /// An operator is actively working the case.
    InReview,
    /// Waiting on additional documents from the customer.
    MissingDocuments,
    /// Fulfilled successfully.
    Completed,
    /// Declined by an operator.
    Rejected,
    /// Archived (terminal).
    Closed,
}

impl RequestStatus {
    /// Returns the statuses this status may legally transition to.
    pub fn allowed_transitions(&self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            Draft => &[Submitted, Closed],
            Submitted => &[InReview, MissingDocuments, Closed],
            InReview => &[MissingDocuments, Completed, Rejected],
            MissingDocuments => &[InReview, Closed],
            Completed => &[Closed],
            Rejected => &[Closed],
            Closed => &[],
        }
    }

    /// Returns true if `to` is a legal successor of this status.
    ///
    /// Pure and total: any pairing not present in the table is `false`,
    /// never an error.
    pub fn can_transition_to(&self, to: RequestStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Returns the status as a string (for filtering and storage).
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Submitted => "submitted",
            RequestStatus::InReview => "in_review",
            RequestStatus::MissingDocuments => "missing_documents",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Closed => "closed",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<RequestStatus> {
        match s {
            "draft" => Some(RequestStatus::Draft),
            "submitted" => Some(RequestStatus::Submitted),
            "in_review" => Some(RequestStatus::InReview),
            "missing_documents" => Some(RequestStatus::MissingDocuments),
            "completed" => Some(RequestStatus::Completed),
            "rejected" => Some(RequestStatus::Rejected),
            "closed" => Some(RequestStatus::Closed),
            _ => None,
        }
    }

    /// All defined statuses, in lifecycle order.
    pub fn all() -> &'static [RequestStatus] {
        use RequestStatus::*;
        &[
            Draft,
            Submitted,
            InReview,
            MissingDocuments,
            Completed,
            Rejected,
            Closed,
        ]
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a service request.
///
/// Independently mutable; carries no transition constraints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Returns the priority as a string (for grouping and storage).
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a stored priority string.
    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staff-only note attached to a request.
///
/// Notes are append-only and never exposed to the owning customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InternalNote {
    /// Staff member who wrote the note.
    pub author_id: String,
    /// Note text.
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A customer's submitted case for an administrative service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRequest {
    /// Unique identifier (UUID), assigned at creation.
    pub id: String,

    /// Owning customer.
    pub user_id: String,

    /// Category of service requested.
    pub service_type_id: String,

    /// Current status. Mutated only through the lifecycle engine.
    pub status: RequestStatus,

    /// Assigned staff member, if any. Mutated only by the assignment manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_operator_id: Option<String>,

    /// Priority for operator triage.
    #[serde(default)]
    pub priority: Priority,

    /// Append-only staff note log.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_notes: Vec<InternalNote>,

    /// Optimistic concurrency guard, bumped by the store on every write.
    #[serde(default)]
    pub version: i64,

    pub created_at: DateTime<Utc>,

    /// Refreshed by the store on every mutation.
    pub updated_at: DateTime<Utc>,
}

/// One row of the append-only status audit trail.
///
/// The entries for a request, ordered by `created_at`, reconstruct a path
/// through the transition table from the initial persisted status to the
/// request's current one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    /// Owning request.
    pub service_request_id: String,
    /// Status before the change. None only for an initial entry.
    pub from_status: Option<RequestStatus>,
    /// Status after the change.
    pub to_status: RequestStatus,
    /// Acting staff identity.
    pub changed_by_id: String,
    /// Optional free-text reason supplied by the actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
