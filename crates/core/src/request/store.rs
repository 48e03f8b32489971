//! Request storage trait and query types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Priority, RequestStatus, ServiceRequest, StatusHistoryEntry};

/// Error type for request operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    /// Requested entity id does not resolve. Terminal for the operation.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempted status change is not present in the transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// Malformed caller input. Caller-correctable, never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic-concurrency collision on a write. Safe to retry after
    /// re-reading the record.
    #[error("Concurrent update detected for request {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new service request (always starts in draft).
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Owning customer.
    pub user_id: String,
    /// Category of service requested.
    pub service_type_id: String,
    /// Initial priority.
    pub priority: Priority,
}

/// Sort order for request listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
}

/// Filter for querying service requests.
#[derive(Debug, Clone)]
pub struct RequestFilter {
    /// Filter by status.
    pub status: Option<RequestStatus>,
    /// Filter by owning customer.
    pub user_id: Option<String>,
    /// Filter by assigned operator.
    pub assigned_operator_id: Option<String>,
    /// Filter by service type.
    pub service_type_id: Option<String>,
    /// Only requests created at or after this instant.
    pub created_from: Option<DateTime<Utc>>,
    /// Only requests created at or before this instant.
    pub created_to: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            user_id: None,
            assigned_operator_id: None,
            service_type_id: None,
            created_from: None,
            created_to: None,
            sort: SortOrder::default(),
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_assigned_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.assigned_operator_id = Some(operator_id.into());
        self
    }

    pub fn with_service_type(mut self, service_type_id: impl Into<String>) -> Self {
        self.service_type_id = Some(service_type_id.into());
        self
    }

    pub fn with_created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_to = Some(to);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Grouping dimension for windowed rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    ServiceType,
    Priority,
}

/// Trait for service-request storage backends.
///
/// `save` is the per-record serialization point: it compares the record's
/// `version` against the stored one and fails with [`RequestError::Conflict`]
/// when a concurrent writer got there first. Callers re-read and re-validate
/// before retrying.
pub trait RequestStore: Send + Sync {
    /// Create a new request in draft status. Assigns id and timestamps.
    fn create(&self, request: CreateRequest) -> Result<ServiceRequest, RequestError>;

    /// Get a request by id.
    fn get(&self, id: &str) -> Result<Option<ServiceRequest>, RequestError>;

    /// Persist a mutated request, guarded by its `version`.
    ///
    /// Returns the stored record with bumped `version` and refreshed
    /// `updated_at`.
    fn save(&self, request: &ServiceRequest) -> Result<ServiceRequest, RequestError>;

    /// Append a status history entry. History is append-only.
    fn append_history(&self, entry: &StatusHistoryEntry) -> Result<(), RequestError>;

    /// All history entries for a request, ordered by `created_at` ascending.
    fn history(&self, request_id: &str) -> Result<Vec<StatusHistoryEntry>, RequestError>;

    /// List requests matching the filter, plus the total matching count
    /// ignoring pagination.
    fn list(&self, filter: &RequestFilter) -> Result<(Vec<ServiceRequest>, i64), RequestError>;

    /// Count requests matching the filter.
    fn count(&self, filter: &RequestFilter) -> Result<i64, RequestError>;

    /// Grouped counts over a created-at window.
    fn count_grouped(
        &self,
        group: GroupBy,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(String, i64)>, RequestError>;
}
