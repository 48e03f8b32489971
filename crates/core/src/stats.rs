//! Windowed statistics over service requests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::request::{GroupBy, RequestError, RequestFilter, RequestStatus, RequestStore};

/// Half-open-ish reporting window over request creation time. Both
/// bounds are inclusive, matching the store's filter semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl StatsWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The trailing `days` ending now.
    pub fn trailing_days(days: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - Duration::days(days),
            to,
        }
    }
}

impl Default for StatsWindow {
    fn default() -> Self {
        Self::trailing_days(30)
    }
}

/// Aggregated counts for requests created within a window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestStatistics {
    pub total: i64,
    pub completed: i64,
    /// Requests still in flight: submitted, in review, or waiting on
    /// documents.
    pub pending: i64,
    pub rejected: i64,
    /// Completed over total, formatted with one decimal place, e.g.
    /// "66.7%". "0%" when the window holds no requests.
    pub completion_rate: String,
    pub by_service_type: Vec<(String, i64)>,
    pub by_priority: Vec<(String, i64)>,
}

/// Computes read-only rollups; never mutates request state.
pub struct StatisticsAggregator {
    store: Arc<dyn RequestStore>,
    default_window_days: i64,
}

const PENDING_STATUSES: [RequestStatus; 3] = [
    RequestStatus::Submitted,
    RequestStatus::InReview,
    RequestStatus::MissingDocuments,
];

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            default_window_days: 30,
        }
    }

    /// Override the window used by [`aggregate_default`], typically from
    /// `Config.statistics.default_window_days`.
    ///
    /// [`aggregate_default`]: StatisticsAggregator::aggregate_default
    pub fn with_default_window_days(mut self, days: i64) -> Self {
        self.default_window_days = days;
        self
    }

    /// Aggregate over the configured trailing default window.
    pub fn aggregate_default(&self) -> Result<RequestStatistics, RequestError> {
        self.aggregate(StatsWindow::trailing_days(self.default_window_days))
    }

    pub fn aggregate(&self, window: StatsWindow) -> Result<RequestStatistics, RequestError> {
        let in_window = || RequestFilter::new().with_created_between(window.from, window.to);

        let total = self.store.count(&in_window())?;
        let completed = self
            .store
            .count(&in_window().with_status(RequestStatus::Completed))?;
        let rejected = self
            .store
            .count(&in_window().with_status(RequestStatus::Rejected))?;

        let mut pending = 0;
        for status in PENDING_STATUSES {
            pending += self.store.count(&in_window().with_status(status))?;
        }

        let completion_rate = if total == 0 {
            "0%".to_string()
        } else {
            format!("{:.1}%", completed as f64 / total as f64 * 100.0)
        };

        let by_service_type =
            self.store
                .count_grouped(GroupBy::ServiceType, window.from, window.to)?;
        let by_priority = self
            .store
            .count_grouped(GroupBy::Priority, window.from, window.to)?;

        Ok(RequestStatistics {
            total,
            completed,
            pending,
            rejected,
            completion_rate,
            by_service_type,
            by_priority,
        })
    }
}
