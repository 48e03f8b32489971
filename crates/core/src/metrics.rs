//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Lifecycle engine (transitions, rejections, conflicts)
//! - Assignment and document-request operations
//! - Bulk operations
//! - Notification delivery

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

/// Status transitions applied, by from/to status.
pub static TRANSITIONS_APPLIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_transitions_applied_total",
            "Total status transitions applied",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Transitions rejected by the transition table, by from/to status.
pub static TRANSITIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_transitions_rejected_total",
            "Total status transitions rejected as illegal",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Optimistic-concurrency conflicts observed during writes.
pub static WRITE_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dossier_write_conflicts_total",
        "Total optimistic-concurrency conflicts observed",
    )
    .unwrap()
});

/// Operator assignments total.
pub static ASSIGNMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dossier_assignments_total", "Total operator assignments").unwrap()
});

/// Document requests issued to customers.
pub static DOCUMENT_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dossier_document_requests_total",
        "Total additional-document requests issued",
    )
    .unwrap()
});

/// Bulk operation items by result.
pub static BULK_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_bulk_items_total",
            "Total bulk operation items processed",
        ),
        &["result"], // "updated", "failed"
    )
    .unwrap()
});

/// Notification delivery attempts by kind and result.
pub static NOTIFICATIONS_DELIVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_notifications_delivered_total",
            "Total notification delivery attempts",
        ),
        &["kind", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRANSITIONS_APPLIED.clone()),
        Box::new(TRANSITIONS_REJECTED.clone()),
        Box::new(WRITE_CONFLICTS.clone()),
        Box::new(ASSIGNMENTS_TOTAL.clone()),
        Box::new(DOCUMENT_REQUESTS_TOTAL.clone()),
        Box::new(BULK_ITEMS.clone()),
        Box::new(NOTIFICATIONS_DELIVERED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }
}
