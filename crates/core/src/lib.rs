pub mod assignment;
pub mod bulk;
pub mod config;
pub mod documents;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod request;
pub mod stats;

pub use assignment::{AssignmentManager, InMemoryDirectory, Operator, OperatorDirectory};
pub use bulk::{BulkFailure, BulkOperationCoordinator, BulkOutcome};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use documents::DocumentRequestCoordinator;
pub use lifecycle::LifecycleEngine;
pub use notify::{
    create_notification_system, NotificationIntent, NotificationKind, NotificationSender,
    NotifyHandle,
};
pub use request::{
    CreateRequest, Priority, RequestError, RequestFilter, RequestStatus, RequestStore,
    ServiceRequest, SortOrder, SqliteRequestStore, StatusHistoryEntry,
};
pub use stats::{RequestStatistics, StatisticsAggregator, StatsWindow};
