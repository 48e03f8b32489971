use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("dossier.db")
}

/// Notification dispatcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Channel buffer between intent producers and the dispatcher
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    256
}

/// Statistics configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatisticsConfig {
    /// Trailing window length for aggregations when the caller does not
    /// supply one; wire it via `StatisticsAggregator::with_default_window_days`
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
        }
    }
}

fn default_window_days() -> i64 {
    30
}

/// Lifecycle engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Internal retries after an optimistic-concurrency conflict
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

fn default_conflict_retries() -> u32 {
    1
}
