use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Notification buffer size is at least 1
/// - Statistics window is at least one day
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.notifications.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "notifications.buffer_size cannot be 0".to_string(),
        ));
    }

    if config.statistics.default_window_days < 1 {
        return Err(ConfigError::ValidationError(
            "statistics.default_window_days must be at least 1".to_string(),
        ));
    }

    Ok(())
}
