//! Configuration validation

use crate::schema::{RawConfig, RawNotificationConfig};
use thiserror::Error;

/// Upper bound for the default offset: roughly one working year
pub const MAX_OFFSET_BUSINESS_DAYS: u32 = 260;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("follow_up.default_offset_business_days must be between 1 and {max}, got {value}")]
    InvalidOffset { value: u32, max: u32 },

    #[error("scheduler.{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("Unknown notification backend '{0}' (expected \"log\" or \"command\")")]
    UnknownBackend(String),

    #[error("notifications.command is required for the command backend")]
    MissingCommand,
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(offset) = config.follow_up.default_offset_business_days
        && !(1..=MAX_OFFSET_BUSINESS_DAYS).contains(&offset)
    {
        errors.push(ValidationError::InvalidOffset {
            value: offset,
            max: MAX_OFFSET_BUSINESS_DAYS,
        });
    }

    if config.scheduler.sweep_interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroInterval {
            field: "sweep_interval_seconds",
        });
    }

    errors.extend(validate_notifications(&config.notifications));

    errors
}

fn validate_notifications(raw: &RawNotificationConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match raw.backend.as_deref() {
        None | Some("log") => {}
        Some("command") => {
            if raw.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
                errors.push(ValidationError::MissingCommand);
            }
        }
        Some(other) => errors.push(ValidationError::UnknownBackend(other.to_string())),
    }

    errors
}
