//! Validated policy structures

use crate::schema::{
    RawConfig, RawFollowUpConfig, RawNotificationConfig, RawSchedulerConfig, RawServiceConfig,
};
use cadence_util::default_data_dir;
use std::path::PathBuf;
use std::time::Duration;

/// Business days added by default when a call is registered
pub const DEFAULT_OFFSET_BUSINESS_DAYS: u32 = 7;

/// Time past due before an unpaused client is suspended
pub const DEFAULT_SUSPENSION_GRACE: Duration = Duration::from_secs(24 * 60 * 60);

/// Period between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Delay before the first sweep after start
pub const DEFAULT_WARMUP_DELAY: Duration = Duration::from_secs(3);

/// Default notification title
pub const DEFAULT_NOTIFICATION_TITLE: &str = "Follow-up due";

/// Validated policy ready for use by the engine and scheduler
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServiceConfig,
    pub follow_up: FollowUpPolicy,
    pub scheduler: SchedulerPolicy,
    pub notifications: NotificationPolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            follow_up: FollowUpPolicy::from_raw(raw.follow_up),
            scheduler: SchedulerPolicy::from_raw(raw.scheduler),
            notifications: NotificationPolicy::from_raw(raw.notifications),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Follow-up scheduling rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpPolicy {
    pub default_offset_business_days: u32,
    pub suspension_grace: Duration,
}

impl FollowUpPolicy {
    fn from_raw(raw: RawFollowUpConfig) -> Self {
        Self {
            default_offset_business_days: raw
                .default_offset_business_days
                .unwrap_or(DEFAULT_OFFSET_BUSINESS_DAYS),
            suspension_grace: raw
                .suspension_grace_hours
                .map(|h| Duration::from_secs(h * 3600))
                .unwrap_or(DEFAULT_SUSPENSION_GRACE),
        }
    }
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self {
            default_offset_business_days: DEFAULT_OFFSET_BUSINESS_DAYS,
            suspension_grace: DEFAULT_SUSPENSION_GRACE,
        }
    }
}

/// Sweep timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerPolicy {
    pub sweep_interval: Duration,
    pub warmup_delay: Duration,
}

impl SchedulerPolicy {
    fn from_raw(raw: RawSchedulerConfig) -> Self {
        Self {
            sweep_interval: raw
                .sweep_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL),
            warmup_delay: raw
                .warmup_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WARMUP_DELAY),
        }
    }
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            warmup_delay: DEFAULT_WARMUP_DELAY,
        }
    }
}

/// Where due notifications go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NotifierBackend {
    /// Structured log line only
    #[default]
    Log,
    /// Run an external program with title and body as the last two arguments
    Command { program: String, args: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct NotificationPolicy {
    pub backend: NotifierBackend,
    pub title: String,
}

impl NotificationPolicy {
    fn from_raw(raw: RawNotificationConfig) -> Self {
        let backend = match (raw.backend.as_deref(), raw.command) {
            (Some("command"), Some(program)) => NotifierBackend::Command {
                program,
                args: raw.args,
            },
            _ => NotifierBackend::Log,
        };

        Self {
            backend,
            title: raw
                .title
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
        }
    }
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            backend: NotifierBackend::Log,
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_hours_convert_to_duration() {
        let raw: RawConfig =
            toml::from_str("config_version = 1\n[follow_up]\nsuspension_grace_hours = 48\n").unwrap();
        let policy = Policy::from_raw(raw);
        assert_eq!(policy.follow_up.suspension_grace, Duration::from_secs(48 * 3600));
        assert_eq!(policy.follow_up.default_offset_business_days, 7);
    }

    #[test]
    fn command_backend() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1
            [notifications]
            backend = "command"
            command = "notify-send"
            args = ["-a", "cadence"]
            "#,
        )
        .unwrap();

        let policy = Policy::from_raw(raw);
        assert_eq!(
            policy.notifications.backend,
            NotifierBackend::Command {
                program: "notify-send".into(),
                args: vec!["-a".into(), "cadence".into()],
            }
        );
        assert_eq!(policy.notifications.title, DEFAULT_NOTIFICATION_TITLE);
    }
}
