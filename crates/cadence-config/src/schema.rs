//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Follow-up scheduling defaults
    #[serde(default)]
    pub follow_up: RawFollowUpConfig,

    /// Sweep timing
    #[serde(default)]
    pub scheduler: RawSchedulerConfig,

    /// Due-notification delivery
    #[serde(default)]
    pub notifications: RawNotificationConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFollowUpConfig {
    /// Business days added when a call is registered or a reschedule omits a date
    pub default_offset_business_days: Option<u32>,

    /// Hours past due before an unpaused client is suspended
    pub suspension_grace_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSchedulerConfig {
    /// Seconds between sweeps
    pub sweep_interval_seconds: Option<u64>,

    /// Seconds before the first sweep after start
    pub warmup_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawNotificationConfig {
    /// "log" (default) or "command"
    pub backend: Option<String>,

    /// Program to run for the "command" backend (e.g. "notify-send")
    pub command: Option<String>,

    /// Extra arguments placed before the title and body
    #[serde(default)]
    pub args: Vec<String>,

    /// Notification title
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [service]
            data_dir = "/var/lib/cadence"

            [follow_up]
            default_offset_business_days = 5
            suspension_grace_hours = 48

            [scheduler]
            sweep_interval_seconds = 30
            warmup_delay_seconds = 1

            [notifications]
            backend = "command"
            command = "notify-send"
            args = ["--urgency=normal"]
            title = "Follow-up due"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.follow_up.default_offset_business_days, Some(5));
        assert_eq!(config.scheduler.sweep_interval_seconds, Some(30));
        assert_eq!(config.notifications.args, vec!["--urgency=normal"]);
        assert_eq!(
            config.service.data_dir.as_deref(),
            Some(std::path::Path::new("/var/lib/cadence"))
        );
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.follow_up.default_offset_business_days.is_none());
        assert!(config.notifications.backend.is_none());
    }
}
