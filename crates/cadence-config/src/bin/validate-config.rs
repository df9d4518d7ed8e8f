//! Config validation CLI tool
//!
//! Validates a cadence configuration file and prints the effective settings.

use cadence_config::{ConfigError, NotifierBackend, CURRENT_CONFIG_VERSION};
use cadence_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a cadence configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match cadence_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Effective settings:");
            println!("  Config version:    {}", CURRENT_CONFIG_VERSION);
            println!("  Data directory:    {}", policy.service.data_dir.display());
            println!(
                "  Default offset:    {} business days",
                policy.follow_up.default_offset_business_days
            );
            println!(
                "  Suspension grace:  {}h",
                policy.follow_up.suspension_grace.as_secs() / 3600
            );
            println!(
                "  Sweep interval:    {}s (warm-up {}s)",
                policy.scheduler.sweep_interval.as_secs(),
                policy.scheduler.warmup_delay.as_secs()
            );
            match &policy.notifications.backend {
                NotifierBackend::Log => println!("  Notifications:     log"),
                NotifierBackend::Command { program, .. } => {
                    println!("  Notifications:     command ({})", program)
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
