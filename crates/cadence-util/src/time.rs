//! Time utilities for cadence
//!
//! Provides wall-clock access, business-day arithmetic for follow-up
//! scheduling, and countdown formatting.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `CADENCE_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for exercising the follow-up sweep without waiting days for clients to
//! become overdue.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! CADENCE_MOCK_TIME="2025-12-25 14:30:00" cadenced run
//! ```

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Weekday};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "CADENCE_MOCK_TIME";

/// Format used by `CADENCE_MOCK_TIME`
const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                if let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT) {
                    if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                        let offset = mock_dt.signed_duration_since(chrono::Local::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    tracing::warn!(
                        mock_time = %mock_time_str,
                        "Failed to convert mock time to local timezone"
                    );
                } else {
                    tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time format"
                    );
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Add `n` business days (Monday to Friday) to `start`, preserving the
/// local time of day.
///
/// Weekends are skipped while counting but `start` itself is never moved:
/// `n == 0` returns `start` even when it falls on a Saturday. Negative
/// offsets are not supported and also return `start` unchanged.
///
/// When the preserved time of day does not exist on the landing date
/// (a DST gap), the first valid instant after it is used.
pub fn add_business_days<Tz: TimeZone>(start: DateTime<Tz>, n: i64) -> DateTime<Tz> {
    if n <= 0 {
        return start;
    }

    // Any run of 7 consecutive days holds exactly 5 weekdays, so whole weeks
    // can be skipped before walking the last 1..=5 business days.
    let weeks = (n - 1) / 5;
    let mut remaining = n - weeks * 5;
    let Some(mut date) = start
        .date_naive()
        .checked_add_days(chrono::Days::new((weeks * 7) as u64))
    else {
        return start;
    };

    while remaining > 0 {
        date = match date.succ_opt() {
            Some(d) => d,
            None => return start,
        };
        if !is_weekend(date.weekday()) {
            remaining -= 1;
        }
    }

    let naive = date.and_time(start.time());
    let tz = start.timezone();
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt,
        None => tz
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .unwrap_or(start),
    }
}

/// Parse a user-supplied follow-up timestamp.
///
/// Accepts RFC 3339 (`2025-01-15T10:00:00-03:00`) as well as local
/// `YYYY-MM-DDTHH:MM[:SS]` and `YYYY-MM-DD HH:MM[:SS]`. Returns `None` for
/// anything else so callers can fall back to the default offset.
pub fn parse_local_datetime(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }

    const LOCAL_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];

    LOCAL_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    })
}

/// Format a countdown in days/hours/minutes, floor per unit.
///
/// Seconds are only shown in full (non-abbreviated) form and only while less
/// than a day remains. Zero units are omitted; an all-zero countdown renders
/// as `0s` (full) or `0m` (abbreviated).
pub fn format_countdown(d: Duration, abbreviated: bool) -> String {
    let total_secs = d.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if !abbreviated && seconds > 0 && days == 0 {
        parts.push(format!("{}s", seconds));
    }

    if parts.is_empty() {
        return if abbreviated { "0m".into() } else { "0s".into() };
    }
    parts.join(" ")
}

/// Convert a std duration to a chrono duration, saturating on overflow.
pub fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
