//! Per-client follow-up countdown

use cadence_api::{CallRecord, ClientPatch, ClientRecord, ClientStatus, FollowUpPhase};
use cadence_util::{add_business_days, format_countdown, parse_local_datetime, to_chrono};
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::warn;

/// How much detail a remaining-time label carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Days, hours, minutes, and seconds while under a day
    #[default]
    Full,
    /// Days, hours and minutes only
    Abbreviated,
}

impl Precision {
    /// How often a live display must be recomputed to stay exact at this
    /// precision
    pub fn refresh_interval(self) -> Duration {
        match self {
            Precision::Full => Duration::from_secs(1),
            Precision::Abbreviated => Duration::from_secs(60),
        }
    }

    fn abbreviated(self) -> bool {
        self == Precision::Abbreviated
    }
}

/// Countdown state of one client.
///
/// The clock is a read-only view over the three follow-up fields of a
/// record. Transitions never mutate it; they return the [`ClientPatch`] to
/// merge through the client store, or `None` when there is nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpClock {
    next_follow_up_date: Option<DateTime<Local>>,
    /// Some iff paused
    paused_left: Option<Duration>,
}

impl FollowUpClock {
    pub fn new(next_follow_up_date: Option<DateTime<Local>>, paused_left: Option<Duration>) -> Self {
        Self {
            next_follow_up_date,
            paused_left,
        }
    }

    pub fn from_record(record: &ClientRecord) -> Self {
        // A pause without a snapshot reads as running
        let paused_left = if record.is_paused {
            record.paused_left()
        } else {
            None
        };
        Self::new(record.next_follow_up_date, paused_left)
    }

    pub fn next_follow_up_date(&self) -> Option<DateTime<Local>> {
        self.next_follow_up_date
    }

    pub fn is_paused(&self) -> bool {
        self.paused_left.is_some()
    }

    pub fn phase(&self, now: DateTime<Local>) -> FollowUpPhase {
        if self.paused_left.is_some() {
            return FollowUpPhase::Paused;
        }
        match self.next_follow_up_date {
            None => FollowUpPhase::Unset,
            Some(date) if now >= date => FollowUpPhase::Due,
            Some(_) => FollowUpPhase::Running,
        }
    }

    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        self.phase(now) == FollowUpPhase::Due
    }

    /// Time left on the countdown. Zero once due, the snapshot while paused,
    /// `None` when no follow-up is scheduled.
    pub fn remaining(&self, now: DateTime<Local>) -> Option<Duration> {
        if let Some(left) = self.paused_left {
            return Some(left);
        }
        self.next_follow_up_date
            .map(|date| (date - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// How long a running countdown has been past its date. `None` while
    /// paused, unset, or not yet due.
    pub fn overdue_by(&self, now: DateTime<Local>) -> Option<chrono::Duration> {
        if self.paused_left.is_some() {
            return None;
        }
        self.next_follow_up_date
            .map(|date| now - date)
            .filter(|d| *d >= chrono::Duration::zero())
    }

    /// Human-readable remaining time
    pub fn remaining_label(&self, now: DateTime<Local>, precision: Precision) -> String {
        match self.phase(now) {
            FollowUpPhase::Unset => "no follow-up".to_string(),
            FollowUpPhase::Due => "due".to_string(),
            FollowUpPhase::Paused => match (precision, self.paused_left) {
                (Precision::Full, Some(left)) => {
                    format!("paused: {}", format_countdown(left, false))
                }
                _ => "paused".to_string(),
            },
            FollowUpPhase::Running => {
                let left = self.remaining(now).unwrap_or(Duration::ZERO);
                format_countdown(left, precision.abbreviated())
            }
        }
    }

    /// Freeze the countdown. No-op when unset or already paused.
    pub fn pause(&self, now: DateTime<Local>) -> Option<ClientPatch> {
        if self.paused_left.is_some() {
            return None;
        }
        let date = self.next_follow_up_date?;
        let left = (date - now).to_std().unwrap_or(Duration::ZERO);

        Some(ClientPatch {
            is_paused: Some(true),
            paused_time_left: Some(Some(millis(left))),
            ..Default::default()
        })
    }

    /// Restart the countdown from the paused snapshot. No-op when not paused.
    pub fn resume(&self, now: DateTime<Local>) -> Option<ClientPatch> {
        let left = self.paused_left?;
        let next = now.checked_add_signed(to_chrono(left)).unwrap_or(now);

        Some(ClientPatch {
            next_follow_up_date: Some(Some(next)),
            is_paused: Some(false),
            paused_time_left: Some(None),
            ..Default::default()
        })
    }

    /// Clear the follow-up entirely. No-op when already unset.
    pub fn delete_follow_up(&self) -> Option<ClientPatch> {
        if self.next_follow_up_date.is_none() && self.paused_left.is_none() {
            return None;
        }
        Some(ClientPatch {
            next_follow_up_date: Some(None),
            is_paused: Some(false),
            paused_time_left: Some(None),
            ..Default::default()
        })
    }

    /// Set a new follow-up from any state: `at` if given, otherwise
    /// `offset_business_days` from `now`. Reactivates the client.
    pub fn reschedule(
        at: Option<DateTime<Local>>,
        now: DateTime<Local>,
        offset_business_days: u32,
    ) -> ClientPatch {
        let next = at.unwrap_or_else(|| default_follow_up(now, offset_business_days));
        running_from(next)
    }

    /// Log a call at `now` and schedule the next follow-up after the
    /// default offset. Reactivates the client.
    pub fn register_call(now: DateTime<Local>, offset_business_days: u32) -> ClientPatch {
        ClientPatch {
            append_call: Some(CallRecord::new(now)),
            ..running_from(default_follow_up(now, offset_business_days))
        }
    }
}

/// Interpret a user-supplied reschedule date. Blank or unparsable input
/// yields `None` (use the default offset).
pub fn resolve_reschedule_input(input: Option<&str>) -> Option<DateTime<Local>> {
    let raw = input.map(str::trim).filter(|s| !s.is_empty())?;
    let parsed = parse_local_datetime(raw);
    if parsed.is_none() {
        warn!(input = raw, "Unparsable follow-up date, using default offset");
    }
    parsed
}

/// `now` plus the default offset
pub fn default_follow_up(now: DateTime<Local>, offset_business_days: u32) -> DateTime<Local> {
    add_business_days(now, i64::from(offset_business_days))
}

fn running_from(next: DateTime<Local>) -> ClientPatch {
    ClientPatch {
        next_follow_up_date: Some(Some(next)),
        is_paused: Some(false),
        paused_time_left: Some(None),
        status: Some(ClientStatus::Active),
        ..Default::default()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_api::NewClient;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn record_after(patch: &ClientPatch) -> ClientRecord {
        let mut record = ClientRecord::from_new(NewClient::new("Acme"));
        record.apply(patch);
        record
    }

    #[test]
    fn phase_boundaries() {
        let t0 = local(2025, 1, 15, 10, 0);
        let clock = FollowUpClock::new(Some(t0), None);
        let micro = chrono::Duration::microseconds(1);

        assert_eq!(clock.phase(t0 - micro), FollowUpPhase::Running);
        assert_eq!(clock.phase(t0), FollowUpPhase::Due);
        assert_eq!(clock.phase(t0 + micro), FollowUpPhase::Due);
        assert_eq!(FollowUpClock::new(None, None).phase(t0), FollowUpPhase::Unset);
        assert_eq!(
            FollowUpClock::new(Some(t0), Some(Duration::ZERO)).phase(t0 + micro),
            FollowUpPhase::Paused
        );
    }

    #[test]
    fn paused_without_snapshot_reads_as_running() {
        let t0 = local(2025, 1, 15, 10, 0);
        let mut record = ClientRecord::from_new(NewClient::new("Acme"));
        record.next_follow_up_date = Some(t0);
        record.is_paused = true;

        let clock = FollowUpClock::from_record(&record);
        assert!(!clock.is_paused());
        assert_eq!(clock.phase(t0 - chrono::Duration::hours(1)), FollowUpPhase::Running);
    }

    #[test]
    fn register_call_schedules_seven_business_days() {
        // Wednesday
        let t0 = local(2025, 1, 15, 10, 30);
        let patch = FollowUpClock::register_call(t0, 7);
        let record = record_after(&patch);

        let next = record.next_follow_up_date.unwrap();
        assert_eq!(next.date_naive(), chrono::NaiveDate::from_ymd_opt(2025, 1, 24).unwrap());
        assert_eq!(next.weekday(), Weekday::Fri);
        assert_eq!((next.hour(), next.minute()), (10, 30));
        assert_eq!(record.status, ClientStatus::Active);
        assert_eq!(record.follow_ups.len(), 1);
        assert_eq!(record.follow_ups[0].timestamp, t0);
    }

    #[test]
    fn register_call_clears_pause_and_reactivates() {
        let t0 = local(2025, 1, 15, 10, 0);
        let mut record = ClientRecord::from_new(NewClient::new("Acme"));
        record.next_follow_up_date = Some(t0);
        record.is_paused = true;
        record.paused_time_left = Some(5_000);
        record.status = ClientStatus::Suspended;

        record.apply(&FollowUpClock::register_call(t0, 7));
        assert!(!record.is_paused);
        assert!(record.paused_time_left.is_none());
        assert_eq!(record.status, ClientStatus::Active);
    }

    #[test]
    fn pause_then_resume_restores_date() {
        let t0 = local(2025, 1, 15, 10, 0);
        let target = t0 + chrono::Duration::days(5) + chrono::Duration::milliseconds(250);
        let now = t0 + chrono::Duration::hours(3);

        let paused = record_after(&FollowUpClock::new(Some(target), None).pause(now).unwrap());
        assert!(paused.is_paused);

        let clock = FollowUpClock::from_record(&paused);
        let resumed = record_after(&clock.resume(now).unwrap());
        let drift = (resumed.next_follow_up_date.unwrap() - target).abs();
        assert!(drift < chrono::Duration::milliseconds(1));
        assert!(!resumed.is_paused);
        assert!(resumed.paused_time_left.is_none());
    }

    #[test]
    fn pause_and_resume_across_days() {
        // 7 business days from Wednesday 2025-01-15 is Friday 2025-01-24
        let t0 = local(2025, 1, 15, 10, 0);
        let target = default_follow_up(t0, 7);
        let pause_at = t0 + chrono::Duration::days(3);

        let patch = FollowUpClock::new(Some(target), None).pause(pause_at).unwrap();
        let expected_left = (target - pause_at).num_milliseconds() as u64;
        assert_eq!(patch.paused_time_left, Some(Some(expected_left)));

        let resume_at = t0 + chrono::Duration::days(10);
        let clock = FollowUpClock::new(Some(target), Some(Duration::from_millis(expected_left)));
        let resumed = clock.resume(resume_at).unwrap();
        assert_eq!(
            resumed.next_follow_up_date,
            Some(Some(resume_at + chrono::Duration::milliseconds(expected_left as i64)))
        );
    }

    #[test]
    fn pause_when_due_snapshots_zero() {
        let t0 = local(2025, 1, 15, 10, 0);
        let patch = FollowUpClock::new(Some(t0), None)
            .pause(t0 + chrono::Duration::hours(2))
            .unwrap();
        assert_eq!(patch.paused_time_left, Some(Some(0)));

        // Zero snapshot resumes straight into Due
        let later = t0 + chrono::Duration::days(2);
        let clock = FollowUpClock::new(Some(t0), Some(Duration::ZERO));
        let resumed = record_after(&clock.resume(later).unwrap());
        assert!(FollowUpClock::from_record(&resumed).is_due(later));
    }

    #[test]
    fn no_op_transitions() {
        let t0 = local(2025, 1, 15, 10, 0);
        let unset = FollowUpClock::new(None, None);
        assert!(unset.pause(t0).is_none());
        assert!(unset.resume(t0).is_none());
        assert!(unset.delete_follow_up().is_none());

        let running = FollowUpClock::new(Some(t0), None);
        assert!(running.resume(t0).is_none());

        let paused = FollowUpClock::new(Some(t0), Some(Duration::from_secs(60)));
        assert!(paused.pause(t0).is_none());
    }

    #[test]
    fn delete_clears_everything() {
        let t0 = local(2025, 1, 15, 10, 0);
        let mut record = ClientRecord::from_new(NewClient::new("Acme"));
        record.next_follow_up_date = Some(t0);
        record.is_paused = true;
        record.paused_time_left = Some(1_000);

        let patch = FollowUpClock::from_record(&record).delete_follow_up().unwrap();
        record.apply(&patch);
        assert!(record.next_follow_up_date.is_none());
        assert!(!record.is_paused);
        assert!(record.paused_time_left.is_none());
    }

    #[test]
    fn reschedule_explicit_and_default() {
        let now = local(2025, 1, 15, 10, 0);
        let at = local(2025, 2, 1, 9, 0);

        let explicit = record_after(&FollowUpClock::reschedule(Some(at), now, 7));
        assert_eq!(explicit.next_follow_up_date, Some(at));
        assert_eq!(explicit.status, ClientStatus::Active);

        let default = record_after(&FollowUpClock::reschedule(None, now, 7));
        assert_eq!(default.next_follow_up_date, Some(local(2025, 1, 24, 10, 0)));
        assert!(default.follow_ups.is_empty());
    }

    #[test]
    fn reschedule_input_resolution() {
        assert!(resolve_reschedule_input(None).is_none());
        assert!(resolve_reschedule_input(Some("  ")).is_none());
        assert!(resolve_reschedule_input(Some("next tuesday")).is_none());
        assert_eq!(
            resolve_reschedule_input(Some("2025-02-01T09:00")),
            Some(local(2025, 2, 1, 9, 0))
        );
    }

    #[test]
    fn labels() {
        let t0 = local(2025, 1, 15, 10, 0);
        let target = t0 + chrono::Duration::seconds(2 * 86_400 + 3 * 3600 + 4 * 60 + 5);
        let running = FollowUpClock::new(Some(target), None);

        assert_eq!(running.remaining_label(t0, Precision::Full), "2d 3h 4m");
        assert_eq!(running.remaining_label(t0, Precision::Abbreviated), "2d 3h 4m");

        let soon = FollowUpClock::new(Some(t0 + chrono::Duration::seconds(65)), None);
        assert_eq!(soon.remaining_label(t0, Precision::Full), "1m 5s");
        assert_eq!(soon.remaining_label(t0, Precision::Abbreviated), "1m");

        assert_eq!(running.remaining_label(target, Precision::Full), "due");
        assert_eq!(
            FollowUpClock::new(None, None).remaining_label(t0, Precision::Full),
            "no follow-up"
        );

        let paused = FollowUpClock::new(Some(target), Some(Duration::from_secs(3600)));
        assert_eq!(paused.remaining_label(t0, Precision::Full), "paused: 1h");
        assert_eq!(paused.remaining_label(t0, Precision::Abbreviated), "paused");
    }

    #[test]
    fn refresh_intervals() {
        assert_eq!(Precision::Full.refresh_interval(), Duration::from_secs(1));
        assert_eq!(Precision::Abbreviated.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn overdue_measure() {
        let t0 = local(2025, 1, 15, 10, 0);
        let clock = FollowUpClock::new(Some(t0), None);
        assert!(clock.overdue_by(t0 - chrono::Duration::seconds(1)).is_none());
        assert_eq!(
            clock.overdue_by(t0 + chrono::Duration::hours(25)),
            Some(chrono::Duration::hours(25))
        );
        let paused = FollowUpClock::new(Some(t0), Some(Duration::ZERO));
        assert!(paused.overdue_by(t0 + chrono::Duration::days(3)).is_none());
    }
}
