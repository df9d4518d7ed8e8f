//! User actions on clients and their follow-ups

use cadence_api::{ClientListing, ClientPatch, ClientRecord, ClientSummary, NewClient};
use cadence_config::FollowUpPolicy;
use cadence_store::{AuditEvent, AuditEventType, ClientStore, ImportSummary, Store, StoreResult};
use cadence_util::ClientId;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{FollowUpClock, Precision, resolve_reschedule_input};

/// Result of a follow-up action
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// The record changed and was written through the store
    Applied(ClientRecord),
    /// Nothing to do in the current phase (pause when unset, resume when
    /// running, ...); the record is returned as it stands
    Unchanged(ClientRecord),
}

impl ActionOutcome {
    pub fn record(&self) -> &ClientRecord {
        match self {
            ActionOutcome::Applied(r) | ActionOutcome::Unchanged(r) => r,
        }
    }

    pub fn into_record(self) -> ClientRecord {
        match self {
            ActionOutcome::Applied(r) | ActionOutcome::Unchanged(r) => r,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }
}

/// Applies user actions to client records.
///
/// Each action derives its patch from the record as it stands inside the
/// store lock, so a concurrent sweep can never interleave with it.
pub struct FollowUpEngine {
    clients: Arc<ClientStore>,
    policy: FollowUpPolicy,
}

impl FollowUpEngine {
    pub fn new(clients: Arc<ClientStore>, policy: FollowUpPolicy) -> Self {
        debug!(
            offset_business_days = policy.default_offset_business_days,
            grace_secs = policy.suspension_grace.as_secs(),
            "Follow-up engine initialized"
        );
        Self { clients, policy }
    }

    pub fn clients(&self) -> &Arc<ClientStore> {
        &self.clients
    }

    pub fn policy(&self) -> &FollowUpPolicy {
        &self.policy
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.clients.backend().append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    pub fn create_client(&self, new: NewClient) -> StoreResult<ClientRecord> {
        let record = self.clients.create(new)?;

        self.audit(AuditEventType::ClientCreated {
            client_id: record.id.clone(),
            company_name: record.company_name.clone(),
        });
        info!(client_id = %record.id, company = %record.company_name, "Client created");

        Ok(record)
    }

    pub fn import_clients(&self, new_clients: Vec<NewClient>) -> StoreResult<ImportSummary> {
        let summary = self.clients.import(new_clients)?;

        self.audit(AuditEventType::ClientsImported {
            imported: summary.imported,
            skipped: summary.skipped,
        });
        info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "Clients imported"
        );

        Ok(summary)
    }

    pub fn delete_client(&self, id: &ClientId) -> StoreResult<ClientRecord> {
        let removed = self.clients.delete(id)?;

        self.audit(AuditEventType::ClientDeleted {
            client_id: id.clone(),
        });
        info!(client_id = %id, "Client deleted");

        Ok(removed)
    }

    /// Log a call and schedule the next follow-up after the default offset
    pub fn register_call(&self, id: &ClientId, now: DateTime<Local>) -> StoreResult<ClientRecord> {
        let patch = FollowUpClock::register_call(now, self.policy.default_offset_business_days);
        let record = self.clients.update(id, &patch)?;

        if let Some(next) = record.next_follow_up_date {
            self.audit(AuditEventType::CallRegistered {
                client_id: id.clone(),
                next_follow_up: next,
            });
            info!(client_id = %id, next_follow_up = %next, "Call registered");
        }

        Ok(record)
    }

    /// Move the follow-up to `at`, or to the default offset from `now`
    pub fn reschedule(
        &self,
        id: &ClientId,
        at: Option<DateTime<Local>>,
        now: DateTime<Local>,
    ) -> StoreResult<ClientRecord> {
        let patch = FollowUpClock::reschedule(at, now, self.policy.default_offset_business_days);
        let record = self.clients.update(id, &patch)?;

        if let Some(next) = record.next_follow_up_date {
            self.audit(AuditEventType::FollowUpRescheduled {
                client_id: id.clone(),
                next_follow_up: next,
                explicit: at.is_some(),
            });
            info!(client_id = %id, next_follow_up = %next, explicit = at.is_some(), "Follow-up rescheduled");
        }

        Ok(record)
    }

    /// Reschedule from raw user input; unusable input means the default
    /// offset
    pub fn reschedule_from_input(
        &self,
        id: &ClientId,
        input: Option<&str>,
        now: DateTime<Local>,
    ) -> StoreResult<ClientRecord> {
        self.reschedule(id, resolve_reschedule_input(input), now)
    }

    pub fn pause(&self, id: &ClientId, now: DateTime<Local>) -> StoreResult<ActionOutcome> {
        let outcome = self.transition(id, |clock| clock.pause(now))?;

        if let ActionOutcome::Applied(record) = &outcome {
            let time_left_ms = record.paused_time_left.unwrap_or(0);
            self.audit(AuditEventType::FollowUpPaused {
                client_id: id.clone(),
                time_left_ms,
            });
            info!(client_id = %id, time_left_ms, "Follow-up paused");
        }

        Ok(outcome)
    }

    pub fn resume(&self, id: &ClientId, now: DateTime<Local>) -> StoreResult<ActionOutcome> {
        let outcome = self.transition(id, |clock| clock.resume(now))?;

        if let ActionOutcome::Applied(record) = &outcome
            && let Some(next) = record.next_follow_up_date
        {
            self.audit(AuditEventType::FollowUpResumed {
                client_id: id.clone(),
                next_follow_up: next,
            });
            info!(client_id = %id, next_follow_up = %next, "Follow-up resumed");
        }

        Ok(outcome)
    }

    pub fn delete_follow_up(&self, id: &ClientId) -> StoreResult<ActionOutcome> {
        let outcome = self.transition(id, |clock| clock.delete_follow_up())?;

        if outcome.is_applied() {
            self.audit(AuditEventType::FollowUpCleared {
                client_id: id.clone(),
            });
            info!(client_id = %id, "Follow-up cleared");
        }

        Ok(outcome)
    }

    fn transition<F>(&self, id: &ClientId, f: F) -> StoreResult<ActionOutcome>
    where
        F: Fn(&FollowUpClock) -> Option<ClientPatch>,
    {
        match self
            .clients
            .update_with(id, |record| f(&FollowUpClock::from_record(record)))?
        {
            Some(record) => Ok(ActionOutcome::Applied(record)),
            None => {
                debug!(client_id = %id, "Follow-up action had nothing to do");
                Ok(ActionOutcome::Unchanged(self.clients.get(id)?))
            }
        }
    }

    /// One list row
    pub fn summary(
        &self,
        record: &ClientRecord,
        now: DateTime<Local>,
        precision: Precision,
    ) -> ClientSummary {
        let clock = FollowUpClock::from_record(record);
        let phone = format!("{} {}", record.country_code, record.phone_number)
            .trim()
            .to_string();

        ClientSummary {
            id: record.id.clone(),
            company_name: record.company_name.clone(),
            phone,
            status: record.status,
            phase: clock.phase(now),
            remaining: clock.remaining_label(now, precision),
            next_follow_up_date: record.next_follow_up_date,
            last_call: record.last_call().map(|c| c.timestamp),
        }
    }

    /// Active and suspended clients, soonest follow-up first
    pub fn listing(
        &self,
        search: Option<&str>,
        now: DateTime<Local>,
        precision: Precision,
    ) -> ClientListing {
        let (active, suspended) = self.clients.partition(search);

        let rows = |mut records: Vec<ClientRecord>| -> Vec<ClientSummary> {
            records.sort_by(|a, b| {
                let key = |r: &ClientRecord| (r.next_follow_up_date.is_none(), r.next_follow_up_date);
                key(a)
                    .cmp(&key(b))
                    .then_with(|| a.company_name.cmp(&b.company_name))
            });
            records
                .iter()
                .map(|r| self.summary(r, now, precision))
                .collect()
        };

        ClientListing {
            active: rows(active),
            suspended: rows(suspended),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_api::{ClientStatus, FollowUpPhase};
    use cadence_store::MemoryStore;
    use chrono::TimeZone;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, FollowUpEngine) {
        let backend = Arc::new(MemoryStore::new());
        let clients = Arc::new(ClientStore::open(backend.clone()).unwrap());
        (backend, FollowUpEngine::new(clients, FollowUpPolicy::default()))
    }

    #[test]
    fn new_client_scenario() {
        let (backend, engine) = setup();
        let client = engine.create_client(NewClient::new("Acme")).unwrap();
        assert!(client.next_follow_up_date.is_none());
        assert_eq!(client.status, ClientStatus::Active);

        // Wednesday
        let t0 = local(2025, 1, 15, 10, 0);
        let client = engine.register_call(&client.id, t0).unwrap();
        assert_eq!(client.next_follow_up_date, Some(local(2025, 1, 24, 10, 0)));
        assert_eq!(client.status, ClientStatus::Active);

        let audits = backend.get_recent_audits(10).unwrap();
        assert!(matches!(audits[0].event, AuditEventType::CallRegistered { .. }));
        assert!(matches!(audits[1].event, AuditEventType::ClientCreated { .. }));
    }

    #[test]
    fn pause_resume_and_no_ops() {
        let (_, engine) = setup();
        let client = engine.create_client(NewClient::new("Acme")).unwrap();
        let t0 = local(2025, 1, 15, 10, 0);

        // Nothing to pause yet
        let outcome = engine.pause(&client.id, t0).unwrap();
        assert!(!outcome.is_applied());

        engine.register_call(&client.id, t0).unwrap();
        let paused = engine.pause(&client.id, t0).unwrap();
        assert!(paused.is_applied());
        assert!(paused.record().is_paused);

        // Already paused
        assert!(!engine.pause(&client.id, t0).unwrap().is_applied());

        let resumed = engine.resume(&client.id, t0).unwrap().into_record();
        assert!(!resumed.is_paused);
        assert_eq!(resumed.next_follow_up_date, Some(local(2025, 1, 24, 10, 0)));

        assert!(!engine.resume(&client.id, t0).unwrap().is_applied());
    }

    #[test]
    fn reschedule_reactivates_suspended_client() {
        let (_, engine) = setup();
        let client = engine.create_client(NewClient::new("Acme")).unwrap();
        engine
            .clients()
            .update(&client.id, &ClientPatch::status(ClientStatus::Suspended))
            .unwrap();

        let now = local(2025, 1, 15, 10, 0);
        let at = local(2025, 1, 20, 9, 0);
        let record = engine.reschedule(&client.id, Some(at), now).unwrap();
        assert_eq!(record.status, ClientStatus::Active);
        assert_eq!(record.next_follow_up_date, Some(at));
    }

    #[test]
    fn bad_reschedule_input_uses_default_offset() {
        let (_, engine) = setup();
        let client = engine.create_client(NewClient::new("Acme")).unwrap();
        let now = local(2025, 1, 15, 10, 0);

        let record = engine
            .reschedule_from_input(&client.id, Some("not a date"), now)
            .unwrap();
        assert_eq!(record.next_follow_up_date, Some(local(2025, 1, 24, 10, 0)));
    }

    #[test]
    fn delete_follow_up_then_no_op() {
        let (_, engine) = setup();
        let client = engine.create_client(NewClient::new("Acme")).unwrap();
        let t0 = local(2025, 1, 15, 10, 0);
        engine.register_call(&client.id, t0).unwrap();

        let cleared = engine.delete_follow_up(&client.id).unwrap();
        assert!(cleared.is_applied());
        assert!(cleared.record().next_follow_up_date.is_none());
        assert!(!engine.delete_follow_up(&client.id).unwrap().is_applied());
    }

    #[test]
    fn unknown_client_is_an_error() {
        let (_, engine) = setup();
        let missing = ClientId::new("missing");
        let now = local(2025, 1, 15, 10, 0);
        assert!(engine.register_call(&missing, now).is_err());
        assert!(engine.pause(&missing, now).is_err());
        assert!(engine.delete_client(&missing).is_err());
    }

    #[test]
    fn listing_orders_and_splits() {
        let (_, engine) = setup();
        let now = local(2025, 1, 15, 10, 0);
        let later = engine.create_client(NewClient::new("Later")).unwrap();
        let soon = engine.create_client(NewClient::new("Soon")).unwrap();
        let none = engine.create_client(NewClient::new("Unscheduled")).unwrap();
        let gone = engine.create_client(NewClient::new("Gone")).unwrap();

        engine
            .reschedule(&later.id, Some(local(2025, 2, 1, 9, 0)), now)
            .unwrap();
        engine
            .reschedule(&soon.id, Some(local(2025, 1, 15, 9, 0)), now)
            .unwrap();
        engine
            .clients()
            .update(&gone.id, &ClientPatch::status(ClientStatus::Suspended))
            .unwrap();

        let listing = engine.listing(None, now, Precision::Full);
        let names: Vec<_> = listing.active.iter().map(|s| s.company_name.as_str()).collect();
        assert_eq!(names, vec!["Soon", "Later", "Unscheduled"]);
        assert_eq!(listing.active[0].phase, FollowUpPhase::Due);
        assert_eq!(listing.active[0].remaining, "due");
        assert_eq!(listing.active[2].id, none.id);
        assert_eq!(listing.suspended.len(), 1);
        assert_eq!(listing.len(), 4);
    }
}
