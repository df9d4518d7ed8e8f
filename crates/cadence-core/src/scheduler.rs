//! Periodic sweep: due notifications and auto-suspension

use cadence_api::{ClientPatch, ClientRecord, ClientStatus};
use cadence_config::FollowUpPolicy;
use cadence_store::{AuditEvent, AuditEventType, ClientStore, SchedulerState, Store};
use cadence_util::{ClientId, to_chrono};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{CoreEvent, FollowUpClock};

/// Evaluates every client on each sweep.
///
/// Owns the notified set: client ids already notified for their current due
/// event, with the time of notification. Notification looks only at the
/// stored follow-up date, paused or not; suspension skips paused clients.
/// An entry is dropped once the stored date is no longer past (rescheduled
/// into the future, cleared, or the client deleted), which re-arms the
/// notification. An entry older than the client's current due date also
/// re-arms it, so a reschedule that lands between two sweeps is not missed.
pub struct FollowUpScheduler {
    clients: Arc<ClientStore>,
    policy: FollowUpPolicy,
    state: SchedulerState,
    /// State changed but the last save failed
    unsaved: bool,
}

impl FollowUpScheduler {
    /// Load durable state from the client store's backend. A state that
    /// cannot be read starts empty.
    pub fn new(clients: Arc<ClientStore>, policy: FollowUpPolicy, now: DateTime<Local>) -> Self {
        let state = clients
            .backend()
            .load_scheduler_state(now)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load scheduler state, starting empty");
                SchedulerState::default()
            });

        debug!(notified = state.len(), "Scheduler state loaded");

        Self {
            clients,
            policy,
            state,
            unsaved: false,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn policy(&self) -> &FollowUpPolicy {
        &self.policy
    }

    /// Run one sweep at `now`.
    ///
    /// Clients are evaluated independently; a failed write for one is logged
    /// and the sweep moves on. Returns the events to deliver.
    pub fn sweep(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let clients = self.clients.list();
        let mut events = Vec::new();

        let mut changed = self.prune(&clients, now);

        for client in &clients {
            if let Some(event) = self.check_due(client, now) {
                changed = true;
                events.push(event);
            }

            let clock = FollowUpClock::from_record(client);
            if let Some(event) = self.check_suspension(client, &clock, now) {
                events.push(event);
            }
        }

        if changed || self.unsaved {
            self.save_state();
        }

        debug!(
            clients = clients.len(),
            events = events.len(),
            notified = self.state.len(),
            "Sweep complete"
        );

        events
    }

    /// Drop entries whose client is gone or whose stored date is not past
    fn prune(&mut self, clients: &[ClientRecord], now: DateTime<Local>) -> bool {
        let dates: HashMap<&ClientId, Option<DateTime<Local>>> = clients
            .iter()
            .map(|c| (&c.id, c.next_follow_up_date))
            .collect();

        let before = self.state.len();
        self.state
            .notified
            .retain(|id, _| matches!(dates.get(id), Some(Some(due)) if *due <= now));

        let pruned = before - self.state.len();
        if pruned > 0 {
            debug!(pruned, "Re-armed follow-up notifications");
        }
        pruned > 0
    }

    fn check_due(&mut self, client: &ClientRecord, now: DateTime<Local>) -> Option<CoreEvent> {
        let due_at = client.next_follow_up_date.filter(|due| *due <= now)?;

        let already = self
            .state
            .notified
            .get(&client.id)
            .is_some_and(|notified_at| due_at <= *notified_at);
        if already {
            return None;
        }

        self.state.notified.insert(client.id.clone(), now);

        self.audit(AuditEventType::FollowUpDue {
            client_id: client.id.clone(),
            due_at,
        });

        info!(client_id = %client.id, due_at = %due_at, "Follow-up due");

        Some(CoreEvent::FollowUpDue {
            client_id: client.id.clone(),
            company_name: client.company_name.clone(),
            due_at,
        })
    }

    fn check_suspension(
        &self,
        client: &ClientRecord,
        clock: &FollowUpClock,
        now: DateTime<Local>,
    ) -> Option<CoreEvent> {
        let grace = to_chrono(self.policy.suspension_grace);
        let overdue = |record: &ClientRecord, clock: &FollowUpClock| {
            record.status != ClientStatus::Suspended
                && clock.overdue_by(now).is_some_and(|d| d > grace)
        };

        if !overdue(client, clock) {
            return None;
        }

        // Re-check under the store lock; a user action may have landed since
        // the snapshot was taken
        let result = self.clients.update_with(&client.id, |current| {
            overdue(current, &FollowUpClock::from_record(current))
                .then(|| ClientPatch::status(ClientStatus::Suspended))
        });

        match result {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            // The in-memory record is suspended; the next write persists it
            Err(e) if e.is_persistence() => {
                warn!(client_id = %client.id, error = %e, "Suspension not persisted");
            }
            Err(e) => {
                warn!(client_id = %client.id, error = %e, "Failed to suspend client");
                return None;
            }
        }

        let due_at = clock.next_follow_up_date()?;

        self.audit(AuditEventType::ClientSuspended {
            client_id: client.id.clone(),
            due_at,
        });

        info!(client_id = %client.id, due_at = %due_at, "Client suspended");

        Some(CoreEvent::ClientSuspended {
            client_id: client.id.clone(),
            company_name: client.company_name.clone(),
            due_at,
        })
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.clients.backend().append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    fn save_state(&mut self) {
        match self.clients.backend().save_scheduler_state(&self.state) {
            Ok(()) => self.unsaved = false,
            Err(e) => {
                warn!(error = %e, "Failed to save scheduler state");
                self.unsaved = true;
            }
        }
    }
}
