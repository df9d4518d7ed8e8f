//! Core events emitted by the sweep

use cadence_notify::DueNotice;
use cadence_util::ClientId;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Events emitted by [`crate::FollowUpScheduler::sweep`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A follow-up became due and has not been notified yet
    FollowUpDue {
        client_id: ClientId,
        company_name: String,
        due_at: DateTime<Local>,
    },

    /// A client was overdue past the grace window and got suspended
    ClientSuspended {
        client_id: ClientId,
        company_name: String,
        due_at: DateTime<Local>,
    },
}

impl CoreEvent {
    pub fn client_id(&self) -> &ClientId {
        match self {
            CoreEvent::FollowUpDue { client_id, .. } | CoreEvent::ClientSuspended { client_id, .. } => {
                client_id
            }
        }
    }

    /// Notice to deliver for this event. Only due follow-ups notify.
    pub fn notice(&self, title: &str) -> Option<DueNotice> {
        match self {
            CoreEvent::FollowUpDue {
                client_id,
                company_name,
                ..
            } => Some(DueNotice::new(client_id.clone(), company_name, title)),
            CoreEvent::ClientSuspended { .. } => None,
        }
    }
}
