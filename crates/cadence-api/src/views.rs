//! Read-only views for listing clients

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use cadence_util::ClientId;

use crate::ClientStatus;

/// Follow-up phase as shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpPhase {
    /// No follow-up scheduled
    Unset,
    /// Counting down
    Running,
    /// Countdown frozen
    Paused,
    /// Target time reached
    Due,
}

/// One row of the client list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: ClientId,
    pub company_name: String,
    pub phone: String,
    pub status: ClientStatus,
    pub phase: FollowUpPhase,
    /// Human-readable remaining time ("2d 3h 4m", "due", "paused", ...)
    pub remaining: String,
    pub next_follow_up_date: Option<DateTime<Local>>,
    pub last_call: Option<DateTime<Local>>,
}

/// Client list split the way the list screen shows it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientListing {
    pub active: Vec<ClientSummary>,
    pub suspended: Vec<ClientSummary>,
}

impl ClientListing {
    pub fn len(&self) -> usize {
        self.active.len() + self.suspended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
