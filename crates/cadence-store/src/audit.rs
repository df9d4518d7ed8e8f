//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use cadence_util::ClientId;

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Sweep service started
    ServiceStarted,

    /// Sweep service stopped
    ServiceStopped,

    ClientCreated {
        client_id: ClientId,
        company_name: String,
    },

    ClientsImported {
        imported: usize,
        skipped: usize,
    },

    ClientDeleted {
        client_id: ClientId,
    },

    /// Call registered, next follow-up set from the default offset
    CallRegistered {
        client_id: ClientId,
        next_follow_up: DateTime<Local>,
    },

    FollowUpRescheduled {
        client_id: ClientId,
        next_follow_up: DateTime<Local>,
        explicit: bool,
    },

    FollowUpPaused {
        client_id: ClientId,
        time_left_ms: u64,
    },

    FollowUpResumed {
        client_id: ClientId,
        next_follow_up: DateTime<Local>,
    },

    FollowUpCleared {
        client_id: ClientId,
    },

    /// Due notification emitted by the sweep
    FollowUpDue {
        client_id: ClientId,
        due_at: DateTime<Local>,
    },

    /// Client suspended by the sweep
    ClientSuspended {
        client_id: ClientId,
        due_at: DateTime<Local>,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: cadence_util::now(),
            event,
        }
    }
}
