//! Store trait definitions

use cadence_api::ClientRecord;
use cadence_util::ClientId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::{AuditEvent, StoreResult};

/// Key holding the JSON array of client records
pub const CLIENTS_KEY: &str = "crm_clients";

/// Key holding the scheduler's notified set
pub const NOTIFIED_KEY: &str = "notified_followups_due";

/// Key holding the persisted schema version
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Main store trait: a key/value map of JSON documents plus an audit log.
///
/// Typed accessors for the documents cadence keeps are provided on top of
/// `get_value`/`put_value` so every backend encodes them identically.
pub trait Store: Send + Sync {
    // Key/value documents

    /// Read the raw JSON stored under `key`
    fn get_value(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the raw JSON stored under `key`
    fn put_value(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Replace the value under `key` only if it still equals `expected`
    /// (`None` meaning absent). Returns false, writing nothing, if another
    /// writer changed it first.
    fn swap_value(&self, key: &str, expected: Option<&str>, value: &str) -> StoreResult<bool>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;

    // Typed documents

    /// Load every client record that decodes. Missing key means no clients
    /// yet.
    fn load_clients(&self) -> StoreResult<Vec<ClientRecord>> {
        match self.get_value(CLIENTS_KEY)? {
            Some(json) => Ok(ClientDocument::decode(&json)?.clients),
            None => Ok(Vec::new()),
        }
    }

    /// Load the scheduler's durable state. `now` stamps entries migrated
    /// from the legacy plain-id list.
    fn load_scheduler_state(&self, now: DateTime<Local>) -> StoreResult<SchedulerState> {
        match self.get_value(NOTIFIED_KEY)? {
            Some(json) => SchedulerState::decode(&json, now),
            None => Ok(SchedulerState::default()),
        }
    }

    /// Save the scheduler's durable state
    fn save_scheduler_state(&self, state: &SchedulerState) -> StoreResult<()> {
        let json = serde_json::to_string(state)?;
        self.put_value(NOTIFIED_KEY, &json)
    }
}

/// The stored client array.
///
/// Entries that do not decode as a client are kept verbatim in `undecoded`
/// and written back after the decoded records, so nothing is lost by a
/// full-array write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientDocument {
    pub clients: Vec<ClientRecord>,
    pub undecoded: Vec<serde_json::Value>,
}

impl ClientDocument {
    pub fn decode(json: &str) -> StoreResult<Self> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut document = Self::default();

        for (index, value) in values.into_iter().enumerate() {
            match ClientRecord::deserialize(&value) {
                Ok(record) => document.clients.push(record),
                Err(e) => {
                    warn!(index, error = %e, "Keeping undecodable client record as is");
                    document.undecoded.push(value);
                }
            }
        }

        Ok(document)
    }

    pub fn encode(&self) -> StoreResult<String> {
        let mut values = self
            .clients
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        values.extend(self.undecoded.iter().cloned());
        Ok(serde_json::to_string(&values)?)
    }
}

impl From<Vec<ClientRecord>> for ClientDocument {
    fn from(clients: Vec<ClientRecord>) -> Self {
        Self {
            clients,
            undecoded: Vec::new(),
        }
    }
}

/// Durable state owned by the follow-up scheduler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Clients notified for their current due event, with the time the
    /// notification was emitted
    pub notified: BTreeMap<ClientId, DateTime<Local>>,
}

/// On-disk forms of the notified set
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredNotified {
    Current(SchedulerState),
    /// Plain list of client ids written by earlier versions
    Legacy(Vec<ClientId>),
}

impl SchedulerState {
    fn decode(json: &str, now: DateTime<Local>) -> StoreResult<Self> {
        Ok(match serde_json::from_str::<StoredNotified>(json)? {
            StoredNotified::Current(state) => state,
            StoredNotified::Legacy(ids) => Self {
                notified: ids.into_iter().map(|id| (id, now)).collect(),
            },
        })
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn legacy_notified_list_is_migrated() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let state = SchedulerState::decode(r#"["c-1","c-2"]"#, now).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.notified.get(&ClientId::new("c-1")), Some(&now));
    }

    #[test]
    fn current_notified_form_round_trips() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let mut state = SchedulerState::default();
        state.notified.insert(ClientId::new("c-1"), now);

        let json = serde_json::to_string(&state).unwrap();
        let later = now + chrono::Duration::days(1);
        assert_eq!(SchedulerState::decode(&json, later).unwrap(), state);
    }

    #[test]
    fn undecodable_client_is_kept_aside() {
        let json = r#"[{"id":"c-1","companyName":"Acme"},{"companyName":"No id"},{"id":"c-3","status":"suspended"}]"#;
        let document = ClientDocument::decode(json).unwrap();
        assert_eq!(document.clients.len(), 2);
        assert_eq!(document.clients[1].id.as_str(), "c-3");
        assert_eq!(document.undecoded.len(), 1);

        // Written back after the decoded records
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&document.encode().unwrap()).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[2]["companyName"], "No id");
        assert_eq!(ClientDocument::decode(&document.encode().unwrap()).unwrap(), document);
    }

    #[test]
    fn legacy_nulls_decode() {
        let json = r#"[{"id":"c-1","companyName":"Legacy","countryCode":null,"isPaused":null,"status":null}]"#;
        let document = ClientDocument::decode(json).unwrap();
        assert_eq!(document.clients.len(), 1);
        assert!(document.undecoded.is_empty());
        assert_eq!(document.clients[0].country_code, "+54");
    }

    #[test]
    fn non_array_is_an_error() {
        assert!(ClientDocument::decode(r#"{"id":"c-1"}"#).is_err());
    }
}
