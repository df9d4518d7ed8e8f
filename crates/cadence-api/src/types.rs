//! Client record types shared by the store, the engine and the CLI

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use cadence_util::{CallId, ClientId};
use std::time::Duration;

/// Default phone country code for records that predate the field
pub const DEFAULT_COUNTRY_CODE: &str = "+54";

/// Client lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    /// Overdue beyond the grace window while not paused
    Suspended,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientStatus::Active => write!(f, "active"),
            ClientStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Sales classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientType::A => "A",
            ClientType::B => "B",
            ClientType::C => "C",
            ClientType::D => "D",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(ClientType::A),
            "B" => Ok(ClientType::B),
            "C" => Ok(ClientType::C),
            "D" => Ok(ClientType::D),
            other => Err(format!("unknown client type '{}', expected A, B, C or D", other)),
        }
    }
}

/// A registered call in the client's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    pub timestamp: DateTime<Local>,
}

impl CallRecord {
    pub fn new(timestamp: DateTime<Local>) -> Self {
        Self {
            id: CallId::new(),
            timestamp,
        }
    }
}

/// A client as persisted in the `crm_clients` array.
///
/// Field names follow the stored JSON so data written by earlier versions
/// loads unchanged. Every field other than `id` has a default, used both
/// when the field is missing and when it is `null`; fields this
/// crate does not model (notes, budgets, attachments, ...) are kept in
/// `extra` and written back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: ClientId,

    #[serde(default, deserialize_with = "null_as_default")]
    pub company_name: String,

    #[serde(default = "default_country_code", deserialize_with = "country_code_or_default")]
    pub country_code: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub phone_number: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub industry: String,

    /// 0-5
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: u8,

    #[serde(default)]
    pub client_type: Option<ClientType>,

    /// Call history, oldest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub follow_ups: Vec<CallRecord>,

    /// When the next contact is due. None means no follow-up is scheduled.
    #[serde(default)]
    pub next_follow_up_date: Option<DateTime<Local>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub is_paused: bool,

    /// Time left (ms) captured at pause. Present iff `is_paused`.
    #[serde(default)]
    pub paused_time_left: Option<u64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ClientStatus,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_string()
}

/// Read `null` as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Blank or `null` country codes fall back to the default
fn country_code_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|code| !code.trim().is_empty())
        .unwrap_or_else(default_country_code))
}

impl ClientRecord {
    /// Build a fresh record: no follow-up, running, active.
    pub fn from_new(new: NewClient) -> Self {
        Self {
            id: ClientId::generate(),
            company_name: new.company_name,
            country_code: new.country_code.unwrap_or_else(default_country_code),
            phone_number: new.phone_number,
            industry: new.industry,
            rating: new.rating.min(5),
            client_type: new.client_type,
            follow_ups: Vec::new(),
            next_follow_up_date: None,
            is_paused: false,
            paused_time_left: None,
            status: ClientStatus::Active,
            extra: serde_json::Map::new(),
        }
    }

    /// Paused snapshot as a duration
    pub fn paused_left(&self) -> Option<Duration> {
        self.paused_time_left.map(Duration::from_millis)
    }

    /// Full phone number used for duplicate detection
    pub fn phone_key(&self) -> String {
        format!("{}{}", self.country_code, self.phone_number)
    }

    /// Most recent registered call
    pub fn last_call(&self) -> Option<&CallRecord> {
        self.follow_ups.last()
    }

    /// Restore the pause invariant on data loaded from older versions.
    ///
    /// Returns true if anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;

        if !self.is_paused && self.paused_time_left.is_some() {
            self.paused_time_left = None;
            changed = true;
        }

        // A pause without a snapshot cannot be resumed; treat it as running.
        if self.is_paused && self.paused_time_left.is_none() {
            self.is_paused = false;
            changed = true;
        }

        if self.rating > 5 {
            self.rating = 5;
            changed = true;
        }

        changed
    }

    /// Apply a patch field by field
    pub fn apply(&mut self, patch: &ClientPatch) {
        if let Some(v) = &patch.company_name {
            self.company_name = v.clone();
        }
        if let Some(v) = &patch.country_code {
            self.country_code = v.clone();
        }
        if let Some(v) = &patch.phone_number {
            self.phone_number = v.clone();
        }
        if let Some(v) = &patch.industry {
            self.industry = v.clone();
        }
        if let Some(v) = patch.rating {
            self.rating = v.min(5);
        }
        if let Some(v) = patch.client_type {
            self.client_type = v;
        }
        if let Some(call) = &patch.append_call {
            self.follow_ups.push(call.clone());
        }
        if let Some(v) = patch.next_follow_up_date {
            self.next_follow_up_date = v;
        }
        if let Some(v) = patch.is_paused {
            self.is_paused = v;
        }
        if let Some(v) = patch.paused_time_left {
            self.paused_time_left = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
    }
}

/// Input for creating a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub company_name: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub client_type: Option<ClientType>,
}

impl NewClient {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, country_code: impl Into<String>, phone_number: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self.phone_number = phone_number.into();
        self
    }

    /// Phone key as it will be stored
    pub fn phone_key(&self) -> String {
        format!(
            "{}{}",
            self.country_code.as_deref().unwrap_or(DEFAULT_COUNTRY_CODE),
            self.phone_number
        )
    }
}

/// Partial update merged into a record by the store.
///
/// `None` leaves a field untouched. For nullable fields the inner option is
/// the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientPatch {
    pub company_name: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub industry: Option<String>,
    pub rating: Option<u8>,
    pub client_type: Option<Option<ClientType>>,
    pub append_call: Option<CallRecord>,
    pub next_follow_up_date: Option<Option<DateTime<Local>>>,
    pub is_paused: Option<bool>,
    pub paused_time_left: Option<Option<u64>>,
    pub status: Option<ClientStatus>,
}

impl ClientPatch {
    pub fn status(status: ClientStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn legacy_record_gets_defaults() {
        let json = r#"{"id":"c-1","companyName":"Acme","phoneNumber":"1155550000"}"#;
        let record: ClientRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.country_code, "+54");
        assert!(record.next_follow_up_date.is_none());
        assert!(!record.is_paused);
        assert!(record.paused_time_left.is_none());
        assert_eq!(record.status, ClientStatus::Active);
        assert!(record.client_type.is_none());
        assert!(record.follow_ups.is_empty());
    }

    #[test]
    fn null_fields_get_defaults() {
        let json = r#"{"id":"c-1","companyName":null,"countryCode":null,"phoneNumber":null,
            "industry":null,"rating":null,"clientType":null,"followUps":null,
            "nextFollowUpDate":null,"isPaused":null,"pausedTimeLeft":null,"status":null}"#;
        let record: ClientRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.company_name, "");
        assert_eq!(record.country_code, "+54");
        assert_eq!(record.rating, 0);
        assert!(record.follow_ups.is_empty());
        assert!(!record.is_paused);
        assert_eq!(record.status, ClientStatus::Active);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn blank_country_code_gets_default() {
        let record: ClientRecord =
            serde_json::from_str(r#"{"id":"c-1","countryCode":"  ","phoneNumber":"1"}"#).unwrap();
        assert_eq!(record.phone_key(), "+541");
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{"id":"c-1","companyName":"Acme","budgets":[{"id":"b-1","total":10}],"whatsAppStatus":"available"}"#;
        let record: ClientRecord = serde_json::from_str(json).unwrap();
        assert!(record.extra.contains_key("budgets"));

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["whatsAppStatus"], "available");
        assert_eq!(out["budgets"][0]["id"], "b-1");
        assert_eq!(out["nextFollowUpDate"], serde_json::Value::Null);
        assert_eq!(out["status"], "active");
    }

    #[test]
    fn normalize_restores_pause_invariant() {
        let mut record = ClientRecord::from_new(NewClient::new("Acme"));
        record.paused_time_left = Some(1000);
        assert!(record.normalize());
        assert!(record.paused_time_left.is_none());

        record.is_paused = true;
        assert!(record.normalize());
        assert!(!record.is_paused);

        assert!(!record.normalize());
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let mut record = ClientRecord::from_new(NewClient::new("Acme").with_phone("+1", "555"));
        let at = Local.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();

        record.apply(&ClientPatch {
            next_follow_up_date: Some(Some(at)),
            ..Default::default()
        });
        assert_eq!(record.next_follow_up_date, Some(at));
        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.phone_key(), "+1555");

        record.apply(&ClientPatch {
            next_follow_up_date: Some(None),
            ..Default::default()
        });
        assert!(record.next_follow_up_date.is_none());
    }

    #[test]
    fn client_type_parses_case_insensitively() {
        assert_eq!("b".parse::<ClientType>(), Ok(ClientType::B));
        assert_eq!(ClientType::D.to_string(), "D");
        assert!("E".parse::<ClientType>().is_err());
    }

    #[test]
    fn empty_patch() {
        assert!(ClientPatch::default().is_empty());
        assert!(!ClientPatch::status(ClientStatus::Suspended).is_empty());
    }
}
