//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, Store, StoreResult, SCHEMA_VERSION_KEY};

/// How long a writer waits for another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UPSERT_VALUE: &str = r#"
    INSERT INTO kv (key, value_json, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(key)
    DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at
"#;

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> StoreResult<()> {
        {
            let conn = self.conn();
            conn.execute_batch(
                r#"
                -- JSON documents under fixed keys
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value_json TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                -- Audit log (append-only)
                CREATE TABLE IF NOT EXISTS audit_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    event_json TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
                "#,
            )?;
        }

        if self.get_value(SCHEMA_VERSION_KEY)?.is_none() {
            self.put_value(SCHEMA_VERSION_KEY, &cadence_api::SCHEMA_VERSION.to_string())?;
        }

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get_value(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn();

        let value = conn
            .query_row("SELECT value_json FROM kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(value)
    }

    fn put_value(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn();

        conn.execute(
            UPSERT_VALUE,
            params![key, value, cadence_util::now().to_rfc3339()],
        )?;

        debug!(key, bytes = value.len(), "Value written");
        Ok(())
    }

    fn swap_value(&self, key: &str, expected: Option<&str>, value: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        // Take the write lock before reading so no other process slips in
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row("SELECT value_json FROM kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        if current.as_deref() != expected {
            debug!(key, "Value changed by another writer");
            return Ok(false);
        }

        tx.execute(
            UPSERT_VALUE,
            params![key, value, cadence_util::now().to_rfc3339()],
        )?;
        tx.commit()?;

        debug!(key, bytes = value.len(), "Value swapped");
        Ok(true)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn();
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| cadence_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditEventType, ClientDocument, SchedulerState, CLIENTS_KEY};
    use cadence_api::{ClientRecord, ClientStatus, NewClient};
    use cadence_util::ClientId;

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
        assert_eq!(store.get_value(SCHEMA_VERSION_KEY).unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::FollowUpCleared {
                client_id: ClientId::new("c-1"),
            }))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, AuditEventType::FollowUpCleared { .. }));
        assert!(matches!(events[1].event, AuditEventType::ServiceStarted));
    }

    #[test]
    fn test_clients_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_clients().unwrap().is_empty());

        let mut record = ClientRecord::from_new(NewClient::new("Acme"));
        record.status = ClientStatus::Suspended;
        let json = ClientDocument::from(vec![record.clone()]).encode().unwrap();
        store.put_value(CLIENTS_KEY, &json).unwrap();

        let loaded = store.load_clients().unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn test_legacy_payload_loads() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .put_value(
                CLIENTS_KEY,
                r#"[{"id":"c-1","companyName":"Acme","phoneNumber":"1","notes":[]}]"#,
            )
            .unwrap();

        let loaded = store.load_clients().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].country_code, "+54");
        assert!(loaded[0].extra.contains_key("notes"));
    }

    #[test]
    fn test_swap_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.db");
        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();

        assert!(first.swap_value(CLIENTS_KEY, None, "[]").unwrap());

        // The second connection still expects the key to be absent
        assert!(!second.swap_value(CLIENTS_KEY, None, "[1]").unwrap());
        assert_eq!(second.get_value(CLIENTS_KEY).unwrap().as_deref(), Some("[]"));

        assert!(second.swap_value(CLIENTS_KEY, Some("[]"), "[1]").unwrap());
        assert_eq!(first.get_value(CLIENTS_KEY).unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_scheduler_state() {
        let store = SqliteStore::in_memory().unwrap();
        let now = cadence_util::now();

        assert!(store.load_scheduler_state(now).unwrap().is_empty());

        let mut state = SchedulerState::default();
        state.notified.insert(ClientId::new("c-1"), now);
        store.save_scheduler_state(&state).unwrap();

        assert_eq!(store.load_scheduler_state(now).unwrap(), state);
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let json = ClientDocument::from(vec![ClientRecord::from_new(NewClient::new("Acme"))])
                .encode()
                .unwrap();
            store.put_value(CLIENTS_KEY, &json).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_clients().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].company_name, "Acme");
    }
}
