//! In-memory store for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{AuditEvent, Store, StoreError, StoreResult};

/// Volatile store backed by a hash map.
///
/// Writes can be made to fail on demand to exercise persistence-failure
/// handling in callers.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    audits: Mutex<Vec<AuditEvent>>,
    next_audit_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again), audit appends
    /// included
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, key: &str) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(format!(
                "simulated write failure for '{}'",
                key
            )));
        }
        Ok(())
    }

    /// Number of audit events recorded
    pub fn audit_len(&self) -> usize {
        self.audits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Store for MemoryStore {
    fn get_value(&self, key: &str) -> StoreResult<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn put_value(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn swap_value(&self, key: &str, expected: Option<&str>, value: &str) -> StoreResult<bool> {
        self.check_writable(key)?;
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        self.check_writable("audit_log")?;
        event.id = self.next_audit_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.audits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let audits = self.audits.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(audits.iter().rev().take(limit).cloned().collect())
    }

    fn is_healthy(&self) -> bool {
        !self.fail_writes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;

    #[test]
    fn values_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get_value("k").unwrap().is_none());
        store.put_value("k", "[1]").unwrap();
        assert_eq!(store.get_value("k").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn simulated_write_failure() {
        let store = MemoryStore::new();
        store.put_value("k", "old").unwrap();

        store.set_fail_writes(true);
        assert!(store.put_value("k", "new").is_err());
        assert!(store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .is_err());
        assert_eq!(store.audit_len(), 0);
        assert!(!store.is_healthy());
        assert_eq!(store.get_value("k").unwrap().as_deref(), Some("old"));

        store.set_fail_writes(false);
        store.put_value("k", "new").unwrap();
        assert_eq!(store.get_value("k").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn swap_only_replaces_expected_value() {
        let store = MemoryStore::new();
        assert!(store.swap_value("k", None, "a").unwrap());
        assert!(!store.swap_value("k", None, "b").unwrap());
        assert!(!store.swap_value("k", Some("x"), "b").unwrap());
        assert!(store.swap_value("k", Some("a"), "b").unwrap());
        assert_eq!(store.get_value("k").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn audits_newest_first() {
        let store = MemoryStore::new();
        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
            .unwrap();

        let events = store.get_recent_audits(1).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 2);
        assert!(matches!(events[0].event, AuditEventType::ServiceStopped));
        assert_eq!(store.audit_len(), 2);
    }
}
