//! Owning repository of client records

use cadence_api::{ClientPatch, ClientRecord, ClientStatus, NewClient};
use cadence_util::ClientId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::{ClientDocument, Store, StoreError, StoreResult, CLIENTS_KEY};

/// Result of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Skipped because the phone number was already present
    pub skipped: usize,
}

/// How many times a mutation is re-planned after losing a race with
/// another writer
const WRITE_ATTEMPTS: usize = 3;

/// The single owner and writer of client records within a process.
///
/// Other processes may write the same backend (the CLI while the service
/// runs), so the stored array is re-read before every read and mutation
/// and written back with [`Store::swap_value`]. A mutation that loses the
/// race is planned again against the fresh records. Every mutation happens
/// under one lock, merges fields into the record, and writes the full array
/// back before returning.
///
/// If the backend write fails the in-memory change is kept and the error is
/// returned (see [`StoreError::is_persistence`]). The change is replayed
/// over whatever is read next, and the next successful write carries it to
/// disk.
pub struct ClientStore {
    backend: Arc<dyn Store>,
    cache: Mutex<Cache>,
}

struct Cache {
    document: ClientDocument,
    /// Stored array as last read or written
    seen: Option<String>,
    /// Re-read even if the stored array looks unchanged
    stale: bool,
    /// Applied in memory, not yet written; oldest first
    pending: Vec<Change>,
}

/// One mutation, replayable over a freshly read array
#[derive(Debug, Clone)]
enum Change {
    Insert(Vec<ClientRecord>),
    Patch(ClientId, ClientPatch),
    Remove(ClientId),
}

impl Change {
    fn apply(&self, clients: &mut Vec<ClientRecord>) {
        match self {
            Change::Insert(records) => {
                for record in records {
                    if !clients.iter().any(|c| c.id == record.id) {
                        clients.push(record.clone());
                    }
                }
            }
            Change::Patch(id, patch) => {
                if let Some(record) = clients.iter_mut().find(|c| &c.id == id) {
                    record.apply(patch);
                }
            }
            Change::Remove(id) => clients.retain(|c| &c.id != id),
        }
    }
}

/// Decode and normalize the stored array. Returns the number of records
/// normalization changed.
fn decode(raw: Option<&str>) -> StoreResult<(ClientDocument, usize)> {
    let mut document = match raw {
        Some(json) => ClientDocument::decode(json)?,
        None => ClientDocument::default(),
    };

    let mut normalized = 0;
    for client in document.clients.iter_mut() {
        if client.normalize() {
            normalized += 1;
        }
    }

    Ok((document, normalized))
}

fn not_found(id: &ClientId) -> StoreError {
    StoreError::NotFound(format!("client {}", id))
}

impl ClientStore {
    /// Load all clients from the backend
    pub fn open(backend: Arc<dyn Store>) -> StoreResult<Self> {
        let seen = backend.get_value(CLIENTS_KEY)?;
        let (document, normalized) = decode(seen.as_deref())?;

        info!(
            client_count = document.clients.len(),
            undecoded = document.undecoded.len(),
            "Client store opened"
        );

        let store = Self {
            backend,
            cache: Mutex::new(Cache {
                document,
                seen,
                stale: false,
                pending: Vec::new(),
            }),
        };

        if normalized > 0 {
            info!(normalized, "Normalized legacy client records");
            store.write_normalized();
        }

        Ok(store)
    }

    /// Backend shared with the scheduler and the audit log
    pub fn backend(&self) -> &Arc<dyn Store> {
        &self.backend
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock and bring the cache up to date with the backend
    fn current(&self) -> MutexGuard<'_, Cache> {
        let mut cache = self.lock();
        self.refresh(&mut cache);
        cache
    }

    fn refresh(&self, cache: &mut Cache) {
        let raw = match self.backend.get_value(CLIENTS_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to re-read clients; using cached records");
                return;
            }
        };
        if !cache.stale && raw == cache.seen {
            return;
        }

        match decode(raw.as_deref()) {
            Ok((mut document, _)) => {
                for change in &cache.pending {
                    change.apply(&mut document.clients);
                }
                debug!(
                    client_count = document.clients.len(),
                    replayed = cache.pending.len(),
                    "Clients reloaded after an external write"
                );
                cache.document = document;
                cache.seen = raw;
                cache.stale = false;
            }
            Err(e) => warn!(error = %e, "Stored clients unreadable; using cached records"),
        }
    }

    /// Write the normalized form back. Failure only costs a repeat next time.
    fn write_normalized(&self) {
        let mut cache = self.lock();
        let result = cache.document.encode().and_then(|json| {
            let swapped = self
                .backend
                .swap_value(CLIENTS_KEY, cache.seen.as_deref(), &json)?;
            Ok(swapped.then_some(json))
        });

        match result {
            Ok(Some(json)) => cache.seen = Some(json),
            Ok(None) => cache.stale = true,
            Err(e) => warn!(error = %e, "Failed to write normalized client records"),
        }
    }

    /// Plan a change against the current records, apply it and write the
    /// array back. `plan` returns `None` when there is nothing to do; it may
    /// run more than once if another writer gets in first.
    fn mutate<T, F>(&self, mut plan: F) -> StoreResult<Option<T>>
    where
        F: FnMut(&[ClientRecord]) -> StoreResult<Option<(Change, T)>>,
    {
        let mut cache = self.lock();

        for attempt in 1..=WRITE_ATTEMPTS {
            self.refresh(&mut cache);

            let Some((change, out)) = plan(cache.document.clients.as_slice())? else {
                return Ok(None);
            };

            let mut next = cache.document.clone();
            change.apply(&mut next.clients);
            let json = next.encode()?;

            match self
                .backend
                .swap_value(CLIENTS_KEY, cache.seen.as_deref(), &json)
            {
                Ok(true) => {
                    cache.document = next;
                    cache.seen = Some(json);
                    cache.pending.clear();
                    return Ok(Some(out));
                }
                Ok(false) => {
                    debug!(attempt, "Clients changed by another writer; planning again");
                    cache.stale = true;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to persist clients; in-memory state kept");
                    cache.document = next;
                    cache.pending.push(change);
                    return Err(e);
                }
            }
        }

        Err(StoreError::Conflict(format!(
            "clients changed by another writer on {} attempts",
            WRITE_ATTEMPTS
        )))
    }

    /// Snapshot of every record
    pub fn list(&self) -> Vec<ClientRecord> {
        self.current().document.clients.clone()
    }

    pub fn len(&self) -> usize {
        self.current().document.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().document.clients.is_empty()
    }

    pub fn get(&self, id: &ClientId) -> StoreResult<ClientRecord> {
        self.current()
            .document
            .clients
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Create a client with no follow-up scheduled
    pub fn create(&self, new: NewClient) -> StoreResult<ClientRecord> {
        let record = ClientRecord::from_new(new);
        self.mutate(|_| Ok(Some((Change::Insert(vec![record.clone()]), ()))))?;

        debug!(client_id = %record.id, "Client created");
        Ok(record)
    }

    /// Create many clients, skipping phone numbers that already exist
    pub fn import(&self, new_clients: Vec<NewClient>) -> StoreResult<ImportSummary> {
        let imported = self.mutate(|clients| {
            let mut known: HashSet<String> = clients.iter().map(ClientRecord::phone_key).collect();
            let mut summary = ImportSummary::default();
            let mut records = Vec::new();

            for new in &new_clients {
                if !known.insert(new.phone_key()) {
                    summary.skipped += 1;
                    continue;
                }
                records.push(ClientRecord::from_new(new.clone()));
                summary.imported += 1;
            }

            Ok((!records.is_empty()).then(|| (Change::Insert(records), summary)))
        })?;

        let summary = imported.unwrap_or(ImportSummary {
            imported: 0,
            skipped: new_clients.len(),
        });
        debug!(imported = summary.imported, skipped = summary.skipped, "Clients imported");
        Ok(summary)
    }

    /// Merge `patch` into the record with the given id
    pub fn update(&self, id: &ClientId, patch: &ClientPatch) -> StoreResult<ClientRecord> {
        self.update_with(id, |_| Some(patch.clone()))?
            .ok_or_else(|| not_found(id))
    }

    /// Compute a patch from the current record and apply it atomically.
    ///
    /// `f` runs under the store lock against freshly read records, so the
    /// patch is derived from exactly the state it is merged into; it runs
    /// again if another writer changed the records first. Returning `None`
    /// (or an empty patch) leaves the record untouched and writes nothing;
    /// the result is then `Ok(None)`.
    pub fn update_with<F>(&self, id: &ClientId, mut f: F) -> StoreResult<Option<ClientRecord>>
    where
        F: FnMut(&ClientRecord) -> Option<ClientPatch>,
    {
        let updated = self.mutate(|clients| {
            let record = clients
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| not_found(id))?;

            Ok(match f(record) {
                Some(patch) if !patch.is_empty() => {
                    let mut updated = record.clone();
                    updated.apply(&patch);
                    Some((Change::Patch(id.clone(), patch), updated))
                }
                _ => None,
            })
        })?;

        if updated.is_some() {
            debug!(client_id = %id, "Client updated");
        }
        Ok(updated)
    }

    /// Remove a client
    pub fn delete(&self, id: &ClientId) -> StoreResult<ClientRecord> {
        let removed = self
            .mutate(|clients| {
                let record = clients
                    .iter()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| not_found(id))?;
                Ok(Some((Change::Remove(id.clone()), record.clone())))
            })?
            .ok_or_else(|| not_found(id))?;

        debug!(client_id = %id, "Client deleted");
        Ok(removed)
    }

    /// Split clients into (active, suspended), optionally keeping only those
    /// whose company name (case-insensitive) or phone number contains `search`
    pub fn partition(&self, search: Option<&str>) -> (Vec<ClientRecord>, Vec<ClientRecord>) {
        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());

        self.current()
            .document
            .clients
            .iter()
            .filter(|c| match &needle {
                Some(n) => c.company_name.to_lowercase().contains(n) || c.phone_number.contains(n),
                None => true,
            })
            .cloned()
            .partition(|c| c.status == ClientStatus::Active)
    }
}
