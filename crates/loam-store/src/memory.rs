//! In-memory backend for testing and ephemeral use.
//!
//! [`InMemoryBackend`] keeps one table set per namespace behind a `RwLock`.
//! Each transaction takes a snapshot of its namespace at `begin` for reads
//! and accumulates a write log alongside it; `commit` replays only that log
//! against the committed tables. Uncommitted writes are never observable,
//! a commit is atomic, and interleaved scopes merge at key level with
//! last-writer-wins on conflicting keys.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::debug;

use loam_types::{FlatRecord, RecordId, Reference, StoredValue, TxnId};

use crate::error::{StoreError, StoreResult};
use crate::traits::Backend;

/// All tables of one namespace.
#[derive(Clone, Debug, Default)]
pub(crate) struct NamespaceData {
    pub(crate) records: HashMap<RecordId, FlatRecord>,
    pub(crate) arrays: HashMap<RecordId, BTreeMap<usize, StoredValue>>,
    pub(crate) maps: HashMap<RecordId, BTreeMap<String, StoredValue>>,
    pub(crate) aliases: HashMap<String, Reference>,
}

/// One effective write, replayable against committed tables.
///
/// Only writes that changed the transaction's snapshot are logged, so a
/// scope that performed no-op deletes commits nothing for them.
#[derive(Debug)]
enum WriteOp {
    RecordPut(RecordId, FlatRecord),
    RecordSetField(RecordId, String, StoredValue),
    RecordDeleteField(RecordId, String),
    RecordDelete(RecordId),
    ArraySet(RecordId, usize, StoredValue),
    ArrayRemove(RecordId, usize),
    ArrayTruncate(RecordId, usize),
    MapSet(RecordId, String, StoredValue),
    MapDelete(RecordId, String),
    MapClear(RecordId),
    AliasSet(String, Reference),
}

impl WriteOp {
    fn apply(self, data: &mut NamespaceData) {
        match self {
            WriteOp::RecordPut(id, record) => {
                data.records.insert(id, record);
            }
            WriteOp::RecordSetField(id, field, value) => {
                data.records
                    .entry(id)
                    .or_insert_with(|| FlatRecord::new(None))
                    .fields
                    .insert(field, value);
            }
            WriteOp::RecordDeleteField(id, field) => {
                if let Some(record) = data.records.get_mut(&id) {
                    record.fields.remove(&field);
                }
            }
            WriteOp::RecordDelete(id) => {
                data.records.remove(&id);
            }
            WriteOp::ArraySet(id, index, value) => {
                data.arrays.entry(id).or_default().insert(index, value);
            }
            WriteOp::ArrayRemove(id, index) => {
                if let Some(items) = data.arrays.get_mut(&id) {
                    items.remove(&index);
                }
            }
            WriteOp::ArrayTruncate(id, len) => {
                if let Some(items) = data.arrays.get_mut(&id) {
                    items.retain(|index, _| *index < len);
                }
            }
            WriteOp::MapSet(id, key, value) => {
                data.maps.entry(id).or_default().insert(key, value);
            }
            WriteOp::MapDelete(id, key) => {
                if let Some(entries) = data.maps.get_mut(&id) {
                    entries.remove(&key);
                }
            }
            WriteOp::MapClear(id) => {
                if let Some(entries) = data.maps.get_mut(&id) {
                    entries.clear();
                }
            }
            WriteOp::AliasSet(alias, target) => {
                data.aliases.insert(alias, target);
            }
        }
    }
}

struct TxnState {
    namespace: String,
    data: NamespaceData,
    log: Vec<WriteOp>,
}

/// An in-memory implementation of [`Backend`].
///
/// All data lives behind locks and is lost when the backend is dropped.
pub struct InMemoryBackend {
    committed: RwLock<HashMap<String, NamespaceData>>,
    txns: Mutex<HashMap<TxnId, TxnState>>,
    next_txn: AtomicU64,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(HashMap::new()),
            txns: Mutex::new(HashMap::new()),
            next_txn: AtomicU64::new(1),
        }
    }

    /// Run `f` against the committed tables of `namespace` (read-only).
    ///
    /// Used by the garbage collector, which operates on durable state only.
    pub(crate) fn with_committed<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&NamespaceData) -> R,
    ) -> R {
        let committed = self.committed.read().expect("lock poisoned");
        match committed.get(namespace) {
            Some(data) => f(data),
            None => f(&NamespaceData::default()),
        }
    }

    /// Replace the committed tables of `namespace`.
    ///
    /// Maintenance entry point for the garbage collector only; ordinary
    /// writes go through the transaction log.
    pub(crate) fn replace_committed(&self, namespace: &str, data: NamespaceData) {
        let mut committed = self.committed.write().expect("lock poisoned");
        committed.insert(namespace.to_string(), data);
    }

    fn with_txn<R>(
        &self,
        txn: TxnId,
        f: impl FnOnce(&mut TxnState) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut txns = self.txns.lock().expect("lock poisoned");
        let state = txns
            .get_mut(&txn)
            .ok_or(StoreError::UnknownTransaction(txn))?;
        f(state)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let namespaces = self.committed.read().expect("lock poisoned").len();
        let open_txns = self.txns.lock().expect("lock poisoned").len();
        f.debug_struct("InMemoryBackend")
            .field("namespaces", &namespaces)
            .field("open_txns", &open_txns)
            .finish()
    }
}

impl Backend for InMemoryBackend {
    // -------------------------------------------------------------------
    // Transaction lifecycle
    // -------------------------------------------------------------------

    fn begin(&self, namespace: &str) -> StoreResult<TxnId> {
        let txn = TxnId::new(self.next_txn.fetch_add(1, Ordering::Relaxed));
        let snapshot = {
            let committed = self.committed.read().expect("lock poisoned");
            committed.get(namespace).cloned().unwrap_or_default()
        };
        let mut txns = self.txns.lock().expect("lock poisoned");
        txns.insert(
            txn,
            TxnState {
                namespace: namespace.to_string(),
                data: snapshot,
                log: Vec::new(),
            },
        );
        debug!(%txn, namespace, "began transaction");
        Ok(txn)
    }

    fn commit(&self, txn: TxnId) -> StoreResult<()> {
        let state = {
            let mut txns = self.txns.lock().expect("lock poisoned");
            txns.remove(&txn)
                .ok_or(StoreError::UnknownTransaction(txn))?
        };
        let writes = state.log.len();
        {
            let mut committed = self.committed.write().expect("lock poisoned");
            let data = committed.entry(state.namespace.clone()).or_default();
            for op in state.log {
                op.apply(data);
            }
        }
        debug!(%txn, namespace = %state.namespace, writes, "committed transaction");
        Ok(())
    }

    fn abort(&self, txn: TxnId) -> StoreResult<()> {
        let mut txns = self.txns.lock().expect("lock poisoned");
        txns.remove(&txn)
            .ok_or(StoreError::UnknownTransaction(txn))?;
        debug!(%txn, "aborted transaction");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Records
    // -------------------------------------------------------------------

    fn record_get(&self, txn: TxnId, id: &RecordId) -> StoreResult<Option<FlatRecord>> {
        self.with_txn(txn, |state| Ok(state.data.records.get(id).cloned()))
    }

    fn record_put(&self, txn: TxnId, id: &RecordId, record: FlatRecord) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            state.data.records.insert(id.clone(), record.clone());
            state.log.push(WriteOp::RecordPut(id.clone(), record));
            Ok(())
        })
    }

    fn record_set_field(
        &self,
        txn: TxnId,
        id: &RecordId,
        field: &str,
        value: StoredValue,
    ) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            let record = state
                .data
                .records
                .get_mut(id)
                .ok_or_else(|| StoreError::RecordNotFound(id.clone()))?;
            record.fields.insert(field.to_string(), value.clone());
            state
                .log
                .push(WriteOp::RecordSetField(id.clone(), field.to_string(), value));
            Ok(())
        })
    }

    fn record_delete_field(&self, txn: TxnId, id: &RecordId, field: &str) -> StoreResult<bool> {
        self.with_txn(txn, |state| {
            let record = state
                .data
                .records
                .get_mut(id)
                .ok_or_else(|| StoreError::RecordNotFound(id.clone()))?;
            let removed = record.fields.remove(field).is_some();
            if removed {
                state
                    .log
                    .push(WriteOp::RecordDeleteField(id.clone(), field.to_string()));
            }
            Ok(removed)
        })
    }

    fn record_delete(&self, txn: TxnId, id: &RecordId) -> StoreResult<bool> {
        self.with_txn(txn, |state| {
            let removed = state.data.records.remove(id).is_some();
            if removed {
                state.log.push(WriteOp::RecordDelete(id.clone()));
            }
            Ok(removed)
        })
    }

    fn record_ids(&self, txn: TxnId) -> StoreResult<Vec<RecordId>> {
        self.with_txn(txn, |state| {
            let mut ids: Vec<RecordId> = state.data.records.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }

    // -------------------------------------------------------------------
    // Arrays
    // -------------------------------------------------------------------

    fn array_get(
        &self,
        txn: TxnId,
        id: &RecordId,
        index: usize,
    ) -> StoreResult<Option<StoredValue>> {
        self.with_txn(txn, |state| {
            Ok(state
                .data
                .arrays
                .get(id)
                .and_then(|items| items.get(&index))
                .cloned())
        })
    }

    fn array_set(
        &self,
        txn: TxnId,
        id: &RecordId,
        index: usize,
        value: StoredValue,
    ) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            state
                .data
                .arrays
                .entry(id.clone())
                .or_default()
                .insert(index, value.clone());
            state.log.push(WriteOp::ArraySet(id.clone(), index, value));
            Ok(())
        })
    }

    fn array_remove(
        &self,
        txn: TxnId,
        id: &RecordId,
        index: usize,
    ) -> StoreResult<Option<StoredValue>> {
        self.with_txn(txn, |state| {
            let removed = state
                .data
                .arrays
                .get_mut(id)
                .and_then(|items| items.remove(&index));
            if removed.is_some() {
                state.log.push(WriteOp::ArrayRemove(id.clone(), index));
            }
            Ok(removed)
        })
    }

    fn array_length(&self, txn: TxnId, id: &RecordId) -> StoreResult<usize> {
        self.with_txn(txn, |state| {
            Ok(state.data.arrays.get(id).map(|items| items.len()).unwrap_or(0))
        })
    }

    fn array_truncate(&self, txn: TxnId, id: &RecordId, len: usize) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            if let Some(items) = state.data.arrays.get_mut(id) {
                items.retain(|index, _| *index < len);
            }
            state.log.push(WriteOp::ArrayTruncate(id.clone(), len));
            Ok(())
        })
    }

    // -------------------------------------------------------------------
    // Maps
    // -------------------------------------------------------------------

    fn map_get(&self, txn: TxnId, id: &RecordId, key: &str) -> StoreResult<Option<StoredValue>> {
        self.with_txn(txn, |state| {
            Ok(state
                .data
                .maps
                .get(id)
                .and_then(|entries| entries.get(key))
                .cloned())
        })
    }

    fn map_set(&self, txn: TxnId, id: &RecordId, key: &str, value: StoredValue) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            state
                .data
                .maps
                .entry(id.clone())
                .or_default()
                .insert(key.to_string(), value.clone());
            state
                .log
                .push(WriteOp::MapSet(id.clone(), key.to_string(), value));
            Ok(())
        })
    }

    fn map_has(&self, txn: TxnId, id: &RecordId, key: &str) -> StoreResult<bool> {
        self.with_txn(txn, |state| {
            Ok(state
                .data
                .maps
                .get(id)
                .map(|entries| entries.contains_key(key))
                .unwrap_or(false))
        })
    }

    fn map_delete(&self, txn: TxnId, id: &RecordId, key: &str) -> StoreResult<bool> {
        self.with_txn(txn, |state| {
            let removed = state
                .data
                .maps
                .get_mut(id)
                .map(|entries| entries.remove(key).is_some())
                .unwrap_or(false);
            if removed {
                state
                    .log
                    .push(WriteOp::MapDelete(id.clone(), key.to_string()));
            }
            Ok(removed)
        })
    }

    fn map_clear(&self, txn: TxnId, id: &RecordId) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            if let Some(entries) = state.data.maps.get_mut(id) {
                entries.clear();
            }
            state.log.push(WriteOp::MapClear(id.clone()));
            Ok(())
        })
    }

    fn map_size(&self, txn: TxnId, id: &RecordId) -> StoreResult<usize> {
        self.with_txn(txn, |state| {
            Ok(state.data.maps.get(id).map(|entries| entries.len()).unwrap_or(0))
        })
    }

    fn map_keys(&self, txn: TxnId, id: &RecordId) -> StoreResult<Vec<String>> {
        self.with_txn(txn, |state| {
            Ok(state
                .data
                .maps
                .get(id)
                .map(|entries| entries.keys().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn map_values(&self, txn: TxnId, id: &RecordId) -> StoreResult<Vec<StoredValue>> {
        self.with_txn(txn, |state| {
            Ok(state
                .data
                .maps
                .get(id)
                .map(|entries| entries.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn map_entries(&self, txn: TxnId, id: &RecordId) -> StoreResult<Vec<(String, StoredValue)>> {
        self.with_txn(txn, |state| {
            Ok(state
                .data
                .maps
                .get(id)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    // -------------------------------------------------------------------
    // Root aliases
    // -------------------------------------------------------------------

    fn alias_get(&self, txn: TxnId, alias: &str) -> StoreResult<Option<Reference>> {
        self.with_txn(txn, |state| Ok(state.data.aliases.get(alias).cloned()))
    }

    fn alias_set(&self, txn: TxnId, alias: &str, target: Reference) -> StoreResult<()> {
        self.with_txn(txn, |state| {
            state
                .data
                .aliases
                .insert(alias.to_string(), target.clone());
            state
                .log
                .push(WriteOp::AliasSet(alias.to_string(), target));
            Ok(())
        })
    }

    fn alias_list(&self, txn: TxnId) -> StoreResult<Vec<String>> {
        self.with_txn(txn, |state| {
            let mut aliases: Vec<String> = state.data.aliases.keys().cloned().collect();
            aliases.sort();
            Ok(aliases)
        })
    }
}
