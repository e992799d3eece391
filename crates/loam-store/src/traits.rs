//! The [`Backend`] trait defining the primitive store operations the
//! engine is built on.
//!
//! Any backend (in-memory, embedded key-value database, remote service)
//! implements this trait. The engine only ever issues these calls; graph
//! semantics live entirely above this boundary.

use loam_types::{FlatRecord, RecordId, Reference, StoredValue, TxnId};

use crate::error::StoreResult;

/// Transactional record/array/map/alias storage.
///
/// All implementations must satisfy these invariants:
/// - A transaction is bound to one namespace at [`begin`] and sees the
///   committed state of that namespace plus its own writes, nothing else.
/// - [`commit`] publishes a transaction's writes atomically; an aborted or
///   dropped transaction leaves no trace.
/// - Concurrent commits are serialized by the store; the engine emits
///   complete, self-consistent batches and does no locking of its own.
/// - Absent lookups are `Ok(None)` / `Ok(false)`, never errors.
///
/// [`begin`]: Backend::begin
/// [`commit`]: Backend::commit
pub trait Backend: Send + Sync {
    // -------------------------------------------------------------------
    // Transaction lifecycle
    // -------------------------------------------------------------------

    /// Open a transaction against `namespace`.
    fn begin(&self, namespace: &str) -> StoreResult<TxnId>;

    /// Atomically publish every write made under `txn`.
    fn commit(&self, txn: TxnId) -> StoreResult<()>;

    /// Discard every write made under `txn`.
    fn abort(&self, txn: TxnId) -> StoreResult<()>;

    // -------------------------------------------------------------------
    // Records (flat objects)
    // -------------------------------------------------------------------

    /// Read a whole flat record. `Ok(None)` if absent.
    fn record_get(&self, txn: TxnId, id: &RecordId) -> StoreResult<Option<FlatRecord>>;

    /// Write (create or replace) a whole flat record.
    fn record_put(&self, txn: TxnId, id: &RecordId, record: FlatRecord) -> StoreResult<()>;

    /// Overwrite a single field of an existing record.
    ///
    /// Errors with `RecordNotFound` if the record has never been written.
    fn record_set_field(
        &self,
        txn: TxnId,
        id: &RecordId,
        field: &str,
        value: StoredValue,
    ) -> StoreResult<()>;

    /// Remove a single field. Returns `true` if the field existed.
    fn record_delete_field(&self, txn: TxnId, id: &RecordId, field: &str) -> StoreResult<bool>;

    /// Remove a whole record. Returns `true` if it existed.
    fn record_delete(&self, txn: TxnId, id: &RecordId) -> StoreResult<bool>;

    /// List all record ids in the transaction's namespace.
    fn record_ids(&self, txn: TxnId) -> StoreResult<Vec<RecordId>>;

    // -------------------------------------------------------------------
    // Arrays (index-addressed)
    // -------------------------------------------------------------------

    /// Read one element. `Ok(None)` if the index is unoccupied.
    fn array_get(&self, txn: TxnId, id: &RecordId, index: usize) -> StoreResult<Option<StoredValue>>;

    /// Write one element (creating the array on first write).
    fn array_set(
        &self,
        txn: TxnId,
        id: &RecordId,
        index: usize,
        value: StoredValue,
    ) -> StoreResult<()>;

    /// Remove one element without shifting neighbors, returning it.
    fn array_remove(
        &self,
        txn: TxnId,
        id: &RecordId,
        index: usize,
    ) -> StoreResult<Option<StoredValue>>;

    /// Number of occupied elements.
    fn array_length(&self, txn: TxnId, id: &RecordId) -> StoreResult<usize>;

    /// Drop every element at index `len` and beyond.
    fn array_truncate(&self, txn: TxnId, id: &RecordId, len: usize) -> StoreResult<()>;

    // -------------------------------------------------------------------
    // Maps (key-addressed)
    // -------------------------------------------------------------------

    /// Read one entry. `Ok(None)` if the key is absent.
    fn map_get(&self, txn: TxnId, id: &RecordId, key: &str) -> StoreResult<Option<StoredValue>>;

    /// Write one entry (creating the map on first write).
    fn map_set(&self, txn: TxnId, id: &RecordId, key: &str, value: StoredValue) -> StoreResult<()>;

    /// Whether the key is present.
    fn map_has(&self, txn: TxnId, id: &RecordId, key: &str) -> StoreResult<bool>;

    /// Remove one entry. `Ok(false)` on an absent key, never an error.
    fn map_delete(&self, txn: TxnId, id: &RecordId, key: &str) -> StoreResult<bool>;

    /// Remove every entry.
    fn map_clear(&self, txn: TxnId, id: &RecordId) -> StoreResult<()>;

    /// Number of entries.
    fn map_size(&self, txn: TxnId, id: &RecordId) -> StoreResult<usize>;

    /// All keys, in stable (sorted) order.
    fn map_keys(&self, txn: TxnId, id: &RecordId) -> StoreResult<Vec<String>>;

    /// All values, in key order.
    fn map_values(&self, txn: TxnId, id: &RecordId) -> StoreResult<Vec<StoredValue>>;

    /// All entries, in key order.
    fn map_entries(&self, txn: TxnId, id: &RecordId) -> StoreResult<Vec<(String, StoredValue)>>;

    // -------------------------------------------------------------------
    // Root aliases
    // -------------------------------------------------------------------

    /// Resolve an alias to the typed reference it names. `Ok(None)` if unset.
    fn alias_get(&self, txn: TxnId, alias: &str) -> StoreResult<Option<Reference>>;

    /// Bind (create or update) an alias.
    fn alias_set(&self, txn: TxnId, alias: &str, target: Reference) -> StoreResult<()>;

    /// All alias names in the transaction's namespace, sorted.
    fn alias_list(&self, txn: TxnId) -> StoreResult<Vec<String>>;
}
