//! Transaction scopes.
//!
//! A [`Transaction`] is one unit of graph work: it owns a node arena, an
//! identity cache, and a backing-store transaction, and it is the receiver
//! of every graph operation. Handles are only meaningful against the scope
//! that produced them.
//!
//! Mutations through persisted handles apply to the store immediately (under
//! the scope's transaction, invisible to other scopes); local graphs are
//! flattened when they are rooted via [`set_root`] or [`set_object`].
//! [`commit`] consumes the scope, so handles cannot outlive the durability
//! boundary they were read under. A dropped, uncommitted scope aborts its
//! store transaction.
//!
//! [`set_root`]: Transaction::set_root
//! [`set_object`]: Transaction::set_object
//! [`commit`]: Transaction::commit

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use loam_store::{Backend, BlobStore};
use loam_types::{BlobValue, RecordId, RefKind, Scalar, StoredValue, TxnId};

use crate::cache::IdentityCache;
use crate::error::{EngineError, EngineResult};
use crate::graph::{Arena, Node, NodeId, Slot};
use crate::registry::TypeRegistry;
use crate::value::{ArrHandle, BlobHandle, MapHandle, ObjHandle, Value};

pub struct Transaction {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) txn: TxnId,
    pub(crate) namespace: String,
    pub(crate) arena: Arena,
    pub(crate) cache: IdentityCache,
    read_only: Arc<AtomicBool>,
    finished: bool,
}

impl Transaction {
    pub(crate) fn open(
        backend: Arc<dyn Backend>,
        blobs: Arc<dyn BlobStore>,
        registry: Arc<TypeRegistry>,
        namespace: &str,
        read_only: Arc<AtomicBool>,
    ) -> EngineResult<Self> {
        let txn = backend.begin(namespace)?;
        debug!(%txn, namespace, "opened scope");
        Ok(Self {
            backend,
            blobs,
            registry,
            txn,
            namespace: namespace.to_string(),
            arena: Arena::new(),
            cache: IdentityCache::new(),
            read_only,
            finished: false,
        })
    }

    /// The namespace this scope is bound to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn ensure_writable(&self) -> EngineResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(EngineError::ReadOnly);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------------

    /// A fresh local plain object. Nothing is written until it is rooted or
    /// assigned into a persisted container.
    pub fn new_object(&mut self) -> ObjHandle {
        ObjHandle(self.arena.alloc(Node::Object {
            type_tag: None,
            fields: BTreeMap::new(),
        }))
    }

    /// A fresh local instance of a custom class. The tag is flattened into
    /// the record; hydrating it later requires the class to be registered.
    pub fn new_instance(&mut self, type_tag: impl Into<String>) -> ObjHandle {
        ObjHandle(self.arena.alloc(Node::Object {
            type_tag: Some(type_tag.into()),
            fields: BTreeMap::new(),
        }))
    }

    /// A fresh local empty array.
    pub fn new_array(&mut self) -> ArrHandle {
        ArrHandle(self.arena.alloc(Node::Array { items: Vec::new() }))
    }

    /// A fresh local empty map.
    pub fn new_map(&mut self) -> MapHandle {
        MapHandle(self.arena.alloc(Node::Map {
            entries: BTreeMap::new(),
        }))
    }

    /// A fresh local blob.
    pub fn new_blob(&mut self, data: Vec<u8>, media_type: impl Into<String>) -> BlobHandle {
        BlobHandle(self.arena.alloc(Node::Blob {
            value: BlobValue::new(data, media_type),
        }))
    }

    // ---------------------------------------------------------------------
    // Object properties
    // ---------------------------------------------------------------------

    /// Read one property. `Ok(None)` when the property is absent.
    ///
    /// Persisted objects are re-read from the store on every access, so a
    /// read immediately following a write observes the write.
    pub fn object_get(&mut self, obj: ObjHandle, key: &str) -> EngineResult<Option<Value>> {
        if let Some(id) = self.remote_id(obj.node()) {
            let record = self
                .backend
                .record_get(self.txn, &id)?
                .ok_or(EngineError::RecordNotFound(id))?;
            match record.fields.get(key) {
                Some(stored) => Ok(Some(self.value_from_stored(stored.clone())?)),
                None => Ok(None),
            }
        } else {
            let slot = match self.arena.node(obj.node()) {
                Node::Object { fields, .. } => fields.get(key).cloned(),
                _ => unreachable!("object handle points at a non-object node"),
            };
            Ok(slot.map(|slot| self.slot_to_value(&slot)))
        }
    }

    /// Write one property. Writes through a persisted object apply to the
    /// store immediately; a local non-scalar value is flattened first.
    pub fn object_set(
        &mut self,
        obj: ObjHandle,
        key: &str,
        value: impl Into<Value>,
    ) -> EngineResult<()> {
        self.ensure_writable()?;
        let value = value.into();
        if let Some(id) = self.remote_id(obj.node()) {
            let stored = self.stored_from_value(&value)?;
            self.backend.record_set_field(self.txn, &id, key, stored)?;
        } else {
            let slot = value_to_slot(&value);
            match self.arena.node_mut(obj.node()) {
                Node::Object { fields, .. } => {
                    fields.insert(key.to_string(), slot);
                }
                _ => unreachable!("object handle points at a non-object node"),
            }
        }
        Ok(())
    }

    /// Remove one property. Returns `true` if it existed.
    pub fn object_delete(&mut self, obj: ObjHandle, key: &str) -> EngineResult<bool> {
        self.ensure_writable()?;
        if let Some(id) = self.remote_id(obj.node()) {
            Ok(self.backend.record_delete_field(self.txn, &id, key)?)
        } else {
            match self.arena.node_mut(obj.node()) {
                Node::Object { fields, .. } => Ok(fields.remove(key).is_some()),
                _ => unreachable!("object handle points at a non-object node"),
            }
        }
    }

    /// Property names, sorted.
    pub fn object_keys(&mut self, obj: ObjHandle) -> EngineResult<Vec<String>> {
        if let Some(id) = self.remote_id(obj.node()) {
            let record = self
                .backend
                .record_get(self.txn, &id)?
                .ok_or(EngineError::RecordNotFound(id))?;
            Ok(record.fields.keys().cloned().collect())
        } else {
            match self.arena.node(obj.node()) {
                Node::Object { fields, .. } => Ok(fields.keys().cloned().collect()),
                _ => unreachable!("object handle points at a non-object node"),
            }
        }
    }

    /// The custom-class tag of an object, if any.
    pub fn object_type_tag(&self, obj: ObjHandle) -> Option<String> {
        self.arena.node(obj.node()).type_tag().map(str::to_string)
    }

    // ---------------------------------------------------------------------
    // Roots and instances
    // ---------------------------------------------------------------------

    /// Flatten `value` and bind `alias` to it.
    pub fn set_root(&mut self, alias: &str, value: impl Into<Value>) -> EngineResult<()> {
        self.ensure_writable()?;
        let value = value.into();
        let reference = self.set_object(&value)?;
        debug!(txn = %self.txn, alias, target = %reference, "root bound");
        self.backend.alias_set(self.txn, alias, reference)?;
        Ok(())
    }

    /// Resolve `alias` and hydrate its target. `Ok(None)` when unset.
    pub fn get_root(&mut self, alias: &str) -> EngineResult<Option<Value>> {
        match self.backend.alias_get(self.txn, alias)? {
            Some(reference) => Ok(Some(self.hydrate_reference(&reference)?)),
            None => Ok(None),
        }
    }

    /// All root alias names in this namespace, sorted.
    pub fn roots(&self) -> EngineResult<Vec<String>> {
        Ok(self.backend.alias_list(self.txn)?)
    }

    /// Resolve a registered instance by its application-level `id` field.
    ///
    /// Checks the scope's instance index first, then scans committed
    /// records. `Ok(None)` when no registered instance carries `app_id`.
    pub fn get_instance(&mut self, app_id: &str) -> EngineResult<Option<ObjHandle>> {
        if let Some(node) = self.cache.instance(app_id) {
            return Ok(Some(ObjHandle(node)));
        }
        for id in self.backend.record_ids(self.txn)? {
            let Some(record) = self.backend.record_get(self.txn, &id)? else {
                continue;
            };
            let Some(tag) = &record.type_tag else {
                continue;
            };
            if !self.registry.contains(tag) {
                continue;
            }
            if let Some(StoredValue::Scalar(Scalar::Text(candidate))) = record.fields.get("id") {
                if candidate == app_id {
                    return Ok(Some(self.hydrate_object_id(&id)?));
                }
            }
        }
        Ok(None)
    }

    /// Dispatch a method on a custom-class instance.
    pub fn call(&mut self, this: ObjHandle, method: &str, args: &[Value]) -> EngineResult<Value> {
        let Some(tag) = self.object_type_tag(this) else {
            return Err(EngineError::MethodNotFound {
                tag: "object".to_string(),
                method: method.to_string(),
            });
        };
        let class = self
            .registry
            .get(&tag)
            .ok_or(EngineError::UnknownTypeTag { tag })?;
        class.invoke(self, this, method, args)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Publish every write made under this scope. Consumes the scope;
    /// handles from it cannot be used afterwards.
    pub fn commit(mut self) -> EngineResult<()> {
        self.backend.commit(self.txn)?;
        self.finished = true;
        debug!(txn = %self.txn, namespace = %self.namespace, "scope committed");
        Ok(())
    }

    /// Explicitly discard every write made under this scope.
    pub fn abort(mut self) -> EngineResult<()> {
        self.backend.abort(self.txn)?;
        self.finished = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internal plumbing shared by the container modules
    // ---------------------------------------------------------------------

    /// The store id of a node, if it has been persisted.
    pub(crate) fn remote_id(&self, node: NodeId) -> Option<RecordId> {
        match self.arena.node(node) {
            Node::Remote { id, .. } => Some(id.clone()),
            _ => None,
        }
    }

    /// Wrap a node in the handle matching its kind.
    pub(crate) fn handle_value(&self, node: NodeId) -> Value {
        match self.arena.node(node).kind() {
            RefKind::Object => Value::Object(ObjHandle(node)),
            RefKind::Array => Value::Array(ArrHandle(node)),
            RefKind::Map => Value::Map(MapHandle(node)),
            RefKind::Blob => Value::Blob(BlobHandle(node)),
        }
    }

    pub(crate) fn slot_to_value(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Scalar(scalar) => Value::Scalar(scalar.clone()),
            Slot::Node(node) => self.handle_value(*node),
        }
    }
}

/// The arena slot a value occupies inside a local node.
pub(crate) fn value_to_slot(value: &Value) -> Slot {
    match value {
        Value::Scalar(scalar) => Slot::Scalar(scalar.clone()),
        Value::Object(handle) => Slot::Node(handle.node()),
        Value::Array(handle) => Slot::Node(handle.node()),
        Value::Map(handle) => Slot::Node(handle.node()),
        Value::Blob(handle) => Slot::Node(handle.node()),
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            debug!(txn = %self.txn, "scope dropped without commit, aborting");
            let _ = self.backend.abort(self.txn);
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("txn", &self.txn)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn local_object_properties() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();

        txn.object_set(obj, "name", "ada").unwrap();
        txn.object_set(obj, "age", 36.0).unwrap();
        assert_eq!(
            txn.object_get(obj, "name").unwrap().unwrap().as_text(),
            Some("ada")
        );
        assert_eq!(txn.object_get(obj, "missing").unwrap(), None);
        assert_eq!(txn.object_keys(obj).unwrap(), vec!["age", "name"]);

        assert!(txn.object_delete(obj, "age").unwrap());
        assert!(!txn.object_delete(obj, "age").unwrap());
    }

    #[test]
    fn read_after_write_through_persisted_object() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();
        txn.object_set(obj, "n", 1.0).unwrap();
        txn.set_root("root", obj).unwrap();

        // The handle now points at the store; a write is visible to the
        // immediately following read.
        txn.object_set(obj, "n", 2.0).unwrap();
        assert_eq!(
            txn.object_get(obj, "n").unwrap().unwrap().as_number(),
            Some(2.0)
        );
    }

    #[test]
    fn get_root_absent_is_none() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        assert!(txn.get_root("nothing").unwrap().is_none());
    }

    #[test]
    fn uncommitted_scope_leaves_no_trace() {
        let db = Database::in_memory();
        {
            let mut txn = db.transaction().unwrap();
            let obj = txn.new_object();
            txn.object_set(obj, "n", 1.0).unwrap();
            txn.set_root("root", obj).unwrap();
            // dropped without commit
        }
        let mut reader = db.transaction().unwrap();
        assert!(reader.get_root("root").unwrap().is_none());
    }

    #[test]
    fn roots_lists_aliases() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let a = txn.new_object();
        let b = txn.new_object();
        txn.set_root("b", b).unwrap();
        txn.set_root("a", a).unwrap();
        assert_eq!(txn.roots().unwrap(), vec!["a", "b"]);
    }
}
