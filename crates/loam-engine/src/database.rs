//! The top-level engine handle.
//!
//! A [`Database`] wires a storage backend, a blob store, and a class
//! registry together and hands out transaction scopes. It also carries the
//! ambient scope of the convenience API: [`ambient`] lazily opens one
//! transaction on first use and [`commit`] publishes and clears it, so
//! short scripts never manage scopes explicitly.
//!
//! [`ambient`]: Database::ambient
//! [`commit`]: Database::commit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use loam_store::{Backend, BlobStore, InMemoryBackend, InMemoryBlobStore};

use crate::error::EngineResult;
use crate::registry::{CustomClass, TypeRegistry};
use crate::transaction::Transaction;

pub struct Database {
    backend: Arc<dyn Backend>,
    blobs: Arc<dyn BlobStore>,
    registry: Arc<TypeRegistry>,
    namespace: String,
    read_only: Arc<AtomicBool>,
    ambient: Mutex<Option<Transaction>>,
}

impl Database {
    /// Wire an engine over the given stores, bound to the default namespace.
    pub fn new(backend: Arc<dyn Backend>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            backend,
            blobs,
            registry: Arc::new(TypeRegistry::new()),
            namespace: "default".to_string(),
            read_only: Arc::new(AtomicBool::new(false)),
            ambient: Mutex::new(None),
        }
    }

    /// A fully in-memory engine, for tests and embedding.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(InMemoryBlobStore::new()),
        )
    }

    /// Rebind the default namespace used by [`transaction`] and the ambient
    /// API.
    ///
    /// [`transaction`]: Database::transaction
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Register a custom class. Scopes opened before and after registration
    /// share the registry.
    pub fn register_class(&self, class: Arc<dyn CustomClass>) {
        debug!(tag = class.type_tag(), "class registered");
        self.registry.register(class);
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs)
    }

    /// Open an explicit scope against the default namespace.
    pub fn transaction(&self) -> EngineResult<Transaction> {
        self.transaction_in(&self.namespace)
    }

    /// Open an explicit scope against `namespace`.
    pub fn transaction_in(&self, namespace: &str) -> EngineResult<Transaction> {
        Transaction::open(
            Arc::clone(&self.backend),
            Arc::clone(&self.blobs),
            Arc::clone(&self.registry),
            namespace,
            Arc::clone(&self.read_only),
        )
    }

    /// Run `f` against the ambient scope, opening it on first use. The
    /// scope stays open across calls until [`commit`] or [`rollback`].
    ///
    /// [`commit`]: Database::commit
    /// [`rollback`]: Database::rollback
    pub fn ambient<R>(&self, f: impl FnOnce(&mut Transaction) -> EngineResult<R>) -> EngineResult<R> {
        let mut slot = self.ambient.lock().expect("lock poisoned");
        if slot.is_none() {
            *slot = Some(self.transaction()?);
        }
        f(slot.as_mut().expect("ambient scope just opened"))
    }

    /// Publish and clear the ambient scope. A no-op when none is open.
    pub fn commit(&self) -> EngineResult<()> {
        let taken = self.ambient.lock().expect("lock poisoned").take();
        match taken {
            Some(txn) => txn.commit(),
            None => Ok(()),
        }
    }

    /// Discard and clear the ambient scope. A no-op when none is open.
    pub fn rollback(&self) -> EngineResult<()> {
        let taken = self.ambient.lock().expect("lock poisoned").take();
        match taken {
            Some(txn) => txn.abort(),
            None => Ok(()),
        }
    }

    /// Toggle the process-wide read-only flag. While set, every mutating
    /// call through any scope of this database fails with `ReadOnly`.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("namespace", &self.namespace)
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::registry::CustomClass;
    use crate::value::{ObjHandle, Value};

    /// A counter with persistent state and an application id.
    struct Counter;

    impl CustomClass for Counter {
        fn type_tag(&self) -> &str {
            "Counter"
        }

        fn invoke(
            &self,
            txn: &mut Transaction,
            this: ObjHandle,
            method: &str,
            _args: &[Value],
        ) -> EngineResult<Value> {
            match method {
                "increment" => {
                    let count = txn
                        .object_get(this, "count")?
                        .and_then(|v| v.as_number())
                        .unwrap_or(0.0);
                    txn.object_set(this, "count", count + 1.0)?;
                    Ok(Value::from(count + 1.0))
                }
                _ => Err(EngineError::MethodNotFound {
                    tag: "Counter".to_string(),
                    method: method.to_string(),
                }),
            }
        }
    }

    #[test]
    fn custom_type_round_trip() {
        let db = Database::in_memory();
        db.register_class(Arc::new(Counter));

        let mut txn = db.transaction().unwrap();
        let counter = txn.new_instance("Counter");
        txn.object_set(counter, "id", "counter-1").unwrap();
        txn.object_set(counter, "count", 0.0).unwrap();
        txn.set_root("counter", counter).unwrap();
        txn.commit().unwrap();

        let mut txn = db.transaction().unwrap();
        let counter = txn
            .get_root("counter")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(txn.object_type_tag(counter).as_deref(), Some("Counter"));
        txn.call(counter, "increment", &[]).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let counter = reader
            .get_root("counter")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(
            reader
                .object_get(counter, "count")
                .unwrap()
                .unwrap()
                .as_number(),
            Some(1.0)
        );
        assert_eq!(reader.object_type_tag(counter).as_deref(), Some("Counter"));
    }

    #[test]
    fn get_instance_resolves_by_application_id() {
        let db = Database::in_memory();
        db.register_class(Arc::new(Counter));

        let mut txn = db.transaction().unwrap();
        let counter = txn.new_instance("Counter");
        txn.object_set(counter, "id", "counter-1").unwrap();
        txn.set_root("counter", counter).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let found = reader.get_instance("counter-1").unwrap().unwrap();
        assert_eq!(reader.object_type_tag(found).as_deref(), Some("Counter"));
        assert!(reader.get_instance("counter-2").unwrap().is_none());
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let db = Database::in_memory();
        db.register_class(Arc::new(Counter));
        let mut txn = db.transaction().unwrap();
        let counter = txn.new_instance("Counter");
        let err = txn.call(counter, "decrement", &[]).unwrap_err();
        assert!(matches!(err, EngineError::MethodNotFound { method, .. } if method == "decrement"));
    }

    #[test]
    fn method_on_plain_object_is_rejected() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();
        let err = txn.call(obj, "anything", &[]).unwrap_err();
        assert!(matches!(err, EngineError::MethodNotFound { .. }));
    }

    #[test]
    fn ambient_scope_spans_calls_until_commit() {
        let db = Database::in_memory();
        db.ambient(|txn| {
            let obj = txn.new_object();
            txn.object_set(obj, "n", 1.0)?;
            txn.set_root("root", obj)
        })
        .unwrap();
        // Same ambient scope: the uncommitted root is visible.
        let n = db
            .ambient(|txn| {
                let obj = txn.get_root("root")?.unwrap().as_object().unwrap();
                txn.object_get(obj, "n")
            })
            .unwrap()
            .unwrap();
        assert_eq!(n.as_number(), Some(1.0));

        // Not yet visible to an independent scope.
        let mut other = db.transaction().unwrap();
        assert!(other.get_root("root").unwrap().is_none());
        drop(other);

        db.commit().unwrap();
        let mut reader = db.transaction().unwrap();
        assert!(reader.get_root("root").unwrap().is_some());
    }

    #[test]
    fn rollback_discards_the_ambient_scope() {
        let db = Database::in_memory();
        db.ambient(|txn| {
            let obj = txn.new_object();
            txn.set_root("gone", obj)
        })
        .unwrap();
        db.rollback().unwrap();
        db.commit().unwrap(); // no-op

        let mut reader = db.transaction().unwrap();
        assert!(reader.get_root("gone").unwrap().is_none());
    }

    #[test]
    fn read_only_rejects_all_mutation() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();
        let arr = txn.new_array();
        let map = txn.new_map();
        txn.object_set(obj, "arr", arr).unwrap();
        txn.object_set(obj, "map", map).unwrap();
        txn.set_root("root", obj).unwrap();

        db.set_read_only(true);
        assert!(matches!(
            txn.object_set(obj, "n", 1.0),
            Err(EngineError::ReadOnly)
        ));
        assert!(matches!(txn.array_push(arr, 1.0), Err(EngineError::ReadOnly)));
        assert!(matches!(
            txn.map_set(map, "k", 1.0),
            Err(EngineError::ReadOnly)
        ));
        assert!(matches!(
            txn.set_root("other", obj),
            Err(EngineError::ReadOnly)
        ));

        // Reads still work.
        assert!(txn.object_get(obj, "arr").unwrap().is_some());

        db.set_read_only(false);
        txn.object_set(obj, "n", 1.0).unwrap();
    }

    #[test]
    fn namespaces_are_disjoint() {
        let db = Database::in_memory();
        let mut a = db.transaction_in("a").unwrap();
        let obj = a.new_object();
        a.set_root("root", obj).unwrap();
        a.commit().unwrap();

        let mut b = db.transaction_in("b").unwrap();
        assert!(b.get_root("root").unwrap().is_none());
    }
}
