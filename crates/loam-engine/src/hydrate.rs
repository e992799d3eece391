//! Hydration: turning typed references back into navigable handles.
//!
//! Hydration is lazy. Resolving a reference allocates (or reuses) a remote
//! node; contents are fetched from the store on access, not up front. The
//! one exception is object references: the record is read once at hydration
//! time so the type tag can be checked against the registry and tagged
//! instances can be indexed by their application id.
//!
//! The identity cache guarantees that hydrating the same id twice in one
//! scope yields the same handle.

use loam_types::{RecordId, RefKind, Reference, Scalar, StoredValue};

use crate::error::{EngineError, EngineResult};
use crate::graph::Node;
use crate::transaction::Transaction;
use crate::value::{ArrHandle, BlobHandle, MapHandle, ObjHandle, Value};

impl Transaction {
    /// Materialize the handle for a typed reference.
    pub(crate) fn hydrate_reference(&mut self, reference: &Reference) -> EngineResult<Value> {
        match reference.kind {
            RefKind::Object => Ok(Value::Object(self.hydrate_object(reference)?)),
            RefKind::Array => Ok(Value::Array(ArrHandle(self.hydrate_lazy(reference)))),
            RefKind::Map => Ok(Value::Map(MapHandle(self.hydrate_lazy(reference)))),
            RefKind::Blob => Ok(Value::Blob(BlobHandle(self.hydrate_lazy(reference)))),
        }
    }

    /// Hydrate an object record by bare id (no reference in hand).
    pub(crate) fn hydrate_object_id(&mut self, id: &RecordId) -> EngineResult<ObjHandle> {
        self.hydrate_object(&Reference::object(id.clone()))
    }

    fn hydrate_object(&mut self, reference: &Reference) -> EngineResult<ObjHandle> {
        if let Some(tag) = &reference.type_tag {
            if !self.registry.contains(tag) {
                return Err(EngineError::UnknownTypeTag { tag: tag.clone() });
            }
        }
        if let Some(node) = self.cache.node_for(&reference.id) {
            return Ok(ObjHandle(node));
        }

        let record = self
            .backend
            .record_get(self.txn, &reference.id)?
            .ok_or_else(|| EngineError::RecordNotFound(reference.id.clone()))?;
        if let Some(tag) = &record.type_tag {
            if !self.registry.contains(tag) {
                return Err(EngineError::UnknownTypeTag { tag: tag.clone() });
            }
        }

        let node = self.arena.alloc(Node::Remote {
            kind: RefKind::Object,
            id: reference.id.clone(),
            type_tag: record.type_tag.clone(),
        });
        self.cache.bind(node, reference.id.clone());
        if record.type_tag.is_some() {
            if let Some(StoredValue::Scalar(Scalar::Text(app_id))) = record.fields.get("id") {
                self.cache.index_instance(app_id.clone(), node);
            }
        }
        Ok(ObjHandle(node))
    }

    /// Arrays, maps, and blobs hydrate without touching the store; their
    /// contents are fetched per operation.
    fn hydrate_lazy(&mut self, reference: &Reference) -> crate::graph::NodeId {
        if let Some(node) = self.cache.node_for(&reference.id) {
            return node;
        }
        let node = self.arena.alloc(Node::Remote {
            kind: reference.kind,
            id: reference.id.clone(),
            type_tag: reference.type_tag.clone(),
        });
        self.cache.bind(node, reference.id.clone());
        node
    }

    /// Unpack one store cell into an engine value.
    pub(crate) fn value_from_stored(&mut self, stored: StoredValue) -> EngineResult<Value> {
        match stored {
            StoredValue::Scalar(scalar) => Ok(Value::Scalar(scalar)),
            StoredValue::Ref(reference) => self.hydrate_reference(&reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::registry::CustomClass;
    use std::sync::Arc;

    struct Inert;

    impl CustomClass for Inert {
        fn type_tag(&self) -> &str {
            "Inert"
        }

        fn invoke(
            &self,
            _txn: &mut Transaction,
            _this: ObjHandle,
            method: &str,
            _args: &[Value],
        ) -> EngineResult<Value> {
            Err(EngineError::MethodNotFound {
                tag: "Inert".to_string(),
                method: method.to_string(),
            })
        }
    }

    #[test]
    fn same_id_hydrates_to_same_handle() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();
        txn.set_root("a", obj).unwrap();
        txn.set_root("b", obj).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let a = reader.get_root("a").unwrap().unwrap();
        let b = reader.get_root("b").unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_tag_fails_at_hydration() {
        let db = Database::in_memory();
        db.register_class(Arc::new(Inert));
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_instance("Inert");
        txn.set_root("it", obj).unwrap();
        txn.commit().unwrap();

        // A database without the class cannot hydrate the record.
        let bare = Database::new(db.backend(), db.blob_store());
        let mut reader = bare.transaction().unwrap();
        let err = reader.get_root("it").unwrap_err();
        assert!(matches!(err, EngineError::UnknownTypeTag { tag } if tag == "Inert"));
    }

    #[test]
    fn dangling_object_reference_is_an_error() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let id = RecordId::mint();
        let err = txn.hydrate_object_id(&id).unwrap_err();
        assert!(matches!(err, EngineError::RecordNotFound(missing) if missing == id));
    }
}
