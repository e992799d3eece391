//! Graph flattening: turning a local object graph into flat store records.
//!
//! Traversal is an explicit work stack with a visited set, never native
//! recursion, so graphs of unbounded depth and reference cycles both
//! terminate. Shared sub-graphs are assigned one id and referenced
//! identically from every pointing value.
//!
//! Flattened nodes are flipped to remote in place, so every handle into the
//! flattened graph keeps working and subsequent mutations through those
//! handles write straight to the store.

use std::collections::HashSet;

use tracing::debug;

use loam_types::{FlatRecord, RefKind, Reference, Scalar, StoredValue};

use crate::error::{EngineError, EngineResult};
use crate::graph::{Node, NodeId, Slot};
use crate::transaction::Transaction;
use crate::value::Value;

impl Transaction {
    /// Flatten `value` and every non-scalar it reaches, returning the typed
    /// reference of `value` itself.
    ///
    /// Scalars have no identity and are rejected. Already-persisted values
    /// return their existing reference without touching the store.
    pub fn set_object(&mut self, value: &Value) -> EngineResult<Reference> {
        let node = match value {
            Value::Scalar(_) => {
                return Err(EngineError::InvalidArgument(
                    "scalars are copied by value and cannot be persisted on their own".to_string(),
                ))
            }
            Value::Object(handle) => handle.node(),
            Value::Array(handle) => handle.node(),
            Value::Map(handle) => handle.node(),
            Value::Blob(handle) => handle.node(),
        };
        self.flatten(node)
    }

    /// Persist a whole local subgraph rooted at `node`.
    pub(crate) fn flatten(&mut self, node: NodeId) -> EngineResult<Reference> {
        if self.arena.node(node).is_remote() {
            return Ok(self.reference_of(node));
        }
        self.ensure_writable()?;

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![node];
        visited.insert(node);
        let mut written = 0usize;

        while let Some(current) = stack.pop() {
            // Cloning the node contents lets children be minted and flipped
            // while this node is being written out.
            let contents = self.arena.node(current).clone();
            match contents {
                Node::Remote { .. } => continue,
                Node::Blob { value } => {
                    let id = self.cache.get_or_mint(current);
                    self.blobs.put(&id, value)?;
                    self.arena.make_remote(current, RefKind::Blob, id, None);
                }
                Node::Array { items } => {
                    let id = self.cache.get_or_mint(current);
                    for (index, slot) in items.iter().enumerate() {
                        let stored = self.slot_to_stored(slot, &mut visited, &mut stack);
                        self.backend.array_set(self.txn, &id, index, stored)?;
                    }
                    self.backend.array_truncate(self.txn, &id, items.len())?;
                    self.arena.make_remote(current, RefKind::Array, id, None);
                }
                Node::Map { entries } => {
                    let id = self.cache.get_or_mint(current);
                    for (key, slot) in &entries {
                        let stored = self.slot_to_stored(slot, &mut visited, &mut stack);
                        self.backend.map_set(self.txn, &id, key, stored)?;
                    }
                    self.arena.make_remote(current, RefKind::Map, id, None);
                }
                Node::Object { type_tag, fields } => {
                    let id = self.cache.get_or_mint(current);
                    let mut record = FlatRecord::new(type_tag.clone());
                    for (key, slot) in &fields {
                        let stored = self.slot_to_stored(slot, &mut visited, &mut stack);
                        record.fields.insert(key.clone(), stored);
                    }
                    self.backend.record_put(self.txn, &id, record)?;
                    if type_tag.is_some() {
                        if let Some(Slot::Scalar(Scalar::Text(app_id))) = fields.get("id") {
                            self.cache.index_instance(app_id.clone(), current);
                        }
                    }
                    self.arena.make_remote(current, RefKind::Object, id, type_tag);
                }
            }
            written += 1;
        }

        let reference = self.reference_of(node);
        debug!(txn = %self.txn, root = %reference, written, "graph flattened");
        Ok(reference)
    }

    /// The typed reference a node flattens to, minting its id if needed.
    pub(crate) fn reference_of(&mut self, node: NodeId) -> Reference {
        let id = self.cache.get_or_mint(node);
        let n = self.arena.node(node);
        match n.kind() {
            RefKind::Object => match n.type_tag() {
                Some(tag) => Reference::tagged(id, tag),
                None => Reference::object(id),
            },
            RefKind::Array => Reference::array(id),
            RefKind::Map => Reference::map(id),
            RefKind::Blob => Reference::blob(id),
        }
    }

    /// Pack one slot for the store, scheduling unvisited local children.
    fn slot_to_stored(
        &mut self,
        slot: &Slot,
        visited: &mut HashSet<NodeId>,
        stack: &mut Vec<NodeId>,
    ) -> StoredValue {
        match slot {
            Slot::Scalar(scalar) => StoredValue::Scalar(scalar.clone()),
            Slot::Node(child) => {
                let reference = self.reference_of(*child);
                if !self.arena.node(*child).is_remote() && visited.insert(*child) {
                    stack.push(*child);
                }
                StoredValue::Ref(reference)
            }
        }
    }

    /// Pack a value for a store cell, flattening local subgraphs first.
    pub(crate) fn stored_from_value(&mut self, value: &Value) -> EngineResult<StoredValue> {
        match value {
            Value::Scalar(scalar) => Ok(StoredValue::Scalar(scalar.clone())),
            Value::Object(handle) => Ok(StoredValue::Ref(self.flatten(handle.node())?)),
            Value::Array(handle) => Ok(StoredValue::Ref(self.flatten(handle.node())?)),
            Value::Map(handle) => Ok(StoredValue::Ref(self.flatten(handle.node())?)),
            Value::Blob(handle) => Ok(StoredValue::Ref(self.flatten(handle.node())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::value::Value;

    #[test]
    fn scalars_are_rejected() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let err = txn.set_object(&Value::from(1.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn nested_graph_round_trips() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();

        let inner = txn.new_object();
        txn.object_set(inner, "kind", "inner").unwrap();
        let items = txn.new_array();
        txn.array_push(items, 1.0).unwrap();
        txn.array_push(items, inner).unwrap();
        let root = txn.new_object();
        txn.object_set(root, "items", items).unwrap();
        txn.set_root("root", root).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let root = reader.get_root("root").unwrap().unwrap().as_object().unwrap();
        let items = reader
            .object_get(root, "items")
            .unwrap()
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(reader.array_length(items).unwrap(), 2);
        assert_eq!(
            reader.array_get(items, 0).unwrap().unwrap().as_number(),
            Some(1.0)
        );
        let inner = reader
            .array_get(items, 1)
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(
            reader.object_get(inner, "kind").unwrap().unwrap().as_text(),
            Some("inner")
        );
    }

    #[test]
    fn shared_subgraph_keeps_one_identity() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();

        let shared = txn.new_object();
        txn.object_set(shared, "n", 7.0).unwrap();
        let root = txn.new_object();
        txn.object_set(root, "left", shared).unwrap();
        txn.object_set(root, "right", shared).unwrap();
        txn.set_root("root", root).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let root = reader.get_root("root").unwrap().unwrap().as_object().unwrap();
        let left = reader
            .object_get(root, "left")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        let right = reader
            .object_get(root, "right")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        // Same record, same handle: mutations through one side are seen
        // through the other.
        assert_eq!(left, right);
        reader.object_set(left, "n", 8.0).unwrap();
        assert_eq!(
            reader.object_get(right, "n").unwrap().unwrap().as_number(),
            Some(8.0)
        );
    }

    #[test]
    fn cycles_terminate() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();

        let a = txn.new_object();
        let b = txn.new_object();
        txn.object_set(a, "next", b).unwrap();
        txn.object_set(b, "next", a).unwrap();
        txn.set_root("cycle", a).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let a = reader.get_root("cycle").unwrap().unwrap().as_object().unwrap();
        let b = reader
            .object_get(a, "next")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        let back = reader
            .object_get(b, "next")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn self_reference_terminates() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let me = txn.new_object();
        txn.object_set(me, "me", me).unwrap();
        txn.set_root("selfish", me).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let me = reader
            .get_root("selfish")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        let inner = reader
            .object_get(me, "me")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(inner, me);
    }

    #[test]
    fn all_scalar_kinds_round_trip() {
        use chrono::{TimeZone, Utc};
        use loam_types::{BigInt, ErrorValue, Scalar};

        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();

        let date = Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap();
        txn.object_set(obj, "null", Value::null()).unwrap();
        txn.object_set(obj, "flag", true).unwrap();
        txn.object_set(obj, "n", 1.25).unwrap();
        txn.object_set(obj, "big", BigInt::from_i128(i128::MAX)).unwrap();
        txn.object_set(obj, "text", "hello").unwrap();
        txn.object_set(obj, "when", Value::Scalar(Scalar::Date(date)))
            .unwrap();
        txn.object_set(obj, "pattern", Value::Scalar(Scalar::Pattern("^a+$".into())))
            .unwrap();
        txn.object_set(obj, "url", Value::Scalar(Scalar::url("https://example.com/").unwrap()))
            .unwrap();
        txn.object_set(obj, "err", Value::Scalar(Scalar::Error(ErrorValue::new("boom"))))
            .unwrap();
        txn.set_root("scalars", obj).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let obj = reader
            .get_root("scalars")
            .unwrap()
            .unwrap()
            .as_object()
            .unwrap();
        let get = |reader: &mut Transaction, key: &str| {
            reader.object_get(obj, key).unwrap().unwrap()
        };
        assert!(get(&mut reader, "null").is_null());
        assert_eq!(get(&mut reader, "flag"), Value::from(true));
        assert_eq!(get(&mut reader, "n").as_number(), Some(1.25));
        assert_eq!(get(&mut reader, "big"), Value::from(BigInt::from_i128(i128::MAX)));
        assert_eq!(get(&mut reader, "text").as_text(), Some("hello"));
        assert_eq!(get(&mut reader, "when"), Value::Scalar(Scalar::Date(date)));
        assert_eq!(
            get(&mut reader, "url"),
            Value::Scalar(Scalar::url("https://example.com/").unwrap())
        );
    }

    #[test]
    fn flattening_preserves_element_kinds() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();

        let arr = txn.new_array();
        let map = txn.new_map();
        txn.map_set(map, "k", 1.0).unwrap();
        txn.array_push(arr, map).unwrap();
        txn.set_root("root", arr).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let arr = reader.get_root("root").unwrap().unwrap().as_array().unwrap();
        // A map pushed into an array hydrates back as a map, not an object.
        let element = reader.array_get(arr, 0).unwrap().unwrap();
        let map = element.as_map().expect("element should be a map");
        assert_eq!(
            reader.map_get(map, "k").unwrap().unwrap().as_number(),
            Some(1.0)
        );
    }
}
