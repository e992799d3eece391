//! JSON-style flattening and import.
//!
//! `put_json` builds a local graph from a JSON document (objects become
//! records, arrays become arrays); `to_json` walks a graph back out to a
//! document. JSON is a tree format, so export rejects cycles, and values
//! with no JSON form (non-finite numbers, blobs) are errors rather than
//! silent lossy output.

use std::collections::HashSet;

use serde_json::{json, Map as JsonMap, Number as JsonNumber};

use loam_types::Scalar;

use crate::error::{EngineError, EngineResult};
use crate::graph::NodeId;
use crate::transaction::Transaction;
use crate::value::Value;

impl Transaction {
    /// Import a JSON document as a local graph, returning its root value.
    ///
    /// Nothing is persisted; root the result via [`set_root`] or
    /// [`set_object`] as usual.
    ///
    /// [`set_root`]: Transaction::set_root
    /// [`set_object`]: Transaction::set_object
    pub fn put_json(&mut self, json: &serde_json::Value) -> EngineResult<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::null()),
            serde_json::Value::Bool(b) => Ok(Value::from(*b)),
            serde_json::Value::Number(n) => {
                let n = n.as_f64().ok_or_else(|| {
                    EngineError::UnsupportedValue(format!("number {n} has no f64 form"))
                })?;
                Ok(Value::from(n))
            }
            serde_json::Value::String(s) => Ok(Value::from(s.as_str())),
            serde_json::Value::Array(items) => {
                let arr = self.new_array();
                for item in items {
                    let value = self.put_json(item)?;
                    self.array_push(arr, value)?;
                }
                Ok(Value::Array(arr))
            }
            serde_json::Value::Object(fields) => {
                let obj = self.new_object();
                for (key, field) in fields {
                    let value = self.put_json(field)?;
                    self.object_set(obj, key, value)?;
                }
                Ok(Value::Object(obj))
            }
        }
    }

    /// Export a value as a JSON document.
    ///
    /// Maps export as JSON objects. Cycles, blobs, and non-finite numbers
    /// have no JSON form and fail with `UnsupportedValue`.
    pub fn to_json(&mut self, value: &Value) -> EngineResult<serde_json::Value> {
        let mut active = HashSet::new();
        self.to_json_inner(value, &mut active)
    }

    fn to_json_inner(
        &mut self,
        value: &Value,
        active: &mut HashSet<NodeId>,
    ) -> EngineResult<serde_json::Value> {
        match value {
            Value::Scalar(scalar) => scalar_to_json(scalar),
            Value::Object(handle) => {
                self.enter(handle.node(), active)?;
                let mut out = JsonMap::new();
                for key in self.object_keys(*handle)? {
                    let field = self
                        .object_get(*handle, &key)?
                        .unwrap_or_else(Value::null);
                    out.insert(key, self.to_json_inner(&field, active)?);
                }
                active.remove(&handle.node());
                Ok(serde_json::Value::Object(out))
            }
            Value::Array(handle) => {
                self.enter(handle.node(), active)?;
                let mut out = Vec::new();
                for element in self.array_values(*handle)? {
                    out.push(self.to_json_inner(&element, active)?);
                }
                active.remove(&handle.node());
                Ok(serde_json::Value::Array(out))
            }
            Value::Map(handle) => {
                self.enter(handle.node(), active)?;
                let mut out = JsonMap::new();
                for (key, entry) in self.map_entries(*handle)? {
                    out.insert(key, self.to_json_inner(&entry, active)?);
                }
                active.remove(&handle.node());
                Ok(serde_json::Value::Object(out))
            }
            Value::Blob(_) => Err(EngineError::UnsupportedValue(
                "blobs have no JSON form".to_string(),
            )),
        }
    }

    fn enter(&self, node: NodeId, active: &mut HashSet<NodeId>) -> EngineResult<()> {
        if !active.insert(node) {
            return Err(EngineError::UnsupportedValue(
                "cyclic graphs have no JSON form".to_string(),
            ));
        }
        Ok(())
    }
}

fn scalar_to_json(scalar: &Scalar) -> EngineResult<serde_json::Value> {
    match scalar {
        Scalar::Null => Ok(serde_json::Value::Null),
        Scalar::Bool(b) => Ok(json!(b)),
        Scalar::Number(n) => JsonNumber::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                EngineError::UnsupportedValue(format!("number {n} has no JSON form"))
            }),
        Scalar::Int(big) => match big.to_i128() {
            Ok(v) if i64::try_from(v).is_ok() => Ok(json!(v as i64)),
            _ => Ok(json!(big.to_string())),
        },
        Scalar::Text(s) => Ok(json!(s)),
        Scalar::Date(d) => Ok(json!(d.to_rfc3339())),
        Scalar::Pattern(p) => Ok(json!(p)),
        Scalar::Url(u) => Ok(json!(u.as_str())),
        Scalar::Error(e) => Ok(json!(e.message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_survives_commit() {
        let db = Database::in_memory();
        let doc = json!({
            "name": "ada",
            "tags": ["math", "engines"],
            "meta": { "active": true, "score": 9.5, "note": null }
        });

        let mut txn = db.transaction().unwrap();
        let root = txn.put_json(&doc).unwrap();
        txn.set_root("doc", root).unwrap();
        txn.commit().unwrap();

        let mut reader = db.transaction().unwrap();
        let root = reader.get_root("doc").unwrap().unwrap();
        assert_eq!(reader.to_json(&root).unwrap(), doc);
    }

    #[test]
    fn shared_subgraphs_export_twice_but_cycles_fail() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();

        let shared = txn.new_object();
        txn.object_set(shared, "n", 1.0).unwrap();
        let root = txn.new_object();
        txn.object_set(root, "left", shared).unwrap();
        txn.object_set(root, "right", shared).unwrap();
        let exported = txn.to_json(&Value::Object(root)).unwrap();
        assert_eq!(exported, json!({"left": {"n": 1.0}, "right": {"n": 1.0}}));

        txn.object_set(shared, "back", root).unwrap();
        let err = txn.to_json(&Value::Object(root)).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedValue(_)));
    }

    #[test]
    fn maps_export_as_objects() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let map = txn.new_map();
        txn.map_set(map, "a", 1.0).unwrap();
        txn.map_set(map, "b", "two").unwrap();
        let exported = txn.to_json(&Value::Map(map)).unwrap();
        assert_eq!(exported, json!({"a": 1.0, "b": "two"}));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let arr = txn.new_array();
        txn.array_push(arr, f64::NAN).unwrap();
        let err = txn.to_json(&Value::Array(arr)).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedValue(_)));
    }

    #[test]
    fn blobs_are_rejected() {
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let blob = txn.new_blob(vec![1], "application/octet-stream");
        let err = txn.to_json(&Value::Blob(blob)).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedValue(_)));
    }

    fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::Bool),
            (-1.0e9..1.0e9f64).prop_map(|n| json!(n)),
            ".{0,12}".prop_map(serde_json::Value::String),
        ]
    }

    fn json_document() -> impl Strategy<Value = serde_json::Value> {
        let node = json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|fields| serde_json::Value::Object(fields.into_iter().collect())),
            ]
        });
        // Only graphs can be rooted, so the document root is a container.
        prop_oneof![
            prop::collection::vec(node.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", node, 0..4)
                .prop_map(|fields| serde_json::Value::Object(fields.into_iter().collect())),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn arbitrary_documents_round_trip(doc in json_document()) {
            let db = Database::in_memory();
            let mut txn = db.transaction().unwrap();
            let root = txn.put_json(&doc).unwrap();
            txn.set_root("doc", root).unwrap();
            txn.commit().unwrap();

            let mut reader = db.transaction().unwrap();
            let root = reader.get_root("doc").unwrap().unwrap();
            prop_assert_eq!(reader.to_json(&root).unwrap(), doc);
        }
    }

    #[test]
    fn big_ints_export_as_number_or_string() {
        use loam_types::BigInt;
        let db = Database::in_memory();
        let mut txn = db.transaction().unwrap();
        let obj = txn.new_object();
        txn.object_set(obj, "small", BigInt::from_i64(42)).unwrap();
        txn.object_set(obj, "huge", BigInt::from_i128(i128::MAX)).unwrap();

        let exported = txn.to_json(&Value::Object(obj)).unwrap();
        assert_eq!(exported["small"], json!(42));
        assert_eq!(exported["huge"], json!(i128::MAX.to_string()));
    }
}
