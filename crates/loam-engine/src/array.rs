//! Ordered-collection emulation.
//!
//! Every mutating operation on a persisted array applies to the store
//! immediately, so an independent read of the same id within the scope (or
//! a later scope, after commit) observes the mutation. Read-only traversal
//! operations materialize a snapshot and work over it.
//!
//! Callback-taking operations hand the scope back to the callback as the
//! first argument, so callbacks can navigate the graph while iterating.

use std::cmp::Ordering;

use loam_types::{Scalar, StoredValue};

use crate::error::EngineResult;
use crate::graph::{Node, Slot};
use crate::transaction::{value_to_slot, Transaction};
use crate::value::{ArrHandle, Value};

impl Transaction {
    /// Number of elements.
    pub fn array_length(&mut self, arr: ArrHandle) -> EngineResult<usize> {
        if let Some(id) = self.remote_id(arr.node()) {
            Ok(self.backend.array_length(self.txn, &id)?)
        } else {
            Ok(self.local_slots(arr).len())
        }
    }

    /// Read one element. `Ok(None)` past the end.
    pub fn array_get(&mut self, arr: ArrHandle, index: usize) -> EngineResult<Option<Value>> {
        if let Some(id) = self.remote_id(arr.node()) {
            match self.backend.array_get(self.txn, &id, index)? {
                Some(stored) => Ok(Some(self.value_from_stored(stored)?)),
                None => Ok(None),
            }
        } else {
            let slot = self.local_slots(arr).get(index).cloned();
            Ok(slot.map(|slot| self.slot_to_value(&slot)))
        }
    }

    /// Write one element. Writing past the end fills the gap with nulls.
    pub fn array_set(
        &mut self,
        arr: ArrHandle,
        index: usize,
        value: impl Into<Value>,
    ) -> EngineResult<()> {
        self.ensure_writable()?;
        let value = value.into();
        if let Some(id) = self.remote_id(arr.node()) {
            let len = self.backend.array_length(self.txn, &id)?;
            for gap in len..index {
                self.backend
                    .array_set(self.txn, &id, gap, StoredValue::Scalar(Scalar::Null))?;
            }
            let stored = self.stored_from_value(&value)?;
            self.backend.array_set(self.txn, &id, index, stored)?;
        } else {
            let slot = value_to_slot(&value);
            match self.arena.node_mut(arr.node()) {
                Node::Array { items } => {
                    if index >= items.len() {
                        items.resize(index + 1, Slot::Scalar(Scalar::Null));
                    }
                    items[index] = slot;
                }
                _ => unreachable!("array handle points at a non-array node"),
            }
        }
        Ok(())
    }

    /// Append one element, returning the new length.
    pub fn array_push(&mut self, arr: ArrHandle, value: impl Into<Value>) -> EngineResult<usize> {
        let len = self.array_length(arr)?;
        self.array_set(arr, len, value)?;
        Ok(len + 1)
    }

    /// Append several elements, returning the new length.
    pub fn array_extend(&mut self, arr: ArrHandle, values: Vec<Value>) -> EngineResult<usize> {
        let mut len = self.array_length(arr)?;
        for value in values {
            self.array_set(arr, len, value)?;
            len += 1;
        }
        Ok(len)
    }

    /// Remove and return the last element. `Ok(None)` on an empty array.
    pub fn array_pop(&mut self, arr: ArrHandle) -> EngineResult<Option<Value>> {
        self.ensure_writable()?;
        if let Some(id) = self.remote_id(arr.node()) {
            let len = self.backend.array_length(self.txn, &id)?;
            if len == 0 {
                return Ok(None);
            }
            match self.backend.array_remove(self.txn, &id, len - 1)? {
                Some(stored) => Ok(Some(self.value_from_stored(stored)?)),
                None => Ok(None),
            }
        } else {
            let slot = match self.arena.node_mut(arr.node()) {
                Node::Array { items } => items.pop(),
                _ => unreachable!("array handle points at a non-array node"),
            };
            Ok(slot.map(|slot| self.slot_to_value(&slot)))
        }
    }

    /// Remove and return the first element, shifting the rest down.
    pub fn array_shift(&mut self, arr: ArrHandle) -> EngineResult<Option<Value>> {
        self.ensure_writable()?;
        let mut values = self.array_values(arr)?;
        if values.is_empty() {
            return Ok(None);
        }
        let first = values.remove(0);
        self.array_write_all(arr, values)?;
        Ok(Some(first))
    }

    /// Prepend elements, returning the new length.
    pub fn array_unshift(&mut self, arr: ArrHandle, values: Vec<Value>) -> EngineResult<usize> {
        self.ensure_writable()?;
        let mut all = values;
        all.extend(self.array_values(arr)?);
        let len = all.len();
        self.array_write_all(arr, all)?;
        Ok(len)
    }

    /// Remove `delete_count` elements at `start` (to the end when `None`),
    /// insert `items` in their place, and return the removed elements.
    pub fn array_splice(
        &mut self,
        arr: ArrHandle,
        start: usize,
        delete_count: Option<usize>,
        items: Vec<Value>,
    ) -> EngineResult<Vec<Value>> {
        self.ensure_writable()?;
        let mut values = self.array_values(arr)?;
        let start = start.min(values.len());
        let delete_count = delete_count
            .unwrap_or(values.len() - start)
            .min(values.len() - start);
        let removed: Vec<Value> = values.splice(start..start + delete_count, items).collect();
        self.array_write_all(arr, values)?;
        Ok(removed)
    }

    /// Copy out `[start, end)` (to the end when `None`), clamped.
    pub fn array_slice(
        &mut self,
        arr: ArrHandle,
        start: usize,
        end: Option<usize>,
    ) -> EngineResult<Vec<Value>> {
        let values = self.array_values(arr)?;
        let start = start.min(values.len());
        let end = end.unwrap_or(values.len()).clamp(start, values.len());
        Ok(values[start..end].to_vec())
    }

    /// Reverse in place.
    pub fn array_reverse(&mut self, arr: ArrHandle) -> EngineResult<()> {
        self.ensure_writable()?;
        let mut values = self.array_values(arr)?;
        values.reverse();
        self.array_write_all(arr, values)
    }

    /// Stable in-place sort with a caller comparator.
    pub fn array_sort_by<F>(&mut self, arr: ArrHandle, mut cmp: F) -> EngineResult<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.ensure_writable()?;
        let mut values = self.array_values(arr)?;
        values.sort_by(|a, b| cmp(a, b));
        self.array_write_all(arr, values)
    }

    /// Sort with the comparator omitted: every pair compares equal, so the
    /// stable sort leaves the existing order intact.
    pub fn array_sort(&mut self, arr: ArrHandle) -> EngineResult<()> {
        self.array_sort_by(arr, |_, _| Ordering::Equal)
    }

    /// Element at `index`, counting from the end when negative.
    pub fn array_at(&mut self, arr: ArrHandle, index: i64) -> EngineResult<Option<Value>> {
        let len = self.array_length(arr)? as i64;
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return Ok(None);
        }
        self.array_get(arr, index as usize)
    }

    /// Whether any element equals `needle`. Handle equality is identity.
    pub fn array_includes(&mut self, arr: ArrHandle, needle: &Value) -> EngineResult<bool> {
        Ok(self.array_index_of(arr, needle)?.is_some())
    }

    /// Index of the first element equal to `needle`.
    pub fn array_index_of(&mut self, arr: ArrHandle, needle: &Value) -> EngineResult<Option<usize>> {
        let values = self.array_values(arr)?;
        Ok(values.iter().position(|value| value == needle))
    }

    /// Index of the last element equal to `needle`.
    pub fn array_last_index_of(
        &mut self,
        arr: ArrHandle,
        needle: &Value,
    ) -> EngineResult<Option<usize>> {
        let values = self.array_values(arr)?;
        Ok(values.iter().rposition(|value| value == needle))
    }

    /// First element matching the predicate.
    pub fn array_find<F>(&mut self, arr: ArrHandle, mut pred: F) -> EngineResult<Option<Value>>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            if pred(self, &value, index)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Index of the first element matching the predicate.
    pub fn array_find_index<F>(&mut self, arr: ArrHandle, mut pred: F) -> EngineResult<Option<usize>>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            if pred(self, &value, index)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Last element matching the predicate.
    pub fn array_find_last<F>(&mut self, arr: ArrHandle, mut pred: F) -> EngineResult<Option<Value>>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        let values = self.array_values(arr)?;
        for (index, value) in values.into_iter().enumerate().rev() {
            if pred(self, &value, index)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Index of the last element matching the predicate.
    pub fn array_find_last_index<F>(
        &mut self,
        arr: ArrHandle,
        mut pred: F,
    ) -> EngineResult<Option<usize>>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        let values = self.array_values(arr)?;
        for (index, value) in values.into_iter().enumerate().rev() {
            if pred(self, &value, index)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Elements matching the predicate, in order.
    pub fn array_filter<F>(&mut self, arr: ArrHandle, mut pred: F) -> EngineResult<Vec<Value>>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        let mut out = Vec::new();
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            if pred(self, &value, index)? {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Transform every element, in order.
    pub fn array_map<T, F>(&mut self, arr: ArrHandle, mut f: F) -> EngineResult<Vec<T>>
    where
        F: FnMut(&mut Transaction, Value, usize) -> EngineResult<T>,
    {
        let mut out = Vec::new();
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            out.push(f(self, value, index)?);
        }
        Ok(out)
    }

    /// Visit every element, in order.
    pub fn array_for_each<F>(&mut self, arr: ArrHandle, mut f: F) -> EngineResult<()>
    where
        F: FnMut(&mut Transaction, Value, usize) -> EngineResult<()>,
    {
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            f(self, value, index)?;
        }
        Ok(())
    }

    /// Whether the predicate holds for every element.
    pub fn array_every<F>(&mut self, arr: ArrHandle, mut pred: F) -> EngineResult<bool>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            if !pred(self, &value, index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether the predicate holds for any element.
    pub fn array_some<F>(&mut self, arr: ArrHandle, mut pred: F) -> EngineResult<bool>
    where
        F: FnMut(&mut Transaction, &Value, usize) -> EngineResult<bool>,
    {
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            if pred(self, &value, index)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Left-to-right fold.
    pub fn array_reduce<A, F>(&mut self, arr: ArrHandle, init: A, mut f: F) -> EngineResult<A>
    where
        F: FnMut(&mut Transaction, A, Value, usize) -> EngineResult<A>,
    {
        let mut acc = init;
        for (index, value) in self.array_values(arr)?.into_iter().enumerate() {
            acc = f(self, acc, value, index)?;
        }
        Ok(acc)
    }

    /// Right-to-left fold.
    pub fn array_reduce_right<A, F>(&mut self, arr: ArrHandle, init: A, mut f: F) -> EngineResult<A>
    where
        F: FnMut(&mut Transaction, A, Value, usize) -> EngineResult<A>,
    {
        let mut acc = init;
        let values = self.array_values(arr)?;
        for (index, value) in values.into_iter().enumerate().rev() {
            acc = f(self, acc, value, index)?;
        }
        Ok(acc)
    }

    /// Join elements with a separator. Scalars render their text form;
    /// nested containers render as their kind in brackets.
    pub fn array_join(&mut self, arr: ArrHandle, separator: &str) -> EngineResult<String> {
        let parts: Vec<String> = self
            .array_values(arr)?
            .iter()
            .map(|value| match value {
                Value::Scalar(scalar) => scalar.to_string(),
                Value::Object(_) => "[object]".to_string(),
                Value::Array(_) => "[array]".to_string(),
                Value::Map(_) => "[map]".to_string(),
                Value::Blob(_) => "[blob]".to_string(),
            })
            .collect();
        Ok(parts.join(separator))
    }

    /// `(index, element)` pairs, in order.
    pub fn array_entries(&mut self, arr: ArrHandle) -> EngineResult<Vec<(usize, Value)>> {
        Ok(self.array_values(arr)?.into_iter().enumerate().collect())
    }

    /// Snapshot of every element, in order. Unoccupied indices read as null.
    pub fn array_values(&mut self, arr: ArrHandle) -> EngineResult<Vec<Value>> {
        if let Some(id) = self.remote_id(arr.node()) {
            let len = self.backend.array_length(self.txn, &id)?;
            let mut out = Vec::with_capacity(len);
            for index in 0..len {
                let stored = self
                    .backend
                    .array_get(self.txn, &id, index)?
                    .unwrap_or(StoredValue::Scalar(Scalar::Null));
                out.push(self.value_from_stored(stored)?);
            }
            Ok(out)
        } else {
            let slots = self.local_slots(arr);
            Ok(slots.iter().map(|slot| self.slot_to_value(slot)).collect())
        }
    }

    fn local_slots(&self, arr: ArrHandle) -> Vec<Slot> {
        match self.arena.node(arr.node()) {
            Node::Array { items } => items.clone(),
            _ => unreachable!("array handle points at a non-array node"),
        }
    }

    /// Replace the whole contents, truncating anything past the new length.
    fn array_write_all(&mut self, arr: ArrHandle, values: Vec<Value>) -> EngineResult<()> {
        if let Some(id) = self.remote_id(arr.node()) {
            for (index, value) in values.iter().enumerate() {
                let stored = self.stored_from_value(value)?;
                self.backend.array_set(self.txn, &id, index, stored)?;
            }
            self.backend.array_truncate(self.txn, &id, values.len())?;
        } else {
            let slots: Vec<Slot> = values.iter().map(value_to_slot).collect();
            match self.arena.node_mut(arr.node()) {
                Node::Array { items } => *items = slots,
                _ => unreachable!("array handle points at a non-array node"),
            }
        }
        Ok(())
    }
}
