//! Key-value collection emulation.
//!
//! Entries round-trip non-scalar values as typed references exactly like
//! record properties. Absent keys read as `None` and delete as `false`,
//! never as errors. Iteration order is key order.

use crate::error::EngineResult;
use crate::graph::{Node, Slot};
use crate::transaction::{value_to_slot, Transaction};
use crate::value::{MapHandle, Value};

impl Transaction {
    /// Read one entry. `Ok(None)` when the key is absent.
    pub fn map_get(&mut self, map: MapHandle, key: &str) -> EngineResult<Option<Value>> {
        if let Some(id) = self.remote_id(map.node()) {
            match self.backend.map_get(self.txn, &id, key)? {
                Some(stored) => Ok(Some(self.value_from_stored(stored)?)),
                None => Ok(None),
            }
        } else {
            let slot = match self.arena.node(map.node()) {
                Node::Map { entries } => entries.get(key).cloned(),
                _ => unreachable!("map handle points at a non-map node"),
            };
            Ok(slot.map(|slot| self.slot_to_value(&slot)))
        }
    }

    /// Write one entry.
    pub fn map_set(
        &mut self,
        map: MapHandle,
        key: &str,
        value: impl Into<Value>,
    ) -> EngineResult<()> {
        self.ensure_writable()?;
        let value = value.into();
        if let Some(id) = self.remote_id(map.node()) {
            let stored = self.stored_from_value(&value)?;
            self.backend.map_set(self.txn, &id, key, stored)?;
        } else {
            let slot = value_to_slot(&value);
            match self.arena.node_mut(map.node()) {
                Node::Map { entries } => {
                    entries.insert(key.to_string(), slot);
                }
                _ => unreachable!("map handle points at a non-map node"),
            }
        }
        Ok(())
    }

    /// Whether the key is present.
    pub fn map_has(&mut self, map: MapHandle, key: &str) -> EngineResult<bool> {
        if let Some(id) = self.remote_id(map.node()) {
            Ok(self.backend.map_has(self.txn, &id, key)?)
        } else {
            match self.arena.node(map.node()) {
                Node::Map { entries } => Ok(entries.contains_key(key)),
                _ => unreachable!("map handle points at a non-map node"),
            }
        }
    }

    /// Remove one entry. `Ok(false)` on an absent key.
    pub fn map_delete(&mut self, map: MapHandle, key: &str) -> EngineResult<bool> {
        self.ensure_writable()?;
        if let Some(id) = self.remote_id(map.node()) {
            Ok(self.backend.map_delete(self.txn, &id, key)?)
        } else {
            match self.arena.node_mut(map.node()) {
                Node::Map { entries } => Ok(entries.remove(key).is_some()),
                _ => unreachable!("map handle points at a non-map node"),
            }
        }
    }

    /// Remove every entry.
    pub fn map_clear(&mut self, map: MapHandle) -> EngineResult<()> {
        self.ensure_writable()?;
        if let Some(id) = self.remote_id(map.node()) {
            Ok(self.backend.map_clear(self.txn, &id)?)
        } else {
            match self.arena.node_mut(map.node()) {
                Node::Map { entries } => {
                    entries.clear();
                    Ok(())
                }
                _ => unreachable!("map handle points at a non-map node"),
            }
        }
    }

    /// Number of entries.
    pub fn map_size(&mut self, map: MapHandle) -> EngineResult<usize> {
        if let Some(id) = self.remote_id(map.node()) {
            Ok(self.backend.map_size(self.txn, &id)?)
        } else {
            match self.arena.node(map.node()) {
                Node::Map { entries } => Ok(entries.len()),
                _ => unreachable!("map handle points at a non-map node"),
            }
        }
    }

    /// All keys, in key order.
    pub fn map_keys(&mut self, map: MapHandle) -> EngineResult<Vec<String>> {
        if let Some(id) = self.remote_id(map.node()) {
            Ok(self.backend.map_keys(self.txn, &id)?)
        } else {
            match self.arena.node(map.node()) {
                Node::Map { entries } => Ok(entries.keys().cloned().collect()),
                _ => unreachable!("map handle points at a non-map node"),
            }
        }
    }

    /// All values, in key order.
    pub fn map_values(&mut self, map: MapHandle) -> EngineResult<Vec<Value>> {
        Ok(self
            .map_entries(map)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// All entries, in key order.
    pub fn map_entries(&mut self, map: MapHandle) -> EngineResult<Vec<(String, Value)>> {
        if let Some(id) = self.remote_id(map.node()) {
            let mut out = Vec::new();
            for (key, stored) in self.backend.map_entries(self.txn, &id)? {
                let value = self.value_from_stored(stored)?;
                out.push((key, value));
            }
            Ok(out)
        } else {
            let slots: Vec<(String, Slot)> = match self.arena.node(map.node()) {
                Node::Map { entries } => entries
                    .iter()
                    .map(|(key, slot)| (key.clone(), slot.clone()))
                    .collect(),
                _ => unreachable!("map handle points at a non-map node"),
            };
            Ok(slots
                .into_iter()
                .map(|(key, slot)| {
                    let value = self.slot_to_value(&slot);
                    (key, value)
                })
                .collect())
        }
    }

    /// Visit every entry, in key order.
    pub fn map_for_each<F>(&mut self, map: MapHandle, mut f: F) -> EngineResult<()>
    where
        F: FnMut(&mut Transaction, &str, Value) -> EngineResult<()>,
    {
        for (key, value) in self.map_entries(map)? {
            f(self, &key, value)?;
        }
        Ok(())
    }
}
