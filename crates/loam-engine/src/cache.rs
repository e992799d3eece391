//! Per-scope identity cache.
//!
//! The cache is the bijection between arena nodes and record ids within one
//! scope. Flattening consults it so an already-assigned node keeps its id
//! (shared references converge, cycles terminate); hydration consults it so
//! two reads of the same record id yield the same handle.
//!
//! Tagged instances carrying a string `id` field are additionally indexed by
//! that application id for [`get_instance`] lookup.
//!
//! [`get_instance`]: crate::transaction::Transaction::get_instance

use std::collections::HashMap;

use loam_types::RecordId;

use crate::graph::NodeId;

#[derive(Debug, Default)]
pub(crate) struct IdentityCache {
    node_to_id: HashMap<NodeId, RecordId>,
    id_to_node: HashMap<RecordId, NodeId>,
    instances: HashMap<String, NodeId>,
}

impl IdentityCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn id_for(&self, node: NodeId) -> Option<&RecordId> {
        self.node_to_id.get(&node)
    }

    pub(crate) fn node_for(&self, id: &RecordId) -> Option<NodeId> {
        self.id_to_node.get(id).copied()
    }

    pub(crate) fn bind(&mut self, node: NodeId, id: RecordId) {
        self.node_to_id.insert(node, id.clone());
        self.id_to_node.insert(id, node);
    }

    /// The node's assigned id, minting and binding a fresh one if absent.
    pub(crate) fn get_or_mint(&mut self, node: NodeId) -> RecordId {
        if let Some(id) = self.node_to_id.get(&node) {
            return id.clone();
        }
        let id = RecordId::mint();
        self.bind(node, id.clone());
        id
    }

    pub(crate) fn index_instance(&mut self, app_id: impl Into<String>, node: NodeId) {
        self.instances.insert(app_id.into(), node);
    }

    pub(crate) fn instance(&self, app_id: &str) -> Option<NodeId> {
        self.instances.get(app_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Arena, Node};
    use std::collections::BTreeMap;

    #[test]
    fn mint_is_stable_per_node() {
        let mut arena = Arena::new();
        let node = arena.alloc(Node::Object {
            type_tag: None,
            fields: BTreeMap::new(),
        });
        let mut cache = IdentityCache::new();

        let id = cache.get_or_mint(node);
        assert_eq!(cache.get_or_mint(node), id);
        assert_eq!(cache.node_for(&id), Some(node));
        assert_eq!(cache.id_for(node), Some(&id));
    }

    #[test]
    fn instance_index() {
        let mut arena = Arena::new();
        let node = arena.alloc(Node::Object {
            type_tag: Some("Counter".to_string()),
            fields: BTreeMap::new(),
        });
        let mut cache = IdentityCache::new();
        cache.index_instance("counter-1", node);
        assert_eq!(cache.instance("counter-1"), Some(node));
        assert_eq!(cache.instance("counter-2"), None);
    }
}
