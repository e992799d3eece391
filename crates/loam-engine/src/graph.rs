//! The per-scope node arena.
//!
//! Every object, array, map, or blob a scope touches is a node in an arena
//! owned by that scope's [`Transaction`]. Handles are arena indices, so
//! shared references and cycles cost nothing and handle equality is graph
//! identity.
//!
//! A node starts [`local`] (its contents live in the arena, untouched by the
//! store) and is flipped in place to [`remote`] once the flattener assigns it
//! a record id and writes it out. Handles never move, so a handle taken
//! before persistence keeps working after it; reads and writes through a
//! remote node go straight to the store.
//!
//! [`Transaction`]: crate::transaction::Transaction
//! [`local`]: Node::Object
//! [`remote`]: Node::Remote

use std::collections::BTreeMap;

use loam_types::{BlobValue, RecordId, RefKind, Scalar};

/// Index of a node in its scope's arena. Meaningless outside that scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u32);

/// One field, element, or entry inside a local node.
#[derive(Clone, Debug)]
pub(crate) enum Slot {
    Scalar(Scalar),
    Node(NodeId),
}

/// A graph node: local contents, or a pointer into the store.
#[derive(Clone, Debug)]
pub(crate) enum Node {
    Object {
        type_tag: Option<String>,
        fields: BTreeMap<String, Slot>,
    },
    Array {
        items: Vec<Slot>,
    },
    Map {
        entries: BTreeMap<String, Slot>,
    },
    Blob {
        value: BlobValue,
    },
    /// A persisted node. Contents are re-fetched from the store on every
    /// access so a scope always sees its own latest writes.
    Remote {
        kind: RefKind,
        id: RecordId,
        type_tag: Option<String>,
    },
}

impl Node {
    /// The reference kind this node flattens to.
    pub(crate) fn kind(&self) -> RefKind {
        match self {
            Node::Object { .. } => RefKind::Object,
            Node::Array { .. } => RefKind::Array,
            Node::Map { .. } => RefKind::Map,
            Node::Blob { .. } => RefKind::Blob,
            Node::Remote { kind, .. } => *kind,
        }
    }

    pub(crate) fn type_tag(&self) -> Option<&str> {
        match self {
            Node::Object { type_tag, .. } | Node::Remote { type_tag, .. } => type_tag.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn is_remote(&self) -> bool {
        matches!(self, Node::Remote { .. })
    }
}

/// Append-only node storage for one scope.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return its index.
    ///
    /// Indices are `u32`, capping one scope at `u32::MAX` nodes; allocating
    /// past that bound panics.
    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("arena overflow"));
        self.nodes.push(node);
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Flip a node to its persisted form. Handles pointing at it stay valid.
    pub(crate) fn make_remote(&mut self, node: NodeId, kind: RefKind, id: RecordId, type_tag: Option<String>) {
        self.nodes[node.0 as usize] = Node::Remote { kind, id, type_tag };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_flip() {
        let mut arena = Arena::new();
        let node = arena.alloc(Node::Array { items: Vec::new() });
        assert_eq!(arena.node(node).kind(), RefKind::Array);
        assert!(!arena.node(node).is_remote());

        let id = RecordId::mint();
        arena.make_remote(node, RefKind::Array, id.clone(), None);
        assert!(arena.node(node).is_remote());
        match arena.node(node) {
            Node::Remote { kind, id: remote, .. } => {
                assert_eq!(*kind, RefKind::Array);
                assert_eq!(remote, &id);
            }
            other => panic!("expected remote node, got {other:?}"),
        }
    }

    #[test]
    fn handles_are_stable_across_allocs() {
        let mut arena = Arena::new();
        let first = arena.alloc(Node::Map {
            entries: BTreeMap::new(),
        });
        for _ in 0..100 {
            arena.alloc(Node::Array { items: Vec::new() });
        }
        assert_eq!(arena.node(first).kind(), RefKind::Map);
    }
}
