use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::RecordId;

/// The four reference kinds, distinct on the wire and in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    Object,
    Array,
    Map,
    Blob,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefKind::Object => "object",
            RefKind::Array => "array",
            RefKind::Map => "map",
            RefKind::Blob => "blob",
        };
        write!(f, "{name}")
    }
}

/// A typed pointer from one stored value to another.
///
/// References replace in-memory pointers at the persistence boundary. They
/// carry no owning semantics — the backing store, not the in-memory graph,
/// owns records. `type_tag` is only present on object references whose
/// runtime type is a registered custom class.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: RefKind,
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
}

impl Reference {
    pub fn new(kind: RefKind, id: RecordId) -> Self {
        Self {
            kind,
            id,
            type_tag: None,
        }
    }

    pub fn object(id: RecordId) -> Self {
        Self::new(RefKind::Object, id)
    }

    pub fn array(id: RecordId) -> Self {
        Self::new(RefKind::Array, id)
    }

    pub fn map(id: RecordId) -> Self {
        Self::new(RefKind::Map, id)
    }

    pub fn blob(id: RecordId) -> Self {
        Self::new(RefKind::Blob, id)
    }

    /// An object reference tagged with a registered custom class name.
    pub fn tagged(id: RecordId, type_tag: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Object,
            id,
            type_tag: Some(type_tag.into()),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_tag {
            Some(tag) => write!(f, "{}:{} ({tag})", self.kind, self.id),
            None => write!(f, "{}:{}", self.kind, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_on_the_wire() {
        let id = RecordId::mint();
        let obj = serde_json::to_string(&Reference::object(id.clone())).unwrap();
        let arr = serde_json::to_string(&Reference::array(id.clone())).unwrap();
        let map = serde_json::to_string(&Reference::map(id.clone())).unwrap();
        let blob = serde_json::to_string(&Reference::blob(id)).unwrap();
        assert_ne!(obj, arr);
        assert_ne!(arr, map);
        assert_ne!(map, blob);
    }

    #[test]
    fn untagged_reference_omits_tag_field() {
        let reference = Reference::object(RecordId::new("x").unwrap());
        let json = serde_json::to_string(&reference).unwrap();
        assert!(!json.contains("type_tag"));
    }

    #[test]
    fn tagged_reference_roundtrips() {
        let reference = Reference::tagged(RecordId::new("x").unwrap(), "Counter");
        let json = serde_json::to_string(&reference).unwrap();
        let parsed: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reference);
        assert_eq!(parsed.type_tag.as_deref(), Some("Counter"));
    }
}
