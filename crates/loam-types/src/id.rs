use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque identifier for a stored record, array, map, or blob.
///
/// Ids are minted by the engine, never by the store, and are globally
/// unique within a namespace. On the wire an id is an opaque string;
/// [`RecordId::mint`] produces UUID-v4-shaped ids.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a fresh, globally unique id.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string.
    ///
    /// The store treats ids as opaque, so any non-empty string is accepted.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidId("id must not be empty".to_string()));
        }
        Ok(Self(id))
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend transaction identifier.
///
/// Minted by the backend at `begin`; every data operation carries one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(u64);

impl TxnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_is_unique() {
        let a = RecordId::mint();
        let b = RecordId::mint();
        assert_ne!(a, b);
    }

    #[test]
    fn mint_is_uuid_shaped() {
        let id = RecordId::mint();
        let s = id.as_str();
        assert_eq!(s.len(), 36);
        assert_eq!(s.matches('-').count(), 4);
    }

    #[test]
    fn new_rejects_empty() {
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("abc").is_ok());
    }

    #[test]
    fn serde_is_transparent() {
        let id = RecordId::new("some-id").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"some-id\"");
        let parsed: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn txn_id_roundtrip() {
        let t = TxnId::new(42);
        assert_eq!(t.raw(), 42);
        assert_eq!(format!("{t}"), "txn#42");
    }
}
