use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reference::Reference;
use crate::scalar::Scalar;

/// The value cell of every record field, array element, and map entry:
/// either a scalar copied by value or a typed reference to another record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Scalar(Scalar),
    Ref(Reference),
}

impl StoredValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            StoredValue::Scalar(scalar) => Some(scalar),
            StoredValue::Ref(_) => None,
        }
    }

    pub fn as_ref(&self) -> Option<&Reference> {
        match self {
            StoredValue::Scalar(_) => None,
            StoredValue::Ref(reference) => Some(reference),
        }
    }
}

impl From<Scalar> for StoredValue {
    fn from(scalar: Scalar) -> Self {
        StoredValue::Scalar(scalar)
    }
}

impl From<Reference> for StoredValue {
    fn from(reference: Reference) -> Self {
        StoredValue::Ref(reference)
    }
}

/// One flattened object as the store holds it: a property-name → value
/// mapping, optionally tagged with the custom class whose behavior should
/// be reattached on hydration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    pub fields: BTreeMap<String, StoredValue>,
}

impl FlatRecord {
    pub fn new(type_tag: Option<String>) -> Self {
        Self {
            type_tag,
            fields: BTreeMap::new(),
        }
    }
}

/// Raw blob bytes plus their media type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobValue {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl BlobValue {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
