//! The engine-level value model: scalars plus typed graph handles.
//!
//! A [`Value`] is what container operations accept and return. Scalars are
//! copied by value; objects, arrays, maps, and blobs travel as cheap `Copy`
//! handles into the owning scope's arena. Handle equality is graph identity:
//! two handles compare equal exactly when they name the same node, which is
//! how shared references and cycles stay observable after a round trip.

use loam_types::{BigInt, Scalar};

use crate::graph::NodeId;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) NodeId);

        impl $name {
            pub(crate) fn node(self) -> NodeId {
                self.0
            }
        }
    };
}

handle! {
    /// Handle to an object (a record with named fields).
    ObjHandle
}
handle! {
    /// Handle to an index-addressed array.
    ArrHandle
}
handle! {
    /// Handle to a string-keyed map.
    MapHandle
}
handle! {
    /// Handle to a byte blob.
    BlobHandle
}

/// Any value a property, element, or entry can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Object(ObjHandle),
    Array(ArrHandle),
    Map(MapHandle),
    Blob(BlobHandle),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjHandle> {
        match self {
            Value::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrHandle> {
        match self {
            Value::Array(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<MapHandle> {
        match self {
            Value::Map(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<BlobHandle> {
        match self {
            Value::Blob(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The number payload, if this is a `Number` scalar.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// The text payload, if this is a `Text` scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(Scalar::Bool(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(Scalar::Number(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Scalar(Scalar::Number(value as f64))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(Scalar::Text(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Scalar(Scalar::Text(value))
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::Scalar(Scalar::Int(value))
    }
}

impl From<ObjHandle> for Value {
    fn from(handle: ObjHandle) -> Self {
        Value::Object(handle)
    }
}

impl From<ArrHandle> for Value {
    fn from(handle: ArrHandle) -> Self {
        Value::Array(handle)
    }
}

impl From<MapHandle> for Value {
    fn from(handle: MapHandle) -> Self {
        Value::Map(handle)
    }
}

impl From<BlobHandle> for Value {
    fn from(handle: BlobHandle) -> Self {
        Value::Blob(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversions() {
        assert_eq!(Value::from(1.5).as_number(), Some(1.5));
        assert_eq!(Value::from("hi").as_text(), Some("hi"));
        assert!(Value::from(true).is_scalar());
        assert!(Value::null().is_null());
    }

    #[test]
    fn accessors_reject_other_kinds() {
        let value = Value::from(2.0);
        assert!(value.as_object().is_none());
        assert!(value.as_array().is_none());
        assert!(value.as_map().is_none());
        assert!(value.as_blob().is_none());
        assert!(value.as_text().is_none());
    }
}
