//! Wire-level data model for Loam.
//!
//! This crate defines the types that cross the persistence boundary: the
//! opaque identifiers the engine mints, the closed set of copy-by-value
//! scalars, the typed references that replace in-memory pointers, and the
//! flat record shapes the backing store holds. Every other Loam crate
//! depends on `loam-types`.
//!
//! # Key Types
//!
//! - [`RecordId`] — Opaque, engine-minted store identifier (UUID-v4-shaped)
//! - [`Scalar`] — Copy-by-value primitives (null, bool, number, big integer,
//!   text, date, pattern, URL, error value)
//! - [`Reference`] — Typed pointer (kind + id + optional type tag) from one
//!   stored value to another
//! - [`StoredValue`] — Scalar-or-reference: the value cell of every record
//!   field, array element, and map entry
//! - [`FlatRecord`] — One flattened object as the store holds it
//! - [`BlobValue`] — Raw bytes plus a media-type string

pub mod error;
pub mod id;
pub mod record;
pub mod reference;
pub mod scalar;

pub use error::TypeError;
pub use id::{RecordId, TxnId};
pub use record::{BlobValue, FlatRecord, StoredValue};
pub use reference::{RefKind, Reference};
pub use scalar::{BigInt, ErrorValue, Scalar};
