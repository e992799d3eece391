//! Object-graph persistence engine.
//!
//! Scripts work with ordinary-looking object graphs (records, arrays, maps,
//! blobs) while every mutation is transparently persisted to a key-value
//! backing store. Callers never see store identifiers: they hold typed
//! handles into a per-scope arena, the engine resolves references lazily on
//! access, and whole graphs are flattened on [`Transaction::set_root`] /
//! [`Transaction::set_object`].
//!
//! The pieces:
//! - [`Database`]: wires a [`Backend`], a [`BlobStore`], and a
//!   [`TypeRegistry`] together; hands out scopes and carries the ambient
//!   convenience scope.
//! - [`Transaction`]: one scope — an arena of nodes, an identity cache, and
//!   a store transaction. All graph operations are methods on it.
//! - [`Value`] and the typed handles ([`ObjHandle`], [`ArrHandle`],
//!   [`MapHandle`], [`BlobHandle`]): what operations accept and return.
//! - [`CustomClass`]: behavior reattached to tagged records on hydration.
//! - [`Deferred`]: the future returned by byte-returning blob reads, the
//!   engine's only asynchronous boundary.
//!
//! # Design rules
//!
//! - Handle equality is graph identity; hydrating one id twice in a scope
//!   yields the same handle.
//! - Mutations through persisted handles hit the store immediately under
//!   the scope's transaction; other scopes see them only after commit.
//! - Flattening uses an explicit work stack and a visited set; cycles and
//!   shared subgraphs are first-class.
//! - Absent lookups are `Ok(None)`, never errors; dangling references and
//!   unregistered type tags are errors, never `None`.
//!
//! [`Backend`]: loam_store::Backend
//! [`BlobStore`]: loam_store::BlobStore

mod array;
mod blob;
mod cache;
mod database;
mod error;
mod graph;
mod hydrate;
mod json;
mod map;
mod registry;
mod serialize;
mod transaction;
mod value;

pub use blob::Deferred;
pub use database::Database;
pub use error::{EngineError, EngineResult};
pub use registry::{CustomClass, TypeRegistry};
pub use transaction::Transaction;
pub use value::{ArrHandle, BlobHandle, MapHandle, ObjHandle, Value};
