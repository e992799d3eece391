//! Backing-store boundary for Loam.
//!
//! This crate defines the primitive operations the persistence engine
//! depends on and ships reference implementations of them. The store never
//! interprets object graphs — it only sees flat records, index-addressed
//! array cells, key-addressed map entries, opaque blobs, and root aliases.
//! All identifiers are minted by the engine; the store treats them as
//! opaque strings.
//!
//! # Interfaces
//!
//! - [`Backend`] — transactional record/array/map/alias primitives
//! - [`BlobStore`] — byte storage with media-type metadata
//!
//! # Implementations
//!
//! - [`InMemoryBackend`] — snapshot-per-transaction store for tests and
//!   embedding
//! - [`InMemoryBlobStore`] — `HashMap`-based blob storage
//! - [`FsBlobStore`] — one data file plus one media-type sidecar per blob
//!
//! # Design Rules
//!
//! 1. Uncommitted writes are visible only to their own transaction.
//! 2. `commit` publishes a transaction's writes atomically; the store
//!    serializes concurrent commits itself.
//! 3. Absent lookups return `Ok(None)` / `Ok(false)`, never errors — the
//!    engine relies on the error-vs-absent distinction.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod blob;
pub mod error;
pub mod gc;
pub mod memory;
pub mod traits;

pub use blob::{BlobStore, FsBlobStore, InMemoryBlobStore};
pub use error::{StoreError, StoreResult};
pub use gc::{mark_and_sweep, GcStats};
pub use memory::InMemoryBackend;
pub use traits::Backend;
