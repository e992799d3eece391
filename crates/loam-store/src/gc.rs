//! Mark-and-sweep garbage collection over committed state.
//!
//! A record is live iff it is reachable from some root alias by following
//! typed references through record fields, array elements, and map values.
//! The engine's only obligation is to stop referencing an object (property
//! deletion, index removal, alias rebinding); this pass reclaims whatever
//! that leaves behind.
//!
//! Blob bytes live in a [`BlobStore`], not the transactional tables, so the
//! collector reports the set of blob ids still live and leaves deleting the
//! rest to the caller.
//!
//! [`BlobStore`]: crate::blob::BlobStore

use std::collections::HashSet;

use tracing::debug;

use loam_types::{RecordId, RefKind, Reference, StoredValue};

use crate::error::StoreResult;
use crate::memory::{InMemoryBackend, NamespaceData};

/// What a collection pass reclaimed (and kept).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub swept_records: usize,
    pub swept_arrays: usize,
    pub swept_maps: usize,
    /// Blob ids still reachable; everything else in the blob store for this
    /// namespace may be deleted.
    pub live_blobs: HashSet<RecordId>,
}

/// Collect garbage in one namespace of an in-memory backend.
///
/// Runs over committed state only; open transactions hold their own
/// snapshots and are unaffected.
pub fn mark_and_sweep(backend: &InMemoryBackend, namespace: &str) -> StoreResult<GcStats> {
    let (live, live_blobs) = backend.with_committed(namespace, mark);

    let mut stats = GcStats {
        live_blobs,
        ..GcStats::default()
    };

    let swept = backend.with_committed(namespace, |data| {
        let mut next = data.clone();
        let before_records = next.records.len();
        let before_arrays = next.arrays.len();
        let before_maps = next.maps.len();

        next.records
            .retain(|id, _| live.contains(&(RefKind::Object, id.clone())));
        next.arrays
            .retain(|id, _| live.contains(&(RefKind::Array, id.clone())));
        next.maps
            .retain(|id, _| live.contains(&(RefKind::Map, id.clone())));

        stats.swept_records = before_records - next.records.len();
        stats.swept_arrays = before_arrays - next.arrays.len();
        stats.swept_maps = before_maps - next.maps.len();
        next
    });
    backend.replace_committed(namespace, swept);

    debug!(
        namespace,
        swept_records = stats.swept_records,
        swept_arrays = stats.swept_arrays,
        swept_maps = stats.swept_maps,
        "garbage collection pass finished"
    );
    Ok(stats)
}

/// Walk from every alias, returning the reachable (kind, id) set and the
/// live blob ids.
fn mark(data: &NamespaceData) -> (HashSet<(RefKind, RecordId)>, HashSet<RecordId>) {
    let mut live: HashSet<(RefKind, RecordId)> = HashSet::new();
    let mut live_blobs: HashSet<RecordId> = HashSet::new();
    let mut stack: Vec<Reference> = data.aliases.values().cloned().collect();

    while let Some(reference) = stack.pop() {
        if reference.kind == RefKind::Blob {
            live_blobs.insert(reference.id);
            continue;
        }
        if !live.insert((reference.kind, reference.id.clone())) {
            continue;
        }

        let mut follow = |value: &StoredValue| {
            if let StoredValue::Ref(child) = value {
                stack.push(child.clone());
            }
        };

        match reference.kind {
            RefKind::Object => {
                if let Some(record) = data.records.get(&reference.id) {
                    record.fields.values().for_each(&mut follow);
                }
            }
            RefKind::Array => {
                if let Some(items) = data.arrays.get(&reference.id) {
                    items.values().for_each(&mut follow);
                }
            }
            RefKind::Map => {
                if let Some(entries) = data.maps.get(&reference.id) {
                    entries.values().for_each(&mut follow);
                }
            }
            RefKind::Blob => unreachable!("blobs handled above"),
        }
    }

    (live, live_blobs)
}
