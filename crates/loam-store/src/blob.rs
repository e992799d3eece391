//! Blob storage: raw bytes with a media-type string, addressed by the same
//! engine-minted ids as everything else.
//!
//! Blob bytes are kept out of the transactional tables — they can be large
//! and are immutable once written, so they go straight to a [`BlobStore`].
//! A blob only becomes reachable once a committed record references it, so
//! an eagerly written blob from an uncommitted scope is just unreachable
//! garbage for the collector.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use loam_types::{BlobValue, RecordId};

use crate::error::{StoreError, StoreResult};

/// Byte storage with media-type metadata.
pub trait BlobStore: Send + Sync {
    /// Store a blob. Overwrites any previous value under the same id.
    fn put(&self, id: &RecordId, blob: BlobValue) -> StoreResult<()>;

    /// Fetch a whole blob. Errors with `BlobNotFound` if absent.
    fn get(&self, id: &RecordId) -> StoreResult<BlobValue>;

    /// Whether a blob exists under `id`.
    fn contains(&self, id: &RecordId) -> StoreResult<bool>;

    /// Delete a blob. Returns `true` if it existed.
    fn delete(&self, id: &RecordId) -> StoreResult<bool>;

    /// Fetch a byte range, clamped to the blob's length.
    fn get_slice(&self, id: &RecordId, start: usize, end: usize) -> StoreResult<Vec<u8>> {
        let blob = self.get(id)?;
        let len = blob.data.len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        Ok(blob.data[start..end].to_vec())
    }

    /// Blob size in bytes.
    fn size(&self, id: &RecordId) -> StoreResult<usize> {
        Ok(self.get(id)?.data.len())
    }

    /// The blob's media-type string.
    fn media_type(&self, id: &RecordId) -> StoreResult<String> {
        Ok(self.get(id)?.media_type)
    }
}

/// In-memory blob storage for tests and embedding.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<RecordId, BlobValue>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, id: &RecordId, blob: BlobValue) -> StoreResult<()> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.insert(id.clone(), blob);
        Ok(())
    }

    fn get(&self, id: &RecordId) -> StoreResult<BlobValue> {
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))
    }

    fn contains(&self, id: &RecordId) -> StoreResult<bool> {
        let blobs = self.blobs.read().expect("lock poisoned");
        Ok(blobs.contains_key(id))
    }

    fn delete(&self, id: &RecordId) -> StoreResult<bool> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        Ok(blobs.remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

/// Filesystem blob storage: one `<id>.bin` data file and one `<id>.type`
/// media-type sidecar per blob under a root directory.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (creating if needed) a blob store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn data_path(&self, id: &RecordId) -> PathBuf {
        self.root.join(format!("{id}.bin"))
    }

    fn type_path(&self, id: &RecordId) -> PathBuf {
        self.root.join(format!("{id}.type"))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, id: &RecordId, blob: BlobValue) -> StoreResult<()> {
        fs::write(self.data_path(id), &blob.data)?;
        fs::write(self.type_path(id), blob.media_type.as_bytes())?;
        Ok(())
    }

    fn get(&self, id: &RecordId) -> StoreResult<BlobValue> {
        let data = match fs::read(self.data_path(id)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::BlobNotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let media_type = fs::read_to_string(self.type_path(id))?;
        Ok(BlobValue { data, media_type })
    }

    fn contains(&self, id: &RecordId) -> StoreResult<bool> {
        Ok(self.data_path(id).exists())
    }

    fn delete(&self, id: &RecordId) -> StoreResult<bool> {
        let existed = self.data_path(id).exists();
        if existed {
            fs::remove_file(self.data_path(id))?;
            let _ = fs::remove_file(self.type_path(id));
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlobValue {
        BlobValue::new(vec![1, 2, 3, 4], "application/octet-stream")
    }

    // -----------------------------------------------------------------------
    // In-memory store
    // -----------------------------------------------------------------------

    #[test]
    fn put_get_roundtrip() {
        let store = InMemoryBlobStore::new();
        let id = RecordId::mint();
        store.put(&id, sample()).unwrap();
        assert_eq!(store.get(&id).unwrap(), sample());
        assert!(store.contains(&id).unwrap());
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryBlobStore::new();
        let id = RecordId::mint();
        assert!(matches!(
            store.get(&id),
            Err(StoreError::BlobNotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn slice_is_clamped() {
        let store = InMemoryBlobStore::new();
        let id = RecordId::mint();
        store.put(&id, sample()).unwrap();

        assert_eq!(store.get_slice(&id, 1, 3).unwrap(), vec![2, 3]);
        assert_eq!(store.get_slice(&id, 2, 100).unwrap(), vec![3, 4]);
        assert_eq!(store.get_slice(&id, 100, 200).unwrap(), Vec::<u8>::new());
        assert_eq!(store.get_slice(&id, 3, 1).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn size_and_media_type() {
        let store = InMemoryBlobStore::new();
        let id = RecordId::mint();
        store.put(&id, BlobValue::new(vec![0; 9], "text/plain")).unwrap();
        assert_eq!(store.size(&id).unwrap(), 9);
        assert_eq!(store.media_type(&id).unwrap(), "text/plain");
    }

    #[test]
    fn delete_then_absent() {
        let store = InMemoryBlobStore::new();
        let id = RecordId::mint();
        store.put(&id, sample()).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(!store.contains(&id).unwrap());
    }

    #[test]
    fn put_overwrites() {
        let store = InMemoryBlobStore::new();
        let id = RecordId::mint();
        store.put(&id, sample()).unwrap();
        store.put(&id, BlobValue::new(vec![9], "text/plain")).unwrap();
        assert_eq!(store.get(&id).unwrap().data, vec![9]);
        assert_eq!(store.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Filesystem store
    // -----------------------------------------------------------------------

    #[test]
    fn fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let id = RecordId::mint();

        store.put(&id, sample()).unwrap();
        assert_eq!(store.get(&id).unwrap(), sample());
        assert_eq!(store.size(&id).unwrap(), 4);
        assert_eq!(store.get_slice(&id, 1, 3).unwrap(), vec![2, 3]);

        assert!(store.delete(&id).unwrap());
        assert!(!store.contains(&id).unwrap());
        assert!(matches!(store.get(&id), Err(StoreError::BlobNotFound(_))));
    }

    #[test]
    fn fs_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = RecordId::mint();
        {
            let store = FsBlobStore::open(dir.path()).unwrap();
            store.put(&id, sample()).unwrap();
        }
        let reopened = FsBlobStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&id).unwrap(), sample());
    }
}
