//! Blob emulation.
//!
//! Byte-returning blob reads are the engine's only deferred operations: they
//! yield a [`Deferred`] future so callers on an async runtime can await
//! them, while the rest of the engine stays synchronous. Metadata reads
//! (`size`, media type) are synchronous.
//!
//! `slice` never mutates its source: it builds a fresh local blob from the
//! requested range, with the source's media type unless overridden.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use loam_types::BlobValue;

use crate::error::{EngineError, EngineResult};
use crate::graph::Node;
use crate::transaction::Transaction;
use crate::value::BlobHandle;

/// A blob I/O result that can be awaited or taken synchronously.
#[derive(Debug)]
pub struct Deferred<T> {
    result: Option<EngineResult<T>>,
}

impl<T> Deferred<T> {
    pub(crate) fn ready(result: EngineResult<T>) -> Self {
        Self {
            result: Some(result),
        }
    }

    /// Resolve without an executor.
    pub fn wait(mut self) -> EngineResult<T> {
        self.result.take().expect("deferred already consumed")
    }
}

impl<T: Unpin> Future for Deferred<T> {
    type Output = EngineResult<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = self
            .get_mut()
            .result
            .take()
            .expect("deferred polled after completion");
        Poll::Ready(result)
    }
}

impl Transaction {
    /// Blob size in bytes.
    pub fn blob_size(&mut self, blob: BlobHandle) -> EngineResult<usize> {
        if let Some(id) = self.remote_id(blob.node()) {
            Ok(self.blobs.size(&id)?)
        } else {
            Ok(self.local_blob(blob).len())
        }
    }

    /// The blob's media-type string.
    pub fn blob_media_type(&mut self, blob: BlobHandle) -> EngineResult<String> {
        if let Some(id) = self.remote_id(blob.node()) {
            Ok(self.blobs.media_type(&id)?)
        } else {
            Ok(self.local_blob(blob).media_type)
        }
    }

    /// The blob's bytes.
    pub fn blob_bytes(&mut self, blob: BlobHandle) -> Deferred<Vec<u8>> {
        Deferred::ready(self.fetch_bytes(blob))
    }

    /// The blob's bytes decoded as UTF-8 text.
    pub fn blob_text(&mut self, blob: BlobHandle) -> Deferred<String> {
        let result = self.fetch_bytes(blob).and_then(|bytes| {
            String::from_utf8(bytes)
                .map_err(|e| EngineError::InvalidArgument(format!("blob is not valid UTF-8: {e}")))
        });
        Deferred::ready(result)
    }

    /// A new blob holding bytes `[start, end)` of the source, clamped to its
    /// length. Negative bounds are rejected. The new blob carries
    /// `media_type` when given, otherwise the source's; the source is
    /// untouched either way.
    pub fn blob_slice(
        &mut self,
        blob: BlobHandle,
        start: i64,
        end: i64,
        media_type: Option<&str>,
    ) -> EngineResult<BlobHandle> {
        if start < 0 || end < 0 {
            return Err(EngineError::InvalidArgument(
                "blob slice bounds must be non-negative".to_string(),
            ));
        }
        let (start, end) = (start as usize, end as usize);

        let (data, source_type) = if let Some(id) = self.remote_id(blob.node()) {
            let data = self.blobs.get_slice(&id, start, end)?;
            (data, self.blobs.media_type(&id)?)
        } else {
            let source = self.local_blob(blob);
            let len = source.data.len();
            let start = start.min(len);
            let end = end.clamp(start, len);
            (source.data[start..end].to_vec(), source.media_type)
        };

        let media_type = media_type.map(str::to_string).unwrap_or(source_type);
        Ok(self.new_blob(data, media_type))
    }

    fn fetch_bytes(&mut self, blob: BlobHandle) -> EngineResult<Vec<u8>> {
        if let Some(id) = self.remote_id(blob.node()) {
            Ok(self.blobs.get(&id)?.data)
        } else {
            Ok(self.local_blob(blob).data)
        }
    }

    fn local_blob(&self, blob: BlobHandle) -> BlobValue {
        match self.arena.node(blob.node()) {
            Node::Blob { value } => value.clone(),
            _ => unreachable!("blob handle points at a non-blob node"),
        }
    }
}
