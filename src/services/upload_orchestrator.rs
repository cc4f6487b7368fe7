//! Drives the end-to-end upload of one batch of media items.
//!
//! Files are uploaded sequentially, and parts within a file sequentially:
//! part N+1 is not read from disk until part N is acknowledged. Only one
//! chunk buffer is resident at a time, and progress stays strictly
//! monotonic. One batch may be in flight process-wide.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::UploaderConfig;
use crate::models::manifest::UploadManifestEntry;
use crate::models::media::{MediaError, MediaItem};
use crate::models::multipart::UploadPart;
use crate::services::chunk_reader::{ChunkReadError, ChunkReader};
use crate::services::multipart_session::{MultipartSession, SessionError, part_layout};
use crate::services::storage_transport::StorageTransport;

/// Base delay between retries of one part; grows linearly per attempt.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// What sank an individual item.
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error(transparent)]
    Read(#[from] ChunkReadError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("an upload batch is already in flight")]
    ConcurrentBatch,
    #[error("item {index} rejected before upload: {source}")]
    InvalidItem {
        index: usize,
        #[source]
        source: MediaError,
    },
    #[error("upload of `{file}` (item {index}) failed: {source}")]
    Item {
        /// 0-based position of the failed item in the batch.
        index: usize,
        file: String,
        #[source]
        source: ItemFailure,
    },
    #[error("upload batch cancelled")]
    Cancelled,
}

pub type BatchResult<T> = Result<T, BatchError>;

/// Byte-level progress after one acknowledged part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 0-based index of the item currently uploading.
    pub item_index: usize,
    pub total_items: usize,
    pub bytes_sent_for_item: u64,
    pub item_total_bytes: u64,
    pub batch_bytes_sent: u64,
    pub batch_total_bytes: u64,
}

impl ProgressUpdate {
    /// Overall completion in [0, 1].
    pub fn fraction(&self) -> f64 {
        if self.batch_total_bytes == 0 {
            0.0
        } else {
            self.batch_bytes_sent as f64 / self.batch_total_bytes as f64
        }
    }
}

/// Receives progress updates in completion order, never duplicated.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Uploads a batch of media items and produces the manifest for the post.
pub struct UploadOrchestrator {
    transport: Arc<dyn StorageTransport>,
    cfg: UploaderConfig,
    batch_in_flight: AtomicBool,
}

/// Releases the single-flight slot on every exit path.
struct FlightSlot<'a>(&'a AtomicBool);

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadOrchestrator {
    pub fn new(transport: Arc<dyn StorageTransport>, cfg: UploaderConfig) -> Self {
        Self {
            transport,
            cfg,
            batch_in_flight: AtomicBool::new(false),
        }
    }

    /// Upload every item in order and return one manifest entry per item.
    ///
    /// The batch is all-or-nothing: a failed item aborts its session and
    /// fails the whole batch; entries for files that did finish are not
    /// surfaced. Objects already finalized for earlier files stay behind in
    /// the store (accepted orphan tradeoff; a hardening pass would add a
    /// compensating delete).
    pub async fn run_batch(
        &self,
        items: &[MediaItem],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchResult<Vec<UploadManifestEntry>> {
        if self.batch_in_flight.swap(true, Ordering::SeqCst) {
            return Err(BatchError::ConcurrentBatch);
        }
        let _slot = FlightSlot(&self.batch_in_flight);

        for (index, item) in items.iter().enumerate() {
            item.validate(&self.cfg)
                .map_err(|source| BatchError::InvalidItem { index, source })?;
        }

        let batch_total_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();
        let mut batch_bytes_sent = 0u64;
        let mut manifest = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }
            let entry = self
                .upload_item(
                    index,
                    items.len(),
                    item,
                    progress,
                    cancel,
                    &mut batch_bytes_sent,
                    batch_total_bytes,
                )
                .await?;
            manifest.push(entry);
        }

        info!(
            items = items.len(),
            bytes = batch_total_bytes,
            "upload batch complete"
        );
        Ok(manifest)
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_item(
        &self,
        index: usize,
        total_items: usize,
        item: &MediaItem,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        batch_bytes_sent: &mut u64,
        batch_total_bytes: u64,
    ) -> BatchResult<UploadManifestEntry> {
        let fail = |source: ItemFailure| BatchError::Item {
            index,
            file: item.file_name().to_string(),
            source,
        };

        let mut reader = ChunkReader::open(&item.uri)
            .await
            .map_err(|e| fail(e.into()))?;
        reader
            .verify_declared_size(item.size_bytes)
            .map_err(|e| fail(e.into()))?;

        let parts = part_layout(item.size_bytes, self.cfg.chunk_size_bytes);
        let mut session = MultipartSession::initiate(
            self.transport.clone(),
            &self.cfg.bucket,
            item.file_name(),
            &item.mime_type,
            parts.len() as u32,
        )
        .await
        .map_err(|e| fail(e.into()))?;

        let mut item_bytes_sent = 0u64;
        for part in &parts {
            if cancel.is_cancelled() {
                session.abort().await;
                return Err(BatchError::Cancelled);
            }

            let bytes = match reader.read_chunk(part.offset, part.size_bytes).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    session.abort().await;
                    return Err(fail(err.into()));
                }
            };

            if let Err(err) = self.upload_part_with_retries(&mut session, part, bytes).await {
                session.abort().await;
                return Err(fail(err.into()));
            }

            item_bytes_sent += part.size_bytes;
            *batch_bytes_sent += part.size_bytes;
            progress.on_progress(&ProgressUpdate {
                item_index: index,
                total_items,
                bytes_sent_for_item: item_bytes_sent,
                item_total_bytes: item.size_bytes,
                batch_bytes_sent: *batch_bytes_sent,
                batch_total_bytes,
            });
        }

        if cancel.is_cancelled() {
            session.abort().await;
            return Err(BatchError::Cancelled);
        }

        let object = match session.complete().await {
            Ok(object) => object,
            Err(err) => {
                session.abort().await;
                return Err(fail(err.into()));
            }
        };

        Ok(UploadManifestEntry {
            url: object.location,
            key: object.key,
            mime: item.mime_type.clone(),
            kind: item.kind(),
            width: item.width,
            height: item.height,
        })
    }

    /// Retry the same part in place, reusing the buffer already read.
    /// Other parts are never re-read. Only part-level transport failures
    /// are retryable.
    async fn upload_part_with_retries(
        &self,
        session: &mut MultipartSession,
        part: &UploadPart,
        bytes: bytes::Bytes,
    ) -> Result<(), SessionError> {
        let mut attempt = 0u32;
        loop {
            match session.upload_part(part, bytes.clone()).await {
                Ok(()) => return Ok(()),
                Err(err @ SessionError::Part { .. }) => {
                    if attempt >= self.cfg.max_part_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = RETRY_DELAY * attempt;
                    tokio::time::sleep(delay).await;
                    info!(
                        key = %session.key(),
                        part = part.part_number,
                        "Retrying part upload (attempt {}/{}): {err}",
                        attempt,
                        self.cfg.max_part_retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("bucket", &self.cfg.bucket)
            .field("chunk_size_bytes", &self.cfg.chunk_size_bytes)
            .field(
                "batch_in_flight",
                &self.batch_in_flight.load(Ordering::SeqCst),
            )
            .finish()
    }
}

// Exercised end-to-end against a mock transport in tests/pipeline.rs.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction_is_bounded() {
        let update = ProgressUpdate {
            item_index: 0,
            total_items: 1,
            bytes_sent_for_item: 5,
            item_total_bytes: 10,
            batch_bytes_sent: 5,
            batch_total_bytes: 10,
        };
        assert!((update.fraction() - 0.5).abs() < f64::EPSILON);

        let empty = ProgressUpdate {
            batch_total_bytes: 0,
            batch_bytes_sent: 0,
            ..update
        };
        assert_eq!(empty.fraction(), 0.0);
    }
}
