//! Drives one file's multipart upload from initiate to complete or abort.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::multipart::{
    CompletedPart, MultipartSessionState, SessionStatus, UploadPart,
};
use crate::services::storage_transport::{CompletedObject, StorageTransport, TransportError};

/// Protocol ceiling on parts per upload session.
const MAX_PARTS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not open upload session for `{key}`: {source}")]
    Init {
        key: String,
        #[source]
        source: TransportError,
    },
    #[error("part {part_number} upload failed: {source}")]
    Part {
        part_number: u32,
        #[source]
        source: TransportError,
    },
    #[error("part {got} out of order, expected part {expected}")]
    OutOfOrderPart { expected: u32, got: u32 },
    #[error("upload `{key}` cannot be finalized: {reason}")]
    IncompleteParts { key: String, reason: String },
    #[error("store rejected finalization of `{key}`: {source}")]
    Complete {
        key: String,
        #[source]
        source: TransportError,
    },
    #[error("operation not valid while session is {status:?}")]
    InvalidState { status: SessionStatus },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Compute the part schedule for a file: fixed strides of `chunk_size`
/// walked over `size_bytes`, the final part carrying the remainder.
///
/// A file whose size is an exact multiple of the chunk size gets a final
/// part equal to the stride, never a trailing zero-length part.
/// `chunk_size` must be > 0.
pub fn part_layout(size_bytes: u64, chunk_size: u64) -> Vec<UploadPart> {
    debug_assert!(chunk_size > 0);
    let mut parts = Vec::new();
    let mut offset = 0;
    while offset < size_bytes {
        let len = chunk_size.min(size_bytes - offset);
        parts.push(UploadPart {
            part_number: parts.len() as u32 + 1,
            offset,
            size_bytes: len,
        });
        offset += len;
    }
    parts
}

/// Derive a storage-safe object key from a local file name plus a
/// collision-avoidance qualifier.
pub fn derive_object_key(file_name: &str) -> String {
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    let qualifier = Uuid::new_v4().simple().to_string();
    match ext {
        Some(ext) => format!("{}-{}.{}", sanitize(stem), qualifier, sanitize(ext)),
        None => format!("{}-{}", sanitize(stem), qualifier),
    }
}

/// Lowercase and restrict to characters the store accepts in keys.
fn sanitize(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-' | '_') => c,
            _ => '-',
        })
        .collect();
    if out.chars().all(|c| c == '-') {
        out = "file".into();
    }
    out
}

/// Owns the lifecycle of one remote multipart upload for one file.
///
/// Retry policy lives in the orchestrator; this layer performs each
/// operation exactly once and keeps the session state honest.
pub struct MultipartSession {
    transport: Arc<dyn StorageTransport>,
    state: MultipartSessionState,
    total_parts: u32,
}

impl MultipartSession {
    /// Open a session for `file_name`, deriving the target key.
    pub async fn initiate(
        transport: Arc<dyn StorageTransport>,
        bucket: &str,
        file_name: &str,
        content_type: &str,
        total_parts: u32,
    ) -> SessionResult<Self> {
        let key = derive_object_key(file_name);
        let upload_id = transport
            .initiate_multipart_upload(bucket, &key, content_type)
            .await
            .map_err(|source| SessionError::Init {
                key: key.clone(),
                source,
            })?;
        debug!(%key, %upload_id, total_parts, "multipart session initiated");

        Ok(Self {
            transport,
            state: MultipartSessionState {
                upload_id,
                bucket: bucket.to_string(),
                key,
                initiated_at: Utc::now(),
                status: SessionStatus::Initiated,
                completed: Vec::new(),
            },
            total_parts,
        })
    }

    pub fn state(&self) -> &MultipartSessionState {
        &self.state
    }

    pub fn key(&self) -> &str {
        &self.state.key
    }

    /// Upload one part. Parts must arrive in part-number order; re-sending
    /// the part that just failed is the only permitted repeat, and since a
    /// failed part is never recorded it carries the same expected number.
    pub async fn upload_part(&mut self, part: &UploadPart, bytes: Bytes) -> SessionResult<()> {
        if !self.state.status.is_open() {
            return Err(SessionError::InvalidState {
                status: self.state.status,
            });
        }
        let expected = self.state.completed.len() as u32 + 1;
        if part.part_number != expected {
            return Err(SessionError::OutOfOrderPart {
                expected,
                got: part.part_number,
            });
        }

        self.state.status = SessionStatus::PartsInFlight;
        let etag = self
            .transport
            .upload_part(
                &self.state.bucket,
                &self.state.key,
                &self.state.upload_id,
                part.part_number,
                bytes,
            )
            .await
            .map_err(|source| SessionError::Part {
                part_number: part.part_number,
                source,
            })?;

        self.state.completed.push(CompletedPart {
            part_number: part.part_number,
            etag,
        });
        Ok(())
    }

    /// Finalize the session. Every scheduled part must have been
    /// acknowledged, in contiguous order, before the store is asked to
    /// assemble the object.
    pub async fn complete(&mut self) -> SessionResult<CompletedObject> {
        if !self.state.status.is_open() {
            return Err(SessionError::InvalidState {
                status: self.state.status,
            });
        }
        if self.total_parts > MAX_PARTS {
            return Err(SessionError::IncompleteParts {
                key: self.state.key.clone(),
                reason: format!(
                    "{} parts exceed the protocol limit of {}",
                    self.total_parts, MAX_PARTS
                ),
            });
        }
        let acknowledged = self.state.completed.len() as u32;
        if acknowledged != self.total_parts {
            return Err(SessionError::IncompleteParts {
                key: self.state.key.clone(),
                reason: format!(
                    "{} of {} parts acknowledged",
                    acknowledged, self.total_parts
                ),
            });
        }
        if let Some(gap) = self
            .state
            .completed
            .iter()
            .zip(1u32..)
            .find(|(part, expected)| part.part_number != *expected)
        {
            return Err(SessionError::IncompleteParts {
                key: self.state.key.clone(),
                reason: format!("part list is non-contiguous at part {}", gap.0.part_number),
            });
        }

        match self
            .transport
            .complete_multipart_upload(
                &self.state.bucket,
                &self.state.key,
                &self.state.upload_id,
                &self.state.completed,
            )
            .await
        {
            Ok(object) => {
                self.state.status = SessionStatus::Completed;
                debug!(key = %self.state.key, "multipart session completed");
                Ok(object)
            }
            Err(source) => {
                self.state.status = SessionStatus::Failed;
                Err(SessionError::Complete {
                    key: self.state.key.clone(),
                    source,
                })
            }
        }
    }

    /// Tear the session down, best-effort.
    ///
    /// Abort runs inside error handling, so its own failures are logged and
    /// swallowed rather than propagated. No-op once the session is terminal.
    pub async fn abort(&mut self) {
        if matches!(
            self.state.status,
            SessionStatus::Completed | SessionStatus::Aborted
        ) {
            return;
        }
        if let Err(err) = self
            .transport
            .abort_multipart_upload(&self.state.bucket, &self.state.key, &self.state.upload_id)
            .await
        {
            warn!(
                key = %self.state.key,
                upload_id = %self.state.upload_id,
                "failed to abort multipart session: {err}"
            );
        }
        self.state.status = SessionStatus::Aborted;
    }
}
