//! Represents multipart upload sessions and parts, seen from the client side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One contiguous byte range of a source file, scheduled for upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadPart {
    /// Part number (1-based, contiguous, no gaps).
    pub part_number: u32,

    /// Byte offset into the source file.
    pub offset: u64,

    /// Length in bytes. Equals the configured chunk size for every part
    /// except possibly the last, which carries the remainder.
    pub size_bytes: u64,
}

/// A part the storage backend has acknowledged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number (1-based).
    pub part_number: u32,

    /// Opaque integrity token returned by the storage service.
    pub etag: String,
}

/// Lifecycle of one remote multipart session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Initiated,
    PartsInFlight,
    Completed,
    Aborted,
    Failed,
}

impl SessionStatus {
    /// Whether the session can accept further part uploads or completion.
    pub fn is_open(self) -> bool {
        matches!(self, SessionStatus::Initiated | SessionStatus::PartsInFlight)
    }
}

/// State of one remote multipart upload session.
///
/// Owned exclusively by the session driver for its lifetime; never shared.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MultipartSessionState {
    /// Opaque upload identifier issued by the storage backend.
    pub upload_id: String,

    /// Target bucket.
    pub bucket: String,

    /// Target object key, derived from the file name plus a collision
    /// qualifier.
    pub key: String,

    /// Timestamp when the session was initiated.
    pub initiated_at: DateTime<Utc>,

    /// Current lifecycle status.
    pub status: SessionStatus,

    /// Acknowledged parts, in part-number order.
    pub completed: Vec<CompletedPart>,
}
