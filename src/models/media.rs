//! Represents one user-selected media asset.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::UploaderConfig;

/// Coarse media classification used by the backend post record.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A single photo or video selected by the user.
///
/// Immutable once handed to the orchestrator; the struct carries metadata
/// only, never the content bytes.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MediaItem {
    /// Stable client-side identifier, assigned at selection time when the
    /// web content does not carry one.
    #[serde(default = "Uuid::new_v4")]
    pub client_id: Uuid,

    /// Local URI handle to the file (a filesystem path on this platform).
    pub uri: String,

    /// Declared size in bytes. Must be known and > 0 before upload begins.
    pub size_bytes: u64,

    /// Declared MIME type (e.g. `image/jpeg`, `video/mp4`).
    pub mime_type: String,

    /// Pixel width.
    pub width: u32,

    /// Pixel height.
    pub height: u32,

    /// Duration in seconds; only present for video.
    pub duration_secs: Option<f64>,
}

/// Reasons an item is rejected before it enters the pipeline.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("file `{uri}` has no content")]
    EmptyFile { uri: String },
    #[error("file `{uri}` is {size_bytes} bytes, limit is {max_bytes}")]
    TooLarge {
        uri: String,
        size_bytes: u64,
        max_bytes: u64,
    },
    #[error("video `{uri}` runs {duration_secs}s, limit is {max_secs}s")]
    DurationTooLong {
        uri: String,
        duration_secs: f64,
        max_secs: f64,
    },
}

impl MediaItem {
    /// Classify the item from its MIME prefix. Anything that is not a video
    /// is treated as an image, matching how the post record is rendered.
    pub fn kind(&self) -> MediaKind {
        if self.mime_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    /// Last file-name segment of the local URI.
    pub fn file_name(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }

    /// Check the item against configured limits.
    ///
    /// Items that fail here must never reach a storage session.
    pub fn validate(&self, cfg: &UploaderConfig) -> Result<(), MediaError> {
        if self.size_bytes == 0 {
            return Err(MediaError::EmptyFile {
                uri: self.uri.clone(),
            });
        }
        if self.size_bytes > cfg.max_file_bytes {
            return Err(MediaError::TooLarge {
                uri: self.uri.clone(),
                size_bytes: self.size_bytes,
                max_bytes: cfg.max_file_bytes,
            });
        }
        if let Some(duration_secs) = self.duration_secs {
            if self.kind() == MediaKind::Video && duration_secs > cfg.max_video_secs {
                return Err(MediaError::DurationTooLong {
                    uri: self.uri.clone(),
                    duration_secs,
                    max_secs: cfg.max_video_secs,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(size_bytes: u64, mime: &str, duration_secs: Option<f64>) -> MediaItem {
        MediaItem {
            client_id: Uuid::new_v4(),
            uri: "/data/media/clip.mp4".into(),
            size_bytes,
            mime_type: mime.into(),
            width: 1920,
            height: 1080,
            duration_secs,
        }
    }

    #[test]
    fn classifies_by_mime_prefix() {
        assert_eq!(item(1, "video/mp4", None).kind(), MediaKind::Video);
        assert_eq!(item(1, "image/jpeg", None).kind(), MediaKind::Image);
        assert_eq!(item(1, "application/pdf", None).kind(), MediaKind::Image);
    }

    #[test]
    fn rejects_empty_oversized_and_overlong() {
        let cfg = UploaderConfig::default();
        assert!(matches!(
            item(0, "image/png", None).validate(&cfg),
            Err(MediaError::EmptyFile { .. })
        ));
        assert!(matches!(
            item(cfg.max_file_bytes + 1, "image/png", None).validate(&cfg),
            Err(MediaError::TooLarge { .. })
        ));
        assert!(matches!(
            item(1, "video/mp4", Some(cfg.max_video_secs + 1.0)).validate(&cfg),
            Err(MediaError::DurationTooLong { .. })
        ));
        assert!(item(1, "video/mp4", Some(1.0)).validate(&cfg).is_ok());
    }
}
