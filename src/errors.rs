//! Maps terminal pipeline failures onto the single alert the user sees.

use serde::Serialize;
use std::fmt;

use crate::services::post_submitter::SubmitError;
use crate::services::upload_orchestrator::BatchError;

/// A user-facing failure notice. Retryable alerts offer a retry action;
/// the rest are dismiss-only.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UserAlert {
    pub title: String,
    pub message: String,
    pub retryable: bool,
}

impl UserAlert {
    pub fn new(title: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Shown when a `createPost` arrives without an authenticated user.
    pub fn auth_required() -> Self {
        Self::new(
            "Sign in required",
            "You need to be signed in to create a post.",
            false,
        )
    }

    pub fn cancelled() -> Self {
        Self::new("Upload cancelled", "Your post was not created.", false)
    }
}

impl fmt::Display for UserAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

impl From<&BatchError> for UserAlert {
    fn from(err: &BatchError) -> Self {
        match err {
            BatchError::ConcurrentBatch => Self::new(
                "Upload in progress",
                "Another post is still uploading. Wait for it to finish.",
                false,
            ),
            BatchError::InvalidItem { .. } => {
                Self::new("Can't upload this media", err.to_string(), false)
            }
            BatchError::Item { file, .. } => Self::new(
                "Upload failed",
                format!("Couldn't upload `{}`. Check your connection and retry.", file),
                true,
            ),
            BatchError::Cancelled => Self::cancelled(),
        }
    }
}

impl From<&SubmitError> for UserAlert {
    fn from(err: &SubmitError) -> Self {
        Self::new("Couldn't create post", err.to_string(), err.is_retryable())
    }
}
