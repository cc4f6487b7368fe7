//! Chunked multipart media upload pipeline for a WebView-based mobile
//! client shell.
//!
//! User-selected photos and videos are moved to object storage as
//! fixed-stride multipart uploads, sequentially per batch, with byte-level
//! progress, bounded per-part retries, and boundary-checked cancellation.
//! Once every file is stored, the resulting manifest plus caption/tag
//! metadata is submitted to the backend as the authoritative create-post
//! call. A remote multipart session is always either completed or aborted,
//! never left dangling.

pub mod bridge;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
