//! Core data models for the media upload pipeline.
//!
//! These entities represent the media a user selected, the multipart
//! sessions that move it to object storage, and the manifest handed to the
//! post-creation call. They serialize naturally as JSON via `serde`.

pub mod manifest;
pub mod media;
pub mod multipart;
