//! Working core of the upload pipeline.
//!
//! Leaf-first: `chunk_reader` reads byte windows, `multipart_session`
//! drives one file's remote session over a `storage_transport`,
//! `upload_orchestrator` sequences a whole batch, `post_submitter`
//! finalizes the post, and `batch_runner` wraps a batch into one
//! cancellable background unit of work.

pub mod batch_runner;
pub mod chunk_reader;
pub mod multipart_session;
pub mod post_submitter;
pub mod storage_transport;
pub mod tag_search;
pub mod upload_orchestrator;
