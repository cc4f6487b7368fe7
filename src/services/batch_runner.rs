//! Runs one create-post batch as a single long-lived unit of work.
//!
//! The returned handle exposes cancel and a coarse status watch; a platform
//! keep-alive adapter (the foreground-service equivalent) holds the handle
//! open until the batch reaches a terminal state. Nothing here persists
//! across a process restart: a killed process restarts the batch from the
//! first file.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::UserAlert;
use crate::models::manifest::{PostDraft, TaggedEntity};
use crate::models::media::MediaItem;
use crate::services::post_submitter::PostApi;
use crate::services::upload_orchestrator::{BatchError, ProgressUpdate, UploadOrchestrator};

/// Caption/tag metadata for the post; the media manifest comes out of the
/// upload itself.
#[derive(Clone, Debug)]
pub struct DraftMeta {
    pub user_id: String,
    pub caption: String,
    pub location: Option<String>,
    pub tagged_entities: Vec<TaggedEntity>,
}

/// Coarse batch state surfaced to the OS task/notification layer.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchStatus {
    Uploading {
        item_index: usize,
        total_items: usize,
        fraction: f64,
    },
    Submitting,
    Submitted {
        post_id: String,
    },
    Failed {
        alert: UserAlert,
    },
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Submitted { .. } | BatchStatus::Failed { .. } | BatchStatus::Cancelled
        )
    }
}

/// Control surface for one in-flight batch.
pub struct BatchHandle {
    cancel: CancellationToken,
    status_rx: watch::Receiver<BatchStatus>,
    join: JoinHandle<BatchStatus>,
}

impl BatchHandle {
    /// Request cancellation; honored at the next operation boundary, not
    /// preemptively mid-transfer.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token an adapter can hold to request cancellation after the handle
    /// itself has been consumed by `join`.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Snapshot of the latest coarse status.
    pub fn status(&self) -> BatchStatus {
        self.status_rx.borrow().clone()
    }

    /// Follow status transitions as they happen.
    pub fn status_watch(&self) -> watch::Receiver<BatchStatus> {
        self.status_rx.clone()
    }

    /// Wait for the terminal state.
    pub async fn join(self) -> BatchStatus {
        match self.join.await {
            Ok(status) => status,
            Err(err) => {
                warn!("batch task failed to run to completion: {err}");
                BatchStatus::Failed {
                    alert: UserAlert::new(
                        "Upload failed",
                        "The upload stopped unexpectedly.",
                        true,
                    ),
                }
            }
        }
    }
}

/// Spawns upload + submit as one background task per batch.
pub struct BatchRunner {
    orchestrator: Arc<UploadOrchestrator>,
    post_api: Arc<dyn PostApi>,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<UploadOrchestrator>, post_api: Arc<dyn PostApi>) -> Self {
        Self {
            orchestrator,
            post_api,
        }
    }

    /// Start the batch on its own task so it survives the UI backgrounding.
    pub fn spawn(&self, items: Vec<MediaItem>, meta: DraftMeta) -> BatchHandle {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(BatchStatus::Uploading {
            item_index: 0,
            total_items: items.len(),
            fraction: 0.0,
        });
        let orchestrator = self.orchestrator.clone();
        let post_api = self.post_api.clone();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            let status =
                run_to_terminal(orchestrator, post_api, items, meta, &task_cancel, &status_tx)
                    .await;
            status_tx.send_replace(status.clone());
            status
        });

        BatchHandle {
            cancel,
            status_rx,
            join,
        }
    }
}

async fn run_to_terminal(
    orchestrator: Arc<UploadOrchestrator>,
    post_api: Arc<dyn PostApi>,
    items: Vec<MediaItem>,
    meta: DraftMeta,
    cancel: &CancellationToken,
    status_tx: &watch::Sender<BatchStatus>,
) -> BatchStatus {
    let sink = |update: &ProgressUpdate| {
        status_tx.send_replace(BatchStatus::Uploading {
            item_index: update.item_index,
            total_items: update.total_items,
            fraction: update.fraction(),
        });
    };

    match orchestrator.run_batch(&items, &sink, cancel).await {
        Ok(media) => {
            status_tx.send_replace(BatchStatus::Submitting);
            let draft = PostDraft {
                user_id: meta.user_id,
                caption: meta.caption,
                location: meta.location,
                tagged_entities: meta.tagged_entities,
                media,
            };
            match post_api.submit(&draft).await {
                Ok(post_id) => {
                    info!(%post_id, "post created");
                    BatchStatus::Submitted { post_id }
                }
                Err(err) => {
                    warn!("post submission failed: {err}");
                    BatchStatus::Failed {
                        alert: UserAlert::from(&err),
                    }
                }
            }
        }
        Err(BatchError::Cancelled) => {
            info!("upload batch cancelled");
            BatchStatus::Cancelled
        }
        Err(err) => {
            warn!("upload batch failed: {err}");
            BatchStatus::Failed {
                alert: UserAlert::from(&err),
            }
        }
    }
}
