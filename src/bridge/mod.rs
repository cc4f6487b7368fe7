//! Boundary between the embedded web content and the native pipeline.
//!
//! The web content posts JSON messages tagged by `type`; the native layer
//! answers with outbound commands. On a created post the embedded content
//! is reloaded so it can reflect the new state; failures surface as native
//! alerts and never route through the web content.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::UserAlert;
use crate::models::manifest::TaggedEntity;
use crate::models::media::MediaItem;
use crate::services::batch_runner::{BatchRunner, BatchStatus, DraftMeta};
use crate::services::tag_search::{SearchError, TagSearchClient};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed bridge message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Messages the embedded web content posts to the native layer.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "authData")]
    AuthData { user_id: Option<String> },

    #[serde(rename = "createPost")]
    CreatePost(CreatePostRequest),

    #[serde(rename = "signOut")]
    SignOut,
}

/// The structured create-post request carried by a `createPost` message.
#[derive(Deserialize, Debug)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub caption: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub tagged_entities: Vec<TaggedEntity>,

    pub media: Vec<MediaItem>,
}

/// Commands the native layer issues when a message resolves.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum OutboundCommand {
    /// Reload the embedded content so it reflects the new post.
    Reload,
    /// Surface a native alert; retryable ones offer a retry action.
    ShowAlert(UserAlert),
}

/// Receives web-content messages and drives the native pipeline.
pub struct WebViewBridge {
    runner: BatchRunner,
    tag_search: TagSearchClient,
    auth_user: Mutex<Option<String>>,
    active_cancel: Mutex<Option<CancellationToken>>,
    status_rx: Mutex<Option<watch::Receiver<BatchStatus>>>,
}

impl WebViewBridge {
    pub fn new(runner: BatchRunner, tag_search: TagSearchClient) -> Self {
        Self {
            runner,
            tag_search,
            auth_user: Mutex::new(None),
            active_cancel: Mutex::new(None),
            status_rx: Mutex::new(None),
        }
    }

    /// Handle one raw message from the web content.
    ///
    /// `createPost` runs the whole pipeline and resolves to its terminal
    /// command; `authData` and `signOut` update session state and resolve
    /// to nothing.
    pub async fn handle_message(&self, raw: &str) -> Result<Option<OutboundCommand>, BridgeError> {
        match serde_json::from_str::<InboundMessage>(raw)? {
            InboundMessage::AuthData { user_id } => {
                *self.auth_user.lock().expect("auth user lock poisoned") = user_id;
                Ok(None)
            }
            InboundMessage::SignOut => {
                *self.auth_user.lock().expect("auth user lock poisoned") = None;
                Ok(None)
            }
            InboundMessage::CreatePost(request) => Ok(Some(self.create_post(request).await)),
        }
    }

    async fn create_post(&self, request: CreatePostRequest) -> OutboundCommand {
        let user_id = request
            .user_id
            .filter(|u| !u.is_empty())
            .or_else(|| self.auth_user.lock().expect("auth user lock poisoned").clone());
        let Some(user_id) = user_id else {
            // No authenticated user: never start a batch.
            return OutboundCommand::ShowAlert(UserAlert::auth_required());
        };

        let handle = self.runner.spawn(
            request.media,
            DraftMeta {
                user_id,
                caption: request.caption,
                location: request.location,
                tagged_entities: request.tagged_entities,
            },
        );
        *self.status_rx.lock().expect("status lock poisoned") = Some(handle.status_watch());
        *self.active_cancel.lock().expect("cancel lock poisoned") =
            Some(handle.cancel_token());

        match handle.join().await {
            BatchStatus::Submitted { .. } => OutboundCommand::Reload,
            BatchStatus::Cancelled => OutboundCommand::ShowAlert(UserAlert::cancelled()),
            BatchStatus::Failed { alert } => OutboundCommand::ShowAlert(alert),
            status => {
                warn!(?status, "batch resolved in a non-terminal state");
                OutboundCommand::ShowAlert(UserAlert::new(
                    "Upload failed",
                    "The upload stopped unexpectedly.",
                    true,
                ))
            }
        }
    }

    /// Ask the in-flight batch (if any) to stop at its next boundary.
    pub fn cancel_active(&self) {
        if let Some(cancel) = self
            .active_cancel
            .lock()
            .expect("cancel lock poisoned")
            .as_ref()
        {
            cancel.cancel();
        }
    }

    /// Latest coarse status of the current or most recent batch, for the
    /// platform keep-alive adapter.
    pub fn batch_status(&self) -> Option<BatchStatus> {
        self.status_rx
            .lock()
            .expect("status lock poisoned")
            .as_ref()
            .map(|rx| rx.borrow().clone())
    }

    /// Entity search for the tagging UI. A search outage degrades to an
    /// empty list so typing stays responsive; the outage itself is logged
    /// rather than conflated with "no matches".
    pub async fn search_tags(
        &self,
        query: &str,
        already_tagged: &[TaggedEntity],
    ) -> Vec<TaggedEntity> {
        let user_id = self
            .auth_user
            .lock()
            .expect("auth user lock poisoned")
            .clone()
            .unwrap_or_default();
        match self.tag_search.search(query, &user_id, already_tagged).await {
            Ok(entities) => entities,
            Err(SearchError::Unavailable(reason)) => {
                warn!("tag search degraded to empty result: {reason}");
                Vec::new()
            }
        }
    }
}
