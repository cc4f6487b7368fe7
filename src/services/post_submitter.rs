//! Submits the finished post draft to the backend API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::manifest::PostDraft;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("network failure reaching the post API: {0}")]
    Network(#[from] reqwest::Error),
    #[error("post rejected: {message}")]
    Validation { message: String },
    #[error("post API failed with status {status}: {body}")]
    Server { status: StatusCode, body: String },
    #[error("malformed post API response: {0}")]
    MalformedResponse(String),
}

impl SubmitError {
    /// Whether the caller may retry with backoff. Validation failures are
    /// never retried; retry policy for the rest belongs to the caller, not
    /// this component.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Network(_) | SubmitError::Server { .. })
    }
}

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Port for the backend's create-post call.
#[async_trait]
pub trait PostApi: Send + Sync {
    /// Create the post and return its identifier.
    async fn submit(&self, draft: &PostDraft) -> SubmitResult<String>;
}

/// HTTP implementation of [`PostApi`].
///
/// On success the manifest's object keys are referenced by a durable
/// backend record. On failure the already-uploaded objects are left in the
/// store; compensating deletes are a hardening pass this client does not do.
pub struct PostSubmitter {
    http_client: Client,
    base_url: String,
}

impl PostSubmitter {
    /// # Panics
    /// if the HTTP client cannot be constructed.
    #[must_use]
    pub fn new(base_url: &str, request_timeout_secs: u64) -> Self {
        Self {
            http_client: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(Duration::from_secs(request_timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PostApi for PostSubmitter {
    async fn submit(&self, draft: &PostDraft) -> SubmitResult<String> {
        if draft.media.is_empty() {
            return Err(SubmitError::Validation {
                message: "post carries no uploaded media".into(),
            });
        }
        if draft.user_id.is_empty() {
            return Err(SubmitError::Validation {
                message: "post carries no user id".into(),
            });
        }

        let url = format!("{}/posts", self.base_url);
        let response = self.http_client.post(&url).json(draft).send().await?;
        let status = response.status();
        let body = response.text().await?;
        classify_response(status, &body)
    }
}

#[derive(Deserialize)]
struct CreatePostResponse {
    id: Option<String>,
    error: Option<serde_json::Value>,
}

/// Map the backend's response onto the submission error taxonomy.
///
/// Non-2xx status or a truthy `error` field is a failure: 4xx carries a
/// structured validation message, 5xx is a server fault.
fn classify_response(status: StatusCode, body: &str) -> SubmitResult<String> {
    if status.is_client_error() {
        return Err(SubmitError::Validation {
            message: extract_error_message(body).unwrap_or_else(|| body.to_string()),
        });
    }
    if !status.is_success() {
        return Err(SubmitError::Server {
            status,
            body: body.to_string(),
        });
    }

    let parsed: CreatePostResponse = serde_json::from_str(body)
        .map_err(|err| SubmitError::MalformedResponse(err.to_string()))?;

    if let Some(error) = parsed.error {
        if is_truthy(&error) {
            return Err(SubmitError::Validation {
                message: error_to_message(&error),
            });
        }
    }
    parsed
        .id
        .ok_or_else(|| SubmitError::MalformedResponse("response carried no post id".into()))
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error").map(error_to_message)
}

fn error_to_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::manifest::PostDraft;

    fn draft_without_media() -> PostDraft {
        PostDraft {
            user_id: "user-1".into(),
            caption: String::new(),
            location: None,
            tagged_entities: vec![],
            media: vec![],
        }
    }

    #[tokio::test]
    async fn empty_manifest_fails_before_any_network_call() {
        // Port 9 is unroutable; a network attempt would surface as Network.
        let submitter = PostSubmitter::new("http://127.0.0.1:9", 1);
        let err = submitter.submit(&draft_without_media()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn ok_response_yields_post_id() {
        let id = classify_response(StatusCode::OK, r#"{"id":"post-42"}"#).unwrap();
        assert_eq!(id, "post-42");
    }

    #[test]
    fn truthy_error_field_fails_even_with_status_200() {
        let err =
            classify_response(StatusCode::OK, r#"{"id":"x","error":"caption too long"}"#)
                .unwrap_err();
        assert!(matches!(err, SubmitError::Validation { message } if message == "caption too long"));
    }

    #[test]
    fn null_error_field_is_not_a_failure() {
        let id = classify_response(StatusCode::OK, r#"{"id":"post-7","error":null}"#).unwrap();
        assert_eq!(id, "post-7");
    }

    #[test]
    fn four_xx_maps_to_validation_with_structured_message() {
        let err = classify_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"tagged entity not found"}"#,
        )
        .unwrap_err();
        match err {
            SubmitError::Validation { message } => assert_eq!(message, "tagged entity not found"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn five_xx_maps_to_retryable_server_error() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, SubmitError::Server { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_post_id_is_malformed() {
        let err = classify_response(StatusCode::OK, r#"{}"#).unwrap_err();
        assert!(matches!(err, SubmitError::MalformedResponse(_)));
    }
}
