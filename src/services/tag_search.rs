//! Searches taggable entities while the user composes a post.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::manifest::TaggedEntity;

/// A failing or unreachable search is distinct from "no matches"; the
/// boundary layer decides how far to degrade it.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("tag search unavailable: {0}")]
    Unavailable(String),
}

#[derive(Serialize)]
struct TagSearchRequest<'a> {
    search: &'a str,
    user_id: &'a str,
    tagged_entities: &'a [TaggedEntity],
}

/// Client for the backend tag-search endpoint.
pub struct TagSearchClient {
    http_client: Client,
    base_url: String,
}

impl TagSearchClient {
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

    /// Search entities matching `query`, excluding those already tagged.
    /// An empty result means no matches, never a swallowed failure.
    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        already_tagged: &[TaggedEntity],
    ) -> Result<Vec<TaggedEntity>, SearchError> {
        let url = format!("{}/tags/search", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&TagSearchRequest {
                search: query,
                user_id,
                tagged_entities: already_tagged,
            })
            .send()
            .await
            .map_err(|err| SearchError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Unavailable(format!("status {}", status)));
        }
        response
            .json::<Vec<TaggedEntity>>()
            .await
            .map_err(|err| SearchError::Unavailable(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entity_records_with_optional_event_fields() {
        let body = r#"[
            {"name":"Harbor Stage","type":"venue","entity_id":"v-9","image":null,
             "location":"Pier 3"},
            {"name":"Night Market","type":"event","entity_id":"e-2",
             "image":"https://cdn.example/e2.jpg",
             "start_date":"2025-06-01","end_date":"2025-06-03"}
        ]"#;
        let entities: Vec<TaggedEntity> = serde_json::from_str(body).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_type, "venue");
        assert_eq!(entities[0].location.as_deref(), Some("Pier 3"));
        assert_eq!(entities[1].start_date.as_deref(), Some("2025-06-01"));
        assert!(entities[1].location.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable_not_empty() {
        let client = TagSearchClient::new("http://127.0.0.1:9", 1);
        let err = client.search("harbor", "user-1", &[]).await.unwrap_err();
        assert!(matches!(err, SearchError::Unavailable(_)));
    }
}
