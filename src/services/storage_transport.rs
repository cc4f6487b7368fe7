//! Client transport for the object store's multipart upload protocol.
//!
//! The store speaks the S3 dialect: upload sessions are opened with
//! `POST ?uploads`, parts go up as `PUT ?partNumber=N&uploadId=...` and are
//! acknowledged with an `ETag` header, and the session is finalized with a
//! `CompleteMultipartUpload` XML body or torn down with `DELETE ?uploadId=`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use thiserror::Error;

use crate::models::multipart::CompletedPart;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("Malformed storage response: {0}")]
    MalformedResponse(String),
    #[error("part {part_number} integrity token `{received}` does not match local digest `{computed}`")]
    IntegrityMismatch {
        part_number: u32,
        computed: String,
        received: String,
    },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// The finalized object as reported by the store.
#[derive(Clone, Debug)]
pub struct CompletedObject {
    /// Public URL of the assembled object.
    pub location: String,

    /// Object key within the bucket.
    pub key: String,
}

/// Port for an object store's multipart upload operations.
///
/// One implementation speaks HTTP to the real store; tests substitute an
/// in-memory recorder.
#[async_trait]
pub trait StorageTransport: Send + Sync {
    /// Open a multipart session and return its opaque upload id.
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> TransportResult<String>;

    /// Upload one numbered part and return its integrity token.
    ///
    /// Safe to re-invoke with the same part number and identical bytes; the
    /// protocol is last-write-wins per part number.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> TransportResult<String>;

    /// Assemble the object from the acknowledged parts.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> TransportResult<CompletedObject>;

    /// Discard the session and any uploaded parts.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> TransportResult<()>;
}

/// HTTP implementation of [`StorageTransport`].
pub struct HttpStorageTransport {
    http_client: Client,
    base_url: String,
}

impl HttpStorageTransport {
    /// Create the transport with connect and per-request timeouts.
    ///
    /// A request that exceeds the timeout surfaces as a transport failure
    /// and goes through the caller's part-retry path.
    ///
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

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }

    async fn fail_on_status(response: reqwest::Response) -> TransportResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::UnexpectedStatus { status, body })
        }
    }
}

#[async_trait]
impl StorageTransport for HttpStorageTransport {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> TransportResult<String> {
        let url = format!("{}?uploads", self.object_url(bucket, key));
        let response = self
            .http_client
            .post(&url)
            .header(header::CONTENT_TYPE, content_type)
            .send()
            .await?;
        let body = Self::fail_on_status(response).await?.text().await?;

        extract_xml_tag(&body, "UploadId")
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::MalformedResponse("initiate response carried no UploadId".into())
            })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> TransportResult<String> {
        let computed = format!("{:x}", md5::compute(&body));
        let url = format!(
            "{}?partNumber={}&uploadId={}",
            self.object_url(bucket, key),
            part_number,
            upload_id
        );
        let response = self.http_client.put(&url).body(body).send().await?;
        let response = Self::fail_on_status(response).await?;

        let received = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(unquote_etag)
            .ok_or_else(|| {
                TransportError::MalformedResponse(format!(
                    "part {} response carried no ETag",
                    part_number
                ))
            })?;

        if received != computed {
            return Err(TransportError::IntegrityMismatch {
                part_number,
                computed,
                received,
            });
        }
        Ok(received)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> TransportResult<CompletedObject> {
        let url = format!("{}?uploadId={}", self.object_url(bucket, key), upload_id);
        let response = self
            .http_client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/xml")
            .body(build_complete_xml(parts))
            .send()
            .await?;
        let body = Self::fail_on_status(response).await?.text().await?;

        let location = extract_xml_tag(&body, "Location").map(str::to_string);
        let key_out = extract_xml_tag(&body, "Key").map(str::to_string);
        match (location, key_out) {
            (Some(location), Some(key)) => Ok(CompletedObject { location, key }),
            _ => Err(TransportError::MalformedResponse(
                "complete response carried no Location/Key".into(),
            )),
        }
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> TransportResult<()> {
        let url = format!("{}?uploadId={}", self.object_url(bucket, key), upload_id);
        let response = self.http_client.delete(&url).send().await?;
        Self::fail_on_status(response).await?;
        Ok(())
    }
}

/// Compose the `CompleteMultipartUpload` body from acknowledged parts.
fn build_complete_xml(parts: &[CompletedPart]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><CompleteMultipartUpload xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
    );
    for part in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>\"{}\"</ETag></Part>",
            part.part_number,
            xml_escape(&part.etag)
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Pull the text content of the first `<tag>...</tag>` pair out of a flat
/// XML document. The store's responses carry no nested same-name tags, so a
/// plain scan is enough.
fn extract_xml_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

fn unquote_etag(raw: &str) -> String {
    raw.trim_matches('"').to_string()
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_upload_id_from_initiate_response() {
        let xml = r#"<?xml version="1.0"?><InitiateMultipartUploadResult>
            <Bucket>post-media</Bucket><Key>img.jpg</Key>
            <UploadId>2-abc~def</UploadId></InitiateMultipartUploadResult>"#;
        assert_eq!(extract_xml_tag(xml, "UploadId"), Some("2-abc~def"));
        assert_eq!(extract_xml_tag(xml, "VersionId"), None);
    }

    #[test]
    fn complete_body_lists_parts_in_order() {
        let parts = vec![
            CompletedPart {
                part_number: 1,
                etag: "aaa".into(),
            },
            CompletedPart {
                part_number: 2,
                etag: "bbb".into(),
            },
        ];
        let xml = build_complete_xml(&parts);
        let first = xml.find("<PartNumber>1</PartNumber>").unwrap();
        let second = xml.find("<PartNumber>2</PartNumber>").unwrap();
        assert!(first < second);
        assert!(xml.contains("<ETag>\"aaa\"</ETag>"));
        assert!(xml.ends_with("</CompleteMultipartUpload>"));
    }

    #[test]
    fn strips_quotes_from_etag_header() {
        assert_eq!(unquote_etag("\"d41d8cd9\""), "d41d8cd9");
        assert_eq!(unquote_etag("d41d8cd9"), "d41d8cd9");
    }
}
