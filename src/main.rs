use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use media_uploader::bridge::{OutboundCommand, WebViewBridge};
use media_uploader::config::UploaderConfig;
use media_uploader::models::media::MediaItem;
use media_uploader::services::batch_runner::BatchRunner;
use media_uploader::services::post_submitter::PostSubmitter;
use media_uploader::services::storage_transport::HttpStorageTransport;
use media_uploader::services::tag_search::TagSearchClient;
use media_uploader::services::upload_orchestrator::UploadOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + invocation args ---
    let (cfg, args) = UploaderConfig::from_env_and_args()?;
    tracing::info!("Starting media-uploader with config: {:?}", cfg);

    // --- Wire the pipeline ---
    let transport = Arc::new(HttpStorageTransport::new(
        &cfg.storage_base_url,
        cfg.request_timeout_secs,
    ));
    let orchestrator = Arc::new(UploadOrchestrator::new(transport, cfg.clone()));
    let submitter = Arc::new(PostSubmitter::new(&cfg.api_base_url, cfg.request_timeout_secs));
    let tag_search = TagSearchClient::new(&cfg.api_base_url, cfg.request_timeout_secs);
    let bridge = WebViewBridge::new(BatchRunner::new(orchestrator, submitter), tag_search);

    let user_id = args
        .user_id
        .clone()
        .or_else(|| std::env::var("UPLOADER_USER_ID").ok());

    // --- Describe the selected files ---
    let mut media = Vec::with_capacity(args.files.len());
    for path in &args.files {
        media.push(describe_file(path)?);
    }

    // --- Feed the bridge the message the web content would post ---
    let message = serde_json::json!({
        "type": "createPost",
        "user_id": user_id,
        "caption": args.caption,
        "location": args.location,
        "media": media,
    })
    .to_string();

    match bridge.handle_message(&message).await? {
        Some(OutboundCommand::Reload) => {
            tracing::info!("post created; embedded content would reload now");
            Ok(())
        }
        Some(OutboundCommand::ShowAlert(alert)) => {
            anyhow::bail!("upload failed: {alert}")
        }
        None => Ok(()),
    }
}

/// Build a `MediaItem` from a local path: on-disk size, extension-guessed
/// MIME type. The CLI driver does not probe pixel dimensions or duration.
fn describe_file(path: &str) -> Result<MediaItem> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("reading metadata for `{}`", path))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(MediaItem {
        client_id: Uuid::new_v4(),
        uri: path.to_string(),
        size_bytes: metadata.len(),
        mime_type,
        width: 0,
        height: 0,
        duration_secs: None,
    })
}
