use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Fixed upload stride. Parts are this size except the final remainder.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Centralized pipeline configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Base URL of the object-store gateway.
    pub storage_base_url: String,
    /// Bucket that receives post media.
    pub bucket: String,
    /// Base URL of the backend API (create-post, tag-search).
    pub api_base_url: String,
    /// Upload stride in bytes.
    pub chunk_size_bytes: u64,
    /// Retries per part before the whole batch fails.
    pub max_part_retries: u32,
    /// Per-request timeout; a timed-out part goes through the retry path.
    pub request_timeout_secs: u64,
    /// Largest file admitted into the pipeline.
    pub max_file_bytes: u64,
    /// Longest video admitted into the pipeline.
    pub max_video_secs: f64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            storage_base_url: "http://127.0.0.1:3000".into(),
            bucket: "post-media".into(),
            api_base_url: "http://127.0.0.1:8000/api".into(),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            max_part_retries: 3,
            request_timeout_secs: 30,
            max_file_bytes: 100 * 1024 * 1024,
            max_video_secs: 120.0,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked media upload pipeline")]
pub struct Args {
    /// Media files to upload as one post.
    #[arg(required = true)]
    pub files: Vec<String>,

    /// User the post is created for (overrides UPLOADER_USER_ID)
    #[arg(long)]
    pub user_id: Option<String>,

    /// Caption text for the post
    #[arg(long, default_value = "")]
    pub caption: String,

    /// Free-text location for the post
    #[arg(long)]
    pub location: Option<String>,

    /// Object-store gateway URL (overrides UPLOADER_STORAGE_URL)
    #[arg(long)]
    pub storage_url: Option<String>,

    /// Target bucket (overrides UPLOADER_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Backend API URL (overrides UPLOADER_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Upload stride in bytes (overrides UPLOADER_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Retries per part (overrides UPLOADER_PART_RETRIES)
    #[arg(long)]
    pub part_retries: Option<u32>,
}

impl UploaderConfig {
    /// Parse environment variables + CLI args into the config and the
    /// remaining per-invocation arguments.
    pub fn from_env_and_args() -> Result<(Self, Args)> {
        // Parse CLI once
        let args = Args::parse();

        let defaults = Self::default();

        // --- Environment fallback ---
        let env_storage =
            env::var("UPLOADER_STORAGE_URL").unwrap_or(defaults.storage_base_url);
        let env_bucket = env::var("UPLOADER_BUCKET").unwrap_or(defaults.bucket);
        let env_api = env::var("UPLOADER_API_URL").unwrap_or(defaults.api_base_url);
        let env_chunk = parse_env_var("UPLOADER_CHUNK_SIZE", defaults.chunk_size_bytes)?;
        let env_retries = parse_env_var("UPLOADER_PART_RETRIES", defaults.max_part_retries)?;
        let env_timeout =
            parse_env_var("UPLOADER_REQUEST_TIMEOUT", defaults.request_timeout_secs)?;
        let env_max_file = parse_env_var("UPLOADER_MAX_FILE_BYTES", defaults.max_file_bytes)?;
        let env_max_video = parse_env_var("UPLOADER_MAX_VIDEO_SECS", defaults.max_video_secs)?;

        // --- Merge ---
        let cfg = Self {
            storage_base_url: args.storage_url.clone().unwrap_or(env_storage),
            bucket: args.bucket.clone().unwrap_or(env_bucket),
            api_base_url: args.api_url.clone().unwrap_or(env_api),
            chunk_size_bytes: args.chunk_size.unwrap_or(env_chunk),
            max_part_retries: args.part_retries.unwrap_or(env_retries),
            request_timeout_secs: env_timeout,
            max_file_bytes: env_max_file,
            max_video_secs: env_max_video,
        };

        Ok((cfg, args))
    }
}

fn parse_env_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
