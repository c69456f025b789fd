use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// S3 configuration for the remote object store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl S3Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ConfigError::Config("Bucket name cannot be empty".to_string()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Config("Region cannot be empty".to_string()));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(ConfigError::Config("Access key ID cannot be empty".to_string()));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(ConfigError::Config(
                "Secret access key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Engine configuration
///
/// Store credentials come from the environment (a `.env` file is honored in
/// dev). Key prefixes have stable defaults that match the layout playback
/// devices expect; override them only for shared buckets.
#[derive(Debug, Clone)]
pub struct Config {
    pub s3: S3Config,
    /// Key prefix under which video objects live.
    pub video_prefix: String,
    /// Key prefix under which thumbnail objects live.
    pub thumbnail_prefix: String,
    /// Key prefix under which content packages (and their sidecars) live.
    pub package_prefix: String,
    /// Directory for locally-owned state (edit overlay, playlists).
    pub data_dir: PathBuf,
}

pub const DEFAULT_VIDEO_PREFIX: &str = "videos/";
pub const DEFAULT_THUMBNAIL_PREFIX: &str = "thumbnails/";
pub const DEFAULT_PACKAGE_PREFIX: &str = "playlists/";

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded environment from .env");
        }

        let s3 = S3Config {
            bucket_name: env_var("REELPACK_S3_BUCKET")?,
            region: std::env::var("REELPACK_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: env_var("REELPACK_S3_ACCESS_KEY_ID")?,
            secret_access_key: env_var("REELPACK_S3_SECRET_ACCESS_KEY")?,
            endpoint_url: std::env::var("REELPACK_S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
        };
        s3.validate()?;

        let data_dir = match std::env::var("REELPACK_DATA_DIR").ok().filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| ConfigError::Config("No data directory available".to_string()))?
                .join("reelpack"),
        };

        Ok(Config {
            s3,
            video_prefix: prefix_var("REELPACK_VIDEO_PREFIX", DEFAULT_VIDEO_PREFIX),
            thumbnail_prefix: prefix_var("REELPACK_THUMBNAIL_PREFIX", DEFAULT_THUMBNAIL_PREFIX),
            package_prefix: prefix_var("REELPACK_PACKAGE_PREFIX", DEFAULT_PACKAGE_PREFIX),
            data_dir,
        })
    }
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::Config(format!("{name} is not set")))
}

/// Read a key-prefix variable, normalizing it to end with a single `/`.
fn prefix_var(name: &str, default: &str) -> String {
    let raw = std::env::var(name).ok().filter(|s| !s.is_empty());
    let mut prefix = raw.unwrap_or_else(|| default.to_string());
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}
