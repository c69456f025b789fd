use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::S3Config;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Store not configured: {0}")]
    Config(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single object as reported by a store listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
}

/// Key/value blob operations against the remote store.
///
/// Strongly consistent per key; listings may lag. The trait is async and
/// mockable for tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// List objects under `prefix`. Pages through the full result set unless
    /// `max_keys` caps it.
    async fn list(
        &self,
        prefix: &str,
        max_keys: Option<i32>,
    ) -> Result<Vec<RemoteObject>, ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Public URL for an object. Constructed, not verified.
    fn public_url(&self, key: &str) -> String;
}

/// Production S3 object store
pub struct S3ObjectStore {
    client: Client,
    bucket_name: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ObjectStore {
    /// Create a new S3 client from validated configuration.
    pub async fn new(config: S3Config) -> Result<Self, ObjectStoreError> {
        config
            .validate()
            .map_err(|e| ObjectStoreError::Config(e.to_string()))?;

        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "reelpack-s3-config",
        );
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint_url {
            let normalized_endpoint = endpoint.trim_end_matches('/').to_string();
            info!("Using custom S3 endpoint: {}", normalized_endpoint);
            aws_config_builder = aws_config_builder.endpoint_url(normalized_endpoint);
        } else {
            info!("Using default AWS S3 endpoint");
        }
        let aws_config = aws_config_builder.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();

        Ok(S3ObjectStore {
            client: Client::from_conf(s3_config),
            bucket_name: config.bucket_name,
            region: config.region,
            endpoint_url: config.endpoint_url.map(|e| e.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        debug!("Downloading {}", key);
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_no_such_key() => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(ObjectStoreError::Transport(format!(
                    "Get object failed for {key}: {e}"
                )));
            }
        };
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Transport(format!("Body read failed for {key}: {e}")))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from {}", data.len(), key);
        Ok(data)
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        debug!("Uploading {} ({} bytes)", key, data.len());
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(data.to_vec().into())
            .content_type(content_type);
        if !metadata.is_empty() {
            request = request.set_metadata(Some(metadata));
        }
        request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Transport(format!("Put object failed for {key}: {e}")))?;

        debug!("Uploaded {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        debug!("Deleting {}", key);
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                ObjectStoreError::Transport(format!("Delete object failed for {key}: {e}"))
            })?;

        debug!("Deleted {}", key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: Option<i32>,
    ) -> Result<Vec<RemoteObject>, ObjectStoreError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix);
            if let Some(max) = max_keys {
                request = request.max_keys(max);
            }
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                ObjectStoreError::Transport(format!("List objects failed for {prefix}: {e}"))
            })?;

            for obj in response.contents() {
                let Some(key) = obj.key() else { continue };
                let last_modified = obj
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                objects.push(RemoteObject {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                    etag: obj.e_tag().map(|s| s.trim_matches('"').to_string()),
                });
            }

            if let Some(max) = max_keys {
                if objects.len() >= max as usize {
                    objects.truncate(max as usize);
                    break;
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        debug!("Listed {} objects under {}", objects.len(), prefix);
        Ok(objects)
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found() => Ok(false),
            Err(e) => Err(ObjectStoreError::Transport(format!(
                "Head object failed for {key}: {e}"
            ))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket_name, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket_name, self.region, key
            ),
        }
    }
}
