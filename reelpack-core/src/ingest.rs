//! Sequential asset ingestion
//!
//! Uploads video files to the store one at a time (bounding concurrent
//! connections), derives a thumbnail and technical metadata through the
//! injected probe, and refreshes the catalog once the batch is done.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{CatalogService, VideoOverride};
use crate::cloud_storage::ObjectStore;
use crate::util::{filename_stem, stable_video_id, video_content_type, ProgressCallback};

#[derive(Error, Debug)]
#[error("Probe error: {0}")]
pub struct ProbeError(pub String);

/// Technical metadata and thumbnail for a media file.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub duration_seconds: u64,
    pub resolution: Option<String>,
    pub thumbnail_jpeg: Option<Vec<u8>>,
}

/// External capability: given a video asset, produce an image and a duration.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, filename: &str, data: &[u8]) -> Result<ProbeOutcome, ProbeError>;
}

/// One file to ingest.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Per-file ingestion result with independent flags per sub-operation.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub filename: String,
    pub video_id: Option<String>,
    pub uploaded: bool,
    pub thumbnail_uploaded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    pub fn uploaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.uploaded).count()
    }
}

pub struct IngestService {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<CatalogService>,
    probe: Arc<dyn MediaProbe>,
    video_prefix: String,
    thumbnail_prefix: String,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<CatalogService>,
        probe: Arc<dyn MediaProbe>,
        video_prefix: &str,
        thumbnail_prefix: &str,
    ) -> Self {
        IngestService {
            store,
            catalog,
            probe,
            video_prefix: video_prefix.to_string(),
            thumbnail_prefix: thumbnail_prefix.to_string(),
        }
    }

    /// Upload a batch of videos, strictly one at a time.
    ///
    /// A failed probe still leaves the video uploaded (the thumbnail is
    /// simply absent); a failed upload is recorded and the batch continues.
    /// Progress is reported as (files completed, total).
    pub async fn upload_videos(
        &self,
        files: Vec<IngestFile>,
        progress: Option<&ProgressCallback>,
    ) -> IngestReport {
        let total = files.len();
        let mut report = IngestReport::default();

        for (done, file) in files.into_iter().enumerate() {
            let key = format!("{}{}", self.video_prefix, file.filename);
            let content_type = video_content_type(&file.filename);

            let mut outcome = IngestOutcome {
                filename: file.filename.clone(),
                video_id: None,
                uploaded: false,
                thumbnail_uploaded: false,
                error: None,
            };

            match self.store.put(&key, &file.data, content_type, HashMap::new()).await {
                Ok(()) => {
                    outcome.uploaded = true;
                    outcome.video_id = Some(stable_video_id(&key));
                    self.probe_and_annotate(&file, &key, &mut outcome).await;
                }
                Err(e) => {
                    warn!("Upload failed for {}: {}", file.filename, e);
                    outcome.error = Some(e.to_string());
                }
            }

            report.outcomes.push(outcome);
            if let Some(callback) = progress {
                callback(done + 1, total);
            }
        }

        info!(
            "Ingested {}/{} videos",
            report.uploaded_count(),
            report.outcomes.len()
        );
        if let Err(e) = self.catalog.refresh().await {
            warn!("Catalog refresh after ingest failed: {}", e);
        }
        report
    }

    async fn probe_and_annotate(&self, file: &IngestFile, key: &str, outcome: &mut IngestOutcome) {
        let probed = match self.probe.probe(&file.filename, &file.data).await {
            Ok(probed) => probed,
            Err(e) => {
                warn!("Probe failed for {}: {}", file.filename, e);
                return;
            }
        };

        if let Some(thumbnail) = &probed.thumbnail_jpeg {
            let thumbnail_key = format!(
                "{}{}.jpg",
                self.thumbnail_prefix,
                filename_stem(&file.filename)
            );
            match self
                .store
                .put(&thumbnail_key, thumbnail, "image/jpeg", HashMap::new())
                .await
            {
                Ok(()) => outcome.thumbnail_uploaded = true,
                Err(e) => warn!("Thumbnail upload failed for {}: {}", file.filename, e),
            }
        }

        let id = stable_video_id(key);
        let override_fields = VideoOverride {
            duration_seconds: Some(probed.duration_seconds),
            resolution: probed.resolution.clone(),
            ..Default::default()
        };
        if let Err(e) = self.catalog.apply_override(&id, override_fields).await {
            warn!("Failed to record probed metadata for {}: {}", file.filename, e);
        }
    }
}
