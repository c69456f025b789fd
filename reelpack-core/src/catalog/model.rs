use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::cloud_storage::RemoteObject;
use crate::util::{filename_stem, stable_video_id};

/// Where a video's bytes live in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRef {
    pub key: String,
    pub bucket: String,
    pub etag: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub thumbnail_key: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// A video record in the catalog.
///
/// Derived from the store listing on every reconciliation; user-editable
/// fields (title, tags, technical metadata) come from the local overlay and
/// are merged on top of the store-derived record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub duration_seconds: u64,
    pub file_size_bytes: u64,
    pub tags: BTreeSet<String>,
    pub resolution: Option<String>,
    pub date_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub storage_ref: StorageRef,
}

impl Video {
    /// Build a record from a store listing entry.
    ///
    /// The id is a stable hash of the key, so the same object maps to the
    /// same id across refreshes. Duration and resolution are unknown at this
    /// point; the overlay supplies them once probed or edited.
    pub fn from_remote(
        obj: &RemoteObject,
        bucket: &str,
        video_prefix: &str,
        thumbnail_prefix: &str,
    ) -> Video {
        let filename = obj
            .key
            .strip_prefix(video_prefix)
            .unwrap_or(&obj.key)
            .to_string();
        let stem = filename_stem(&filename).to_string();
        Video {
            id: stable_video_id(&obj.key),
            title: stem.clone(),
            filename,
            duration_seconds: 0,
            file_size_bytes: obj.size,
            tags: BTreeSet::new(),
            resolution: None,
            date_added: obj.last_modified,
            last_modified: obj.last_modified,
            storage_ref: StorageRef {
                key: obj.key.clone(),
                bucket: bucket.to_string(),
                etag: obj.etag.clone(),
                upload_date: obj.last_modified,
                thumbnail_key: Some(format!("{thumbnail_prefix}{stem}.jpg")),
                thumbnail_url: None,
            },
        }
    }

    /// Merge overlay fields on top of this record.
    pub fn apply_override(&mut self, ov: &VideoOverride) {
        if let Some(title) = &ov.title {
            self.title = title.clone();
        }
        if let Some(tags) = &ov.tags {
            self.tags = tags.clone();
        }
        if let Some(resolution) = &ov.resolution {
            self.resolution = Some(resolution.clone());
        }
        if let Some(duration) = ov.duration_seconds {
            self.duration_seconds = duration;
        }
    }
}

/// Partial user edits for one video, keyed by video id in the overlay map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

impl VideoOverride {
    /// Field-wise merge of newer partial edits into this override.
    pub fn merge(&mut self, other: &VideoOverride) {
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.tags.is_some() {
            self.tags = other.tags.clone();
        }
        if other.resolution.is_some() {
            self.resolution = other.resolution.clone();
        }
        if other.duration_seconds.is_some() {
            self.duration_seconds = other.duration_seconds;
        }
    }
}

/// Structured result of a delete: independent flags per sub-operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub video_id: String,
    /// The remote copy is gone (deleted now, or was already absent).
    pub remote_deleted: bool,
    pub removed_locally: bool,
    pub orphaned: bool,
    pub error: Option<String>,
}

/// A video whose remote deletion failed but whose local record was
/// force-removed. Kept out of the live catalog for manual reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedAsset {
    pub video: Video,
    pub failed_at: DateTime<Utc>,
    pub last_error: String,
}

/// Result of re-attempting a failed remote delete.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    pub video_id: String,
    pub succeeded: bool,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Events emitted when catalog data changes.
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    /// Videos have changed (refreshed, edited, or deleted)
    VideosChanged,
}
