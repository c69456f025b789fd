use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::model::{
    CatalogEvent, DeleteOutcome, OrphanedAsset, RetryOutcome, Video, VideoOverride,
};
use crate::cloud_storage::{ObjectStore, ObjectStoreError};
use crate::retry::retry_with_backoff;

const OVERRIDES_FILE: &str = "overrides.json";

const DELETE_RETRY_ATTEMPTS: u32 = 3;
const DELETE_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Object store error: {0}")]
    Store(#[from] ObjectStoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Maintains the authoritative set of video records.
///
/// `refresh` lists the store and replaces the in-memory snapshot; the local
/// overlay of user edits is merged on top of every store-derived record.
/// Constructed with an injected store client; consumers hold it behind an
/// `Arc` and subscribe to change events.
pub struct CatalogService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    video_prefix: String,
    thumbnail_prefix: String,
    data_dir: PathBuf,
    snapshot: RwLock<HashMap<String, Video>>,
    overrides: RwLock<HashMap<String, VideoOverride>>,
    orphans: RwLock<Vec<OrphanedAsset>>,
    /// Serializes refreshes so concurrent calls coalesce onto one listing.
    refresh_lock: Mutex<()>,
    refresh_gen: AtomicU64,
    event_tx: broadcast::Sender<CatalogEvent>,
}

impl CatalogService {
    /// Open the catalog, loading the persisted edit overlay from `data_dir`.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        video_prefix: &str,
        thumbnail_prefix: &str,
        data_dir: &Path,
    ) -> Result<Self, CatalogError> {
        tokio::fs::create_dir_all(data_dir).await?;
        let overrides = load_overrides(&data_dir.join(OVERRIDES_FILE)).await?;
        if !overrides.is_empty() {
            info!("Loaded {} video overrides", overrides.len());
        }
        let (event_tx, _) = broadcast::channel(16);
        Ok(CatalogService {
            store,
            bucket: bucket.to_string(),
            video_prefix: video_prefix.to_string(),
            thumbnail_prefix: thumbnail_prefix.to_string(),
            data_dir: data_dir.to_path_buf(),
            snapshot: RwLock::new(HashMap::new()),
            overrides: RwLock::new(overrides),
            orphans: RwLock::new(Vec::new()),
            refresh_lock: Mutex::new(()),
            refresh_gen: AtomicU64::new(0),
            event_tx,
        })
    }

    /// Subscribe to catalog events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CatalogEvent> {
        self.event_tx.subscribe()
    }

    fn notify_changed(&self) {
        let _ = self.event_tx.send(CatalogEvent::VideosChanged);
    }

    /// Current snapshot, sorted by title.
    pub fn videos(&self) -> Vec<Video> {
        let mut videos: Vec<Video> = self.snapshot.read().values().cloned().collect();
        videos.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        videos
    }

    pub fn get(&self, id: &str) -> Option<Video> {
        self.snapshot.read().get(id).cloned()
    }

    /// Re-list the store and replace the snapshot.
    ///
    /// Calls that arrive while a refresh is in flight wait for it and reuse
    /// its result instead of issuing a second list operation.
    pub async fn refresh(&self) -> Result<Vec<Video>, CatalogError> {
        let entered_gen = self.refresh_gen.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        if self.refresh_gen.load(Ordering::Acquire) != entered_gen {
            debug!("Refresh coalesced onto in-flight listing");
            return Ok(self.videos());
        }

        let objects = self.store.list(&self.video_prefix, None).await?;
        let overrides = self.overrides.read().clone();
        let mut next = HashMap::new();
        for obj in &objects {
            if obj.key.ends_with('/') {
                continue;
            }
            let mut video =
                Video::from_remote(obj, &self.bucket, &self.video_prefix, &self.thumbnail_prefix);
            video.storage_ref.thumbnail_url = video
                .storage_ref
                .thumbnail_key
                .as_deref()
                .map(|k| self.store.public_url(k));
            if let Some(ov) = overrides.get(&video.id) {
                video.apply_override(ov);
            }
            next.insert(video.id.clone(), video);
        }

        let count = next.len();
        *self.snapshot.write() = next;
        self.refresh_gen.fetch_add(1, Ordering::Release);
        self.notify_changed();
        info!("Catalog refreshed: {} videos", count);
        Ok(self.videos())
    }

    /// Merge partial edits into the overlay and re-apply to the snapshot.
    ///
    /// The overlay is persisted independently of the snapshot and survives
    /// refreshes. Returns the updated record if it is currently cataloged.
    pub async fn apply_override(
        &self,
        id: &str,
        partial: VideoOverride,
    ) -> Result<Option<Video>, CatalogError> {
        {
            let mut overrides = self.overrides.write();
            overrides.entry(id.to_string()).or_default().merge(&partial);
        }
        self.save_overrides().await?;

        let updated = {
            let mut snapshot = self.snapshot.write();
            snapshot.get_mut(id).map(|video| {
                video.apply_override(&partial);
                video.last_modified = Utc::now();
                video.clone()
            })
        };
        if updated.is_some() {
            self.notify_changed();
        }
        Ok(updated)
    }

    /// Delete a video: remote first, local only once the remote copy is gone.
    ///
    /// With `force`, a failed remote delete still removes the local record
    /// and tracks the asset as orphaned for manual cleanup. Without `force`,
    /// a failed remote delete leaves all state untouched.
    pub async fn delete(&self, id: &str, force: bool) -> DeleteOutcome {
        let Some(video) = self.get(id) else {
            return DeleteOutcome {
                video_id: id.to_string(),
                remote_deleted: false,
                removed_locally: false,
                orphaned: false,
                error: Some(format!("Unknown video id: {id}")),
            };
        };

        match self.store.delete(&video.storage_ref.key).await {
            Ok(()) => {
                self.delete_thumbnail(&video).await;
                self.remove_local(id).await;
                DeleteOutcome {
                    video_id: id.to_string(),
                    remote_deleted: true,
                    removed_locally: true,
                    orphaned: false,
                    error: None,
                }
            }
            Err(ObjectStoreError::NotFound(_)) => {
                debug!("Video {} had no remote backing, removing locally", id);
                self.remove_local(id).await;
                DeleteOutcome {
                    video_id: id.to_string(),
                    remote_deleted: true,
                    removed_locally: true,
                    orphaned: false,
                    error: None,
                }
            }
            Err(e) if force => {
                warn!(
                    "Remote delete failed for {} ({}), force-removing locally: {}",
                    id, video.storage_ref.key, e
                );
                self.orphans.write().push(OrphanedAsset {
                    video: video.clone(),
                    failed_at: Utc::now(),
                    last_error: e.to_string(),
                });
                self.remove_local(id).await;
                DeleteOutcome {
                    video_id: id.to_string(),
                    remote_deleted: false,
                    removed_locally: true,
                    orphaned: true,
                    error: Some(e.to_string()),
                }
            }
            Err(e) => {
                warn!("Remote delete failed for {}, keeping local record: {}", id, e);
                DeleteOutcome {
                    video_id: id.to_string(),
                    remote_deleted: false,
                    removed_locally: false,
                    orphaned: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Assets force-removed locally whose remote deletion still has to happen.
    pub fn orphans(&self) -> Vec<OrphanedAsset> {
        self.orphans.read().clone()
    }

    /// Re-attempt the remote delete for an orphaned asset.
    ///
    /// Bounded retries with exponential backoff; the orphan marker is
    /// cleared only on success.
    pub async fn retry_delete(&self, id: &str) -> RetryOutcome {
        let orphan = self
            .orphans
            .read()
            .iter()
            .find(|o| o.video.id == id)
            .cloned();
        let Some(orphan) = orphan else {
            return RetryOutcome {
                video_id: id.to_string(),
                succeeded: false,
                attempts: 0,
                error: Some(format!("No orphaned asset recorded for id: {id}")),
            };
        };

        let key = orphan.video.storage_ref.key.clone();
        let (result, attempts) = retry_with_backoff(
            DELETE_RETRY_ATTEMPTS,
            DELETE_RETRY_BASE_DELAY,
            "Remote video delete",
            || self.store.delete(&key),
        )
        .await;

        match result {
            Ok(()) => {
                self.delete_thumbnail(&orphan.video).await;
                self.orphans.write().retain(|o| o.video.id != id);
                info!("Orphaned asset {} deleted remotely after {} attempts", id, attempts);
                RetryOutcome {
                    video_id: id.to_string(),
                    succeeded: true,
                    attempts,
                    error: None,
                }
            }
            Err(e) => {
                let mut orphans = self.orphans.write();
                if let Some(entry) = orphans.iter_mut().find(|o| o.video.id == id) {
                    entry.last_error = e.to_string();
                }
                RetryOutcome {
                    video_id: id.to_string(),
                    succeeded: false,
                    attempts,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Best-effort thumbnail cleanup; never fails the parent operation.
    async fn delete_thumbnail(&self, video: &Video) {
        if let Some(thumbnail_key) = &video.storage_ref.thumbnail_key {
            if let Err(e) = self.store.delete(thumbnail_key).await {
                warn!("Failed to delete thumbnail {}: {}", thumbnail_key, e);
            }
        }
    }

    async fn remove_local(&self, id: &str) {
        self.snapshot.write().remove(id);
        let had_override = self.overrides.write().remove(id).is_some();
        if had_override {
            if let Err(e) = self.save_overrides().await {
                warn!("Failed to persist overrides after delete: {}", e);
            }
        }
        self.notify_changed();
    }

    async fn save_overrides(&self) -> Result<(), CatalogError> {
        let overrides = self.overrides.read().clone();
        let json = serde_json::to_vec_pretty(&overrides)?;
        tokio::fs::write(self.data_dir.join(OVERRIDES_FILE), json).await?;
        Ok(())
    }
}

async fn load_overrides(
    path: &Path,
) -> Result<HashMap<String, VideoOverride>, CatalogError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}
