use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogService, Video};

const PLAYLISTS_FILE: &str = "playlists.json";

/// Aggregate playlist metadata.
///
/// Always a pure function of `video_order` and the current video set; it is
/// recomputed by every mutation and never hand-edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub total_duration_seconds: u64,
    pub video_count: usize,
    pub total_size_bytes: u64,
}

/// An ordered collection of video references.
///
/// `video_order` is the sole ordering authority and contains no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: String,
    pub video_order: Vec<String>,
    pub date_created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub metadata: PlaylistMetadata,
}

impl Playlist {
    pub fn new(name: &str, description: Option<&str>) -> Playlist {
        let now = Utc::now();
        Playlist {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.unwrap_or_default().to_string(),
            video_order: Vec::new(),
            date_created: now,
            last_modified: now,
            metadata: PlaylistMetadata::default(),
        }
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.video_order.iter().any(|v| v == video_id)
    }

    /// Recompute aggregates from `video_order` and a video resolver.
    ///
    /// Unresolvable ids contribute nothing to duration/size but still count
    /// toward `video_count` (they remain in the order until removed).
    pub fn recompute_metadata<F>(&mut self, resolve: F)
    where
        F: Fn(&str) -> Option<Video>,
    {
        let mut total_duration_seconds = 0u64;
        let mut total_size_bytes = 0u64;
        for id in &self.video_order {
            if let Some(video) = resolve(id) {
                total_duration_seconds += video.duration_seconds;
                total_size_bytes += video.file_size_bytes;
            }
        }
        self.metadata = PlaylistMetadata {
            total_duration_seconds,
            video_count: self.video_order.len(),
            total_size_bytes,
        };
    }
}

/// Events emitted when playlist data changes.
#[derive(Debug, Clone)]
pub enum PlaylistEvent {
    PlaylistsChanged,
}

/// Store for locally-owned playlists.
///
/// Referential integrity is enforced against the catalog's current snapshot:
/// an edit may never reference a video that does not resolve at the moment
/// of the edit. Every mutation recomputes aggregates in the same call and
/// persists the full playlist set.
pub struct PlaylistStore {
    catalog: Arc<CatalogService>,
    playlists: RwLock<HashMap<String, Playlist>>,
    data_dir: PathBuf,
    event_tx: broadcast::Sender<PlaylistEvent>,
}

impl PlaylistStore {
    /// Open the store, loading persisted playlists from `data_dir`.
    pub async fn open(catalog: Arc<CatalogService>, data_dir: &Path) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let playlists = load_playlists(&data_dir.join(PLAYLISTS_FILE)).await?;
        if !playlists.is_empty() {
            info!("Loaded {} playlists", playlists.len());
        }
        let (event_tx, _) = broadcast::channel(16);
        Ok(PlaylistStore {
            catalog,
            playlists: RwLock::new(playlists),
            data_dir: data_dir.to_path_buf(),
            event_tx,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaylistEvent> {
        self.event_tx.subscribe()
    }

    pub fn get(&self, playlist_id: &str) -> Option<Playlist> {
        self.playlists.read().get(playlist_id).cloned()
    }

    /// All playlists, oldest first.
    pub fn all(&self) -> Vec<Playlist> {
        let mut playlists: Vec<Playlist> = self.playlists.read().values().cloned().collect();
        playlists.sort_by(|a, b| a.date_created.cmp(&b.date_created).then_with(|| a.id.cmp(&b.id)));
        playlists
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> Playlist {
        let playlist = Playlist::new(name, description);
        self.playlists
            .write()
            .insert(playlist.id.clone(), playlist.clone());
        self.after_mutation().await;
        playlist
    }

    /// Adopt an externally-built playlist (e.g. a package import).
    pub async fn insert(&self, playlist: Playlist) {
        self.playlists.write().insert(playlist.id.clone(), playlist);
        self.after_mutation().await;
    }

    /// Append or insert a video reference.
    ///
    /// Fails (no mutation) if the video does not resolve in the catalog
    /// snapshot, if the playlist is unknown, or if the id is already present.
    pub async fn add_video(
        &self,
        playlist_id: &str,
        video_id: &str,
        at_index: Option<usize>,
    ) -> bool {
        if self.catalog.get(video_id).is_none() {
            warn!(
                "Rejecting add of unknown video {} to playlist {}",
                video_id, playlist_id
            );
            return false;
        }
        let changed = {
            let mut playlists = self.playlists.write();
            let Some(playlist) = playlists.get_mut(playlist_id) else {
                return false;
            };
            if playlist.contains(video_id) {
                return false;
            }
            let index = at_index
                .unwrap_or(playlist.video_order.len())
                .min(playlist.video_order.len());
            playlist.video_order.insert(index, video_id.to_string());
            self.finish_edit(playlist);
            true
        };
        if changed {
            self.after_mutation().await;
        }
        changed
    }

    pub async fn remove_video(&self, playlist_id: &str, video_id: &str) -> bool {
        let changed = {
            let mut playlists = self.playlists.write();
            let Some(playlist) = playlists.get_mut(playlist_id) else {
                return false;
            };
            let before = playlist.video_order.len();
            playlist.video_order.retain(|v| v != video_id);
            if playlist.video_order.len() == before {
                return false;
            }
            self.finish_edit(playlist);
            true
        };
        if changed {
            self.after_mutation().await;
        }
        changed
    }

    /// Move a video between playlists (or into one, when `from` is `None`).
    ///
    /// Remove-then-add: if the add fails after the remove succeeded, the
    /// remove is not rolled back and the reference is lost from both.
    pub async fn move_video(
        &self,
        from_playlist_id: Option<&str>,
        to_playlist_id: &str,
        video_id: &str,
        at_index: Option<usize>,
    ) -> bool {
        let Some(from) = from_playlist_id else {
            return self.add_video(to_playlist_id, video_id, at_index).await;
        };
        if !self.remove_video(from, video_id).await {
            return false;
        }
        let added = self.add_video(to_playlist_id, video_id, at_index).await;
        if !added {
            warn!(
                "Move of {} from {} to {} lost the reference: add failed after remove",
                video_id, from, to_playlist_id
            );
        }
        added
    }

    /// Splice a video out of the order and reinsert it at `new_index`,
    /// clamped to the list bounds. Aggregates are unaffected.
    pub async fn reorder(&self, playlist_id: &str, video_id: &str, new_index: usize) -> bool {
        let changed = {
            let mut playlists = self.playlists.write();
            let Some(playlist) = playlists.get_mut(playlist_id) else {
                return false;
            };
            let Some(current) = playlist.video_order.iter().position(|v| v == video_id) else {
                return false;
            };
            let id = playlist.video_order.remove(current);
            let index = new_index.min(playlist.video_order.len());
            playlist.video_order.insert(index, id);
            playlist.last_modified = Utc::now();
            true
        };
        if changed {
            self.after_mutation().await;
        }
        changed
    }

    pub async fn rename(&self, playlist_id: &str, name: &str) -> bool {
        let changed = {
            let mut playlists = self.playlists.write();
            let Some(playlist) = playlists.get_mut(playlist_id) else {
                return false;
            };
            playlist.name = name.to_string();
            playlist.last_modified = Utc::now();
            true
        };
        if changed {
            self.after_mutation().await;
        }
        changed
    }

    pub async fn set_description(&self, playlist_id: &str, description: &str) -> bool {
        let changed = {
            let mut playlists = self.playlists.write();
            let Some(playlist) = playlists.get_mut(playlist_id) else {
                return false;
            };
            playlist.description = description.to_string();
            playlist.last_modified = Utc::now();
            true
        };
        if changed {
            self.after_mutation().await;
        }
        changed
    }

    pub async fn delete(&self, playlist_id: &str) -> bool {
        let removed = self.playlists.write().remove(playlist_id).is_some();
        if removed {
            self.after_mutation().await;
        }
        removed
    }

    /// Strip a video id from every playlist, recomputing aggregates.
    ///
    /// Returns the ids of the playlists that referenced it.
    pub async fn purge_video(&self, video_id: &str) -> Vec<String> {
        let touched: Vec<String> = {
            let mut playlists = self.playlists.write();
            let mut touched = Vec::new();
            for playlist in playlists.values_mut() {
                if playlist.contains(video_id) {
                    playlist.video_order.retain(|v| v != video_id);
                    self.finish_edit(playlist);
                    touched.push(playlist.id.clone());
                }
            }
            touched
        };
        if !touched.is_empty() {
            debug!(
                "Purged video {} from {} playlists",
                video_id,
                touched.len()
            );
            self.after_mutation().await;
        }
        touched
    }

    fn finish_edit(&self, playlist: &mut Playlist) {
        playlist.recompute_metadata(|id| self.catalog.get(id));
        playlist.last_modified = Utc::now();
    }

    async fn after_mutation(&self) {
        let _ = self.event_tx.send(PlaylistEvent::PlaylistsChanged);
        if let Err(e) = self.persist().await {
            warn!("Failed to persist playlists: {}", e);
        }
    }

    async fn persist(&self) -> std::io::Result<()> {
        let playlists = self.all();
        let json = serde_json::to_vec_pretty(&playlists)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(self.data_dir.join(PLAYLISTS_FILE), json).await
    }
}

async fn load_playlists(path: &Path) -> std::io::Result<HashMap<String, Playlist>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let playlists: Vec<Playlist> = serde_json::from_slice(&bytes)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            Ok(playlists.into_iter().map(|p| (p.id.clone(), p)).collect())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e),
    }
}
