use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::Video;
use crate::cloud_storage::ObjectStore;
use crate::package::archive::{self, ARCHIVE_EXT};
use crate::package::model::{PackageStructure, PackageSummary};
use crate::package::sidecar::SidecarCache;
use crate::package::PackageError;
use crate::playlist::Playlist;

/// Result of importing a package's playlists against the current catalog.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    /// Rebuilt playlists with fresh local ids.
    pub playlists: Vec<Playlist>,
    /// Filenames the package requires that are locally unavailable.
    pub missing_videos: Vec<String>,
    /// Playlists skipped because no referenced video resolved locally.
    pub skipped_playlists: Vec<String>,
}

/// Discovers existing archives and re-imports their playlists.
pub struct PackageLoader {
    store: Arc<dyn ObjectStore>,
    package_prefix: String,
    sidecar: SidecarCache,
}

impl PackageLoader {
    pub fn new(store: Arc<dyn ObjectStore>, package_prefix: &str) -> Self {
        PackageLoader {
            sidecar: SidecarCache::new(store.clone()),
            store,
            package_prefix: package_prefix.to_string(),
        }
    }

    /// Enumerate archives under the package prefix, most recent first.
    ///
    /// Costs one sidecar read per archive; only archives missing a sidecar
    /// are downloaded, once each; the generation fallback backfills them.
    pub async fn list_packages(&self) -> Result<Vec<PackageSummary>, PackageError> {
        let objects = self.store.list(&self.package_prefix, None).await?;
        let mut summaries = Vec::new();
        for obj in &objects {
            if !obj.key.ends_with(ARCHIVE_EXT) {
                continue;
            }
            let metadata = match self.sidecar.fetch(&obj.key).await {
                Ok(Some(metadata)) => metadata,
                Ok(None) => match self.sidecar.generate_from_archive(&obj.key).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!("Skipping unreadable package {}: {}", obj.key, e);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("Skipping package {} with unreadable sidecar: {}", obj.key, e);
                    continue;
                }
            };
            summaries.push(PackageSummary {
                archive_key: obj.key.clone(),
                public_url: self.store.public_url(&obj.key),
                metadata,
            });
        }
        summaries.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
        Ok(summaries)
    }

    /// Download an archive and parse its internal structure without importing.
    pub async fn load_structure(&self, archive_key: &str) -> Result<PackageStructure, PackageError> {
        let bytes = self.store.get(archive_key).await?;
        archive::parse_structure(archive_key, &bytes)
    }

    /// Rebuild a package's playlists against the *current* catalog.
    ///
    /// Filenames absent locally are dropped and reported; a playlist left
    /// with no resolvable videos is skipped rather than imported empty.
    /// Imported playlists get fresh local ids.
    pub fn import_as_playlists(
        &self,
        structure: &PackageStructure,
        current_videos: &[Video],
    ) -> ImportResult {
        let by_filename: HashMap<&str, &Video> = current_videos
            .iter()
            .map(|v| (v.filename.as_str(), v))
            .collect();

        let mut result = ImportResult::default();
        let mut missing: BTreeSet<String> = BTreeSet::new();

        for export in &structure.playlists {
            let mut order = Vec::new();
            for entry in &export.videos {
                match by_filename.get(entry.filename.as_str()) {
                    Some(video) => order.push(video.id.clone()),
                    None => {
                        missing.insert(entry.filename.clone());
                    }
                }
            }
            if order.is_empty() {
                info!(
                    "Skipping playlist '{}': no referenced video is locally available",
                    export.name
                );
                result.skipped_playlists.push(export.name.clone());
                continue;
            }

            let now = Utc::now();
            let mut playlist = Playlist {
                id: Uuid::new_v4().to_string(),
                name: export.name.clone(),
                description: export.description.clone(),
                video_order: order,
                date_created: now,
                last_modified: now,
                metadata: Default::default(),
            };
            playlist.recompute_metadata(|id| {
                current_videos.iter().find(|v| v.id == id).cloned()
            });
            result.playlists.push(playlist);
        }

        result.missing_videos = missing.into_iter().collect();
        result
    }

    /// Download the raw archive bytes.
    pub async fn download(&self, archive_key: &str) -> Result<Vec<u8>, PackageError> {
        Ok(self.store.get(archive_key).await?)
    }

    /// Delete an archive and its sidecar.
    ///
    /// Sidecar deletion failure never blocks the archive deletion.
    pub async fn delete(&self, archive_key: &str) -> Result<(), PackageError> {
        self.store.delete(archive_key).await?;
        if let Err(e) = self.sidecar.delete(archive_key).await {
            warn!("Failed to delete sidecar for {}: {}", archive_key, e);
        }
        info!("Deleted package {}", archive_key);
        Ok(())
    }
}
