use std::sync::Arc;
use tracing::info;

use crate::catalog::{CatalogService, DeleteOutcome, RetryOutcome};
use crate::package::{ImportResult, PackageBuilder, PackageError, PackageLoader, PublishOutcome};
use crate::playlist::PlaylistStore;
use crate::util::ProgressCallback;

/// Coordinates operations that span more than one component.
///
/// The catalog, the playlist store, and the package services stay
/// independently usable; this facade owns the flows where a change in one
/// must be reflected in another (a deleted video leaving playlists, a
/// package import landing in the playlist store).
pub struct VideoLibrary {
    catalog: Arc<CatalogService>,
    playlists: Arc<PlaylistStore>,
    builder: Arc<PackageBuilder>,
    loader: Arc<PackageLoader>,
}

impl VideoLibrary {
    pub fn new(
        catalog: Arc<CatalogService>,
        playlists: Arc<PlaylistStore>,
        builder: Arc<PackageBuilder>,
        loader: Arc<PackageLoader>,
    ) -> Self {
        VideoLibrary {
            catalog,
            playlists,
            builder,
            loader,
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogService> {
        &self.catalog
    }

    pub fn playlists(&self) -> &Arc<PlaylistStore> {
        &self.playlists
    }

    pub fn builder(&self) -> &Arc<PackageBuilder> {
        &self.builder
    }

    pub fn loader(&self) -> &Arc<PackageLoader> {
        &self.loader
    }

    /// Delete a video and strip it from every playlist.
    ///
    /// Playlists are only touched when the local record was actually
    /// removed; a refused delete (remote failure without `force`) leaves
    /// them exactly as they were.
    pub async fn delete_video(&self, video_id: &str, force: bool) -> DeleteOutcome {
        let outcome = self.catalog.delete(video_id, force).await;
        if outcome.removed_locally {
            let touched = self.playlists.purge_video(video_id).await;
            if !touched.is_empty() {
                info!(
                    "Removed video {} from {} playlist(s)",
                    video_id,
                    touched.len()
                );
            }
        }
        outcome
    }

    /// Re-attempt remote deletion for an orphaned asset.
    pub async fn retry_delete(&self, video_id: &str) -> RetryOutcome {
        self.catalog.retry_delete(video_id).await
    }

    /// Publish the current playlists as a content package.
    pub async fn publish_package(
        &self,
        name: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<PublishOutcome, PackageError> {
        let videos = self.catalog.videos();
        let playlists = self.playlists.all();
        self.builder
            .publish(name, &videos, &playlists, progress)
            .await
    }

    /// Import a previously published package's playlists.
    ///
    /// References are re-validated against the current catalog; imported
    /// playlists land in the playlist store under fresh ids.
    pub async fn import_package(&self, archive_key: &str) -> Result<ImportResult, PackageError> {
        let structure = self.loader.load_structure(archive_key).await?;
        let videos = self.catalog.videos();
        let result = self.loader.import_as_playlists(&structure, &videos);
        for playlist in &result.playlists {
            self.playlists.insert(playlist.clone()).await;
        }
        info!(
            "Imported {} playlist(s) from {} ({} missing videos, {} skipped)",
            result.playlists.len(),
            archive_key,
            result.missing_videos.len(),
            result.skipped_playlists.len()
        );
        Ok(result)
    }
}
