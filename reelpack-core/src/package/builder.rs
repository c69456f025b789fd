use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::Video;
use crate::cloud_storage::ObjectStore;
use crate::package::archive::{
    self, ArchiveAssets, ARCHIVE_SUFFIX, PLACEHOLDER_JPEG, PLACEHOLDER_VIDEO,
};
use crate::package::model::{
    ContentPackage, PackageMetadata, PlaylistExport, PlaylistVideoEntry, VideoExportEntry,
    VideoLibraryExport, SIDECAR_FORMAT_VERSION,
};
use crate::package::policy::ExportPolicy;
use crate::package::sidecar::SidecarCache;
use crate::package::PackageError;
use crate::playlist::Playlist;
use crate::util::{compact_timestamp, filename_stem, format_duration, slugify, ProgressCallback};

/// Partition of a playlist's ordered id list against a video set.
///
/// `valid_ids` and `missing_ids` are disjoint and together cover
/// `video_order` exactly, preserving order.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub valid: bool,
    pub valid_ids: Vec<String>,
    pub missing_ids: Vec<String>,
}

/// Result of a publish, with independent flags per sub-operation.
/// An archive with a missing sidecar is still valid; the metadata cache's
/// generation fallback covers it.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub archive_key: String,
    pub sidecar_saved: bool,
    pub public_url: String,
}

/// Builds content packages from playlists and videos and publishes them.
pub struct PackageBuilder {
    store: Arc<dyn ObjectStore>,
    package_prefix: String,
    policy: Arc<dyn ExportPolicy>,
    sidecar: SidecarCache,
}

impl PackageBuilder {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        package_prefix: &str,
        policy: Arc<dyn ExportPolicy>,
    ) -> Self {
        PackageBuilder {
            sidecar: SidecarCache::new(store.clone()),
            store,
            package_prefix: package_prefix.to_string(),
            policy,
        }
    }

    /// Partition a playlist's video ids into resolvable and dangling.
    ///
    /// Used before export (to drop dangling references) and before import
    /// (to report which package videos are locally unavailable).
    pub fn validate_integrity(playlist: &Playlist, videos: &[Video]) -> IntegrityReport {
        let known: HashSet<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        let mut valid_ids = Vec::new();
        let mut missing_ids = Vec::new();
        for id in &playlist.video_order {
            if known.contains(id.as_str()) {
                valid_ids.push(id.clone());
            } else {
                missing_ids.push(id.clone());
            }
        }
        IntegrityReport {
            valid: missing_ids.is_empty(),
            valid_ids,
            missing_ids,
        }
    }

    /// Build the canonical package structure from playlists and videos.
    ///
    /// Every playlist is cleaned first: dangling ids are dropped (logged by
    /// name) so the resulting structure always passes cross-reference
    /// validation. The manifest maps each distinct referenced filename to
    /// its export entry; mood and category come from the policy over the
    /// first playlist that references the video.
    pub fn build_package(
        &self,
        name: &str,
        videos: &[Video],
        playlists: &[Playlist],
    ) -> ContentPackage {
        let by_id: HashMap<&str, &Video> = videos.iter().map(|v| (v.id.as_str(), v)).collect();
        let mut playlist_files: BTreeMap<String, PlaylistExport> = BTreeMap::new();
        let mut manifest_videos: BTreeMap<String, VideoExportEntry> = BTreeMap::new();

        for playlist in playlists {
            let report = Self::validate_integrity(playlist, videos);
            if !report.missing_ids.is_empty() {
                warn!(
                    "Dropping {} dangling reference(s) from playlist '{}': {:?}",
                    report.missing_ids.len(),
                    playlist.name,
                    report.missing_ids
                );
            }

            let mood = self.policy.mood(&playlist.name);
            let category = self.policy.category(&playlist.name);

            let mut entries = Vec::with_capacity(report.valid_ids.len());
            for id in &report.valid_ids {
                let video = by_id[id.as_str()];
                entries.push(playlist_entry(video));
                manifest_videos
                    .entry(video.filename.clone())
                    .or_insert_with(|| manifest_entry(video, &mood, &category));
            }

            let base = slugify(&playlist.name);
            let mut file_name = format!("{base}.json");
            let mut suffix = 2;
            while playlist_files.contains_key(&file_name) {
                file_name = format!("{base}-{suffix}.json");
                suffix += 1;
            }
            playlist_files.insert(
                file_name,
                PlaylistExport {
                    name: playlist.name.clone(),
                    description: playlist.description.clone(),
                    mood,
                    loop_enabled: true,
                    videos: entries,
                },
            );
        }

        let total_duration_seconds = manifest_videos.values().map(|e| e.duration_seconds).sum();
        ContentPackage {
            name: name.to_string(),
            manifest: VideoLibraryExport {
                last_updated: Utc::now(),
                total_videos: manifest_videos.len(),
                total_duration_seconds,
                videos: manifest_videos,
            },
            playlist_files,
        }
    }

    /// Cross-reference check: every filename in every playlist file must
    /// exist in the manifest. Violations are hard errors.
    pub fn validate_package(package: &ContentPackage) -> Vec<String> {
        let mut errors = Vec::new();
        for (file_name, playlist) in &package.playlist_files {
            for entry in &playlist.videos {
                if !package.manifest.videos.contains_key(&entry.filename) {
                    errors.push(format!(
                        "Playlist file {file_name} references {} which is absent from the manifest",
                        entry.filename
                    ));
                }
            }
        }
        errors
    }

    /// Fetch every referenced video and thumbnail and lay out the archive.
    ///
    /// A failed video fetch is contained: a placeholder entry keeps the
    /// archive well-formed instead of sinking the whole build. Progress is
    /// reported as (videos embedded, total).
    pub async fn serialize_to_archive(
        &self,
        package: &ContentPackage,
        videos: &[Video],
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<u8>, PackageError> {
        let by_filename: HashMap<&str, &Video> =
            videos.iter().map(|v| (v.filename.as_str(), v)).collect();
        let total = package.manifest.videos.len();
        let mut assets = ArchiveAssets::default();

        for (done, filename) in package.manifest.videos.keys().enumerate() {
            let video = by_filename.get(filename.as_str()).copied();

            let data = match video {
                Some(v) => match self.store.get(&v.storage_ref.key).await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(
                            "Could not fetch {} for archive, embedding placeholder: {}",
                            v.storage_ref.key, e
                        );
                        PLACEHOLDER_VIDEO.to_vec()
                    }
                },
                None => PLACEHOLDER_VIDEO.to_vec(),
            };
            assets.videos.insert(filename.clone(), data);

            let thumbnail = match video.and_then(|v| v.storage_ref.thumbnail_key.clone()) {
                Some(key) => match self.store.get(&key).await {
                    Ok(data) => data,
                    Err(e) => {
                        debug!("No thumbnail at {} ({}), using placeholder", key, e);
                        PLACEHOLDER_JPEG.to_vec()
                    }
                },
                None => PLACEHOLDER_JPEG.to_vec(),
            };
            assets.thumbnails.insert(filename.clone(), thumbnail);

            if let Some(callback) = progress {
                callback(done + 1, total);
            }
        }

        archive::write_archive(&package.manifest, &package.playlist_files, &assets)
    }

    /// Build, serialize, upload the archive, then upload the sidecar.
    ///
    /// The sidecar write is independent of the archive write; its failure is
    /// reported, not fatal.
    pub async fn publish(
        &self,
        name: &str,
        videos: &[Video],
        playlists: &[Playlist],
        progress: Option<&ProgressCallback>,
    ) -> Result<PublishOutcome, PackageError> {
        let package = self.build_package(name, videos, playlists);
        let errors = Self::validate_package(&package);
        if !errors.is_empty() {
            return Err(PackageError::Integrity(errors.join("; ")));
        }

        let bytes = self.serialize_to_archive(&package, videos, progress).await?;
        let archive_key = format!(
            "{}{}-{}{}",
            self.package_prefix,
            slugify(name),
            compact_timestamp(Utc::now()),
            ARCHIVE_SUFFIX
        );
        self.store
            .put(&archive_key, &bytes, "application/zip", HashMap::new())
            .await?;
        info!(
            "Published package {} ({} playlists, {} videos, {} bytes)",
            archive_key,
            package.playlist_files.len(),
            package.manifest.videos.len(),
            bytes.len()
        );

        let metadata = PackageMetadata {
            package_name: name.to_string(),
            filename: archive_key
                .rsplit('/')
                .next()
                .unwrap_or(&archive_key)
                .to_string(),
            playlist_count: package.playlist_files.len(),
            video_count: package.manifest.videos.len(),
            playlist_names: package
                .playlist_files
                .values()
                .map(|p| p.name.clone())
                .collect(),
            total_size_bytes: bytes.len() as u64,
            created_at: package.manifest.last_updated,
            format_version: SIDECAR_FORMAT_VERSION,
        };
        let sidecar_saved = match self.sidecar.save(&archive_key, &metadata).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Sidecar write failed for {}: {}", archive_key, e);
                false
            }
        };

        Ok(PublishOutcome {
            public_url: self.store.public_url(&archive_key),
            archive_key,
            sidecar_saved,
        })
    }
}

fn playlist_entry(video: &Video) -> PlaylistVideoEntry {
    PlaylistVideoEntry {
        filename: video.filename.clone(),
        title: video.title.clone(),
        duration_seconds: video.duration_seconds,
        duration_formatted: format_duration(video.duration_seconds),
        thumbnail: thumbnail_path(&video.filename),
    }
}

fn manifest_entry(video: &Video, mood: &str, category: &str) -> VideoExportEntry {
    VideoExportEntry {
        title: video.title.clone(),
        filename: video.filename.clone(),
        duration_seconds: video.duration_seconds,
        duration_formatted: format_duration(video.duration_seconds),
        thumbnail: thumbnail_path(&video.filename),
        mood: mood.to_string(),
        resolution: video
            .resolution
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        category: category.to_string(),
    }
}

fn thumbnail_path(filename: &str) -> String {
    format!("thumbnails/{}.jpg", filename_stem(filename))
}
