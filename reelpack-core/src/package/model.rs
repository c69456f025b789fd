use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::package::PackageError;

/// Current sidecar schema version.
pub const SIDECAR_FORMAT_VERSION: u32 = 2;

/// Manifest embedded in every archive at `content/packages/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoLibraryExport {
    pub last_updated: DateTime<Utc>,
    pub total_videos: usize,
    pub total_duration_seconds: u64,
    pub videos: BTreeMap<String, VideoExportEntry>,
}

/// One manifest entry, keyed by video filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoExportEntry {
    pub title: String,
    pub filename: String,
    pub duration_seconds: u64,
    pub duration_formatted: String,
    /// Path relative to the package content directory.
    pub thumbnail: String,
    pub mood: String,
    pub resolution: String,
    pub category: String,
}

/// One playlist file inside an archive (`playlists/<slug>.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistExport {
    pub name: String,
    pub description: String,
    pub mood: String,
    #[serde(rename = "loop", default = "default_loop")]
    pub loop_enabled: bool,
    pub videos: Vec<PlaylistVideoEntry>,
}

fn default_loop() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideoEntry {
    pub filename: String,
    pub title: String,
    pub duration_seconds: u64,
    pub duration_formatted: String,
    pub thumbnail: String,
}

/// Sidecar summarizing an archive, stored next to it under a `.meta.json`
/// key. Reflects the archive's actual contents at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub package_name: String,
    pub filename: String,
    pub playlist_count: usize,
    /// Count of distinct video filenames across all playlists.
    pub video_count: usize,
    pub playlist_names: Vec<String>,
    pub total_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub format_version: u32,
}

/// Parse sidecar JSON, routing legacy shapes through an explicit migration.
///
/// Early sidecars carried no `formatVersion` and used short field names;
/// they are mapped to the current shape instead of being read unchecked.
pub fn migrate_sidecar(value: Value) -> Result<PackageMetadata, PackageError> {
    let version = value
        .get("formatVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    if version >= SIDECAR_FORMAT_VERSION {
        return Ok(serde_json::from_value(value)?);
    }

    let playlist_names: Vec<String> = value
        .get("playlists")
        .or_else(|| value.get("playlistNames"))
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let created_at = value
        .get("created")
        .or_else(|| value.get("createdAt"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Ok(PackageMetadata {
        package_name: string_field(&value, &["name", "packageName"]).unwrap_or_default(),
        filename: string_field(&value, &["file", "filename"]).unwrap_or_default(),
        playlist_count: u64_field(&value, &["playlistCount"])
            .map(|n| n as usize)
            .unwrap_or(playlist_names.len()),
        video_count: u64_field(&value, &["videos", "videoCount"]).unwrap_or(0) as usize,
        playlist_names,
        total_size_bytes: u64_field(&value, &["size", "totalSizeBytes"]).unwrap_or(0),
        created_at,
        format_version: SIDECAR_FORMAT_VERSION,
    })
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| value.get(n).and_then(Value::as_str))
        .map(str::to_string)
}

fn u64_field(value: &Value, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|n| value.get(n).and_then(Value::as_u64))
}

/// A built package: manifest plus playlist files, keyed by file name.
///
/// Immutable once built; every filename referenced by any playlist file
/// exists as a manifest key.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPackage {
    pub name: String,
    pub manifest: VideoLibraryExport,
    pub playlist_files: BTreeMap<String, PlaylistExport>,
}

/// An archive's internal structure, parsed without importing.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageStructure {
    pub archive_key: String,
    pub manifest: VideoLibraryExport,
    pub playlists: Vec<PlaylistExport>,
    /// Distinct video filenames the package requires.
    pub required_filenames: BTreeSet<String>,
}

/// One entry of a package listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSummary {
    pub archive_key: String,
    pub metadata: PackageMetadata,
    pub public_url: String,
}
