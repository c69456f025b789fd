//! Fixed archive layout and zip serialization
//!
//! ```text
//! content/
//!   packages/
//!     <video-filename>          one per video, original bytes
//!     metadata.json             manifest
//!     thumbnails/
//!       <video-filename-stem>.jpg
//! playlists/
//!   <slug(playlist-name)>.json  one per playlist
//! ```
//!
//! The layout must match exactly; playback devices resolve paths inside the
//! archive verbatim.
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::package::model::{PackageStructure, PlaylistExport, VideoLibraryExport};
use crate::package::PackageError;
use crate::util::{filename_stem, is_compact_timestamp};

pub const PACKAGES_DIR: &str = "content/packages";
pub const MANIFEST_PATH: &str = "content/packages/metadata.json";
pub const THUMBNAILS_DIR: &str = "content/packages/thumbnails";
pub const PLAYLISTS_DIR: &str = "playlists";
pub const ARCHIVE_EXT: &str = ".zip";
pub const ARCHIVE_SUFFIX: &str = "-package.zip";

/// Minimal valid JPEG, embedded when a video has no thumbnail object.
pub const PLACEHOLDER_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xDB, 0x00, 0x43, 0x00, 0x08, 0x06, 0x06, 0x07, 0x06,
    0x05, 0x08, 0x07, 0x07, 0x07, 0x09, 0x09, 0x08, 0x0A, 0x0C, 0x14, 0x0D, 0x0C, 0x0B, 0x0B,
    0x0C, 0x19, 0x12, 0x13, 0x0F, 0x14, 0x1D, 0x1A, 0x1F, 0x1E, 0x1D, 0x1A, 0x1C, 0x1C, 0x20,
    0x24, 0x2E, 0x27, 0x20, 0x22, 0x2C, 0x23, 0x1C, 0x1C, 0x28, 0x37, 0x29, 0x2C, 0x30, 0x31,
    0x34, 0x34, 0x34, 0x1F, 0x27, 0x39, 0x3D, 0x38, 0x32, 0x3C, 0x2E, 0x33, 0x34, 0x32, 0xFF,
    0xC0, 0x00, 0x0B, 0x08, 0x00, 0x01, 0x00, 0x01, 0x01, 0x01, 0x11, 0x00, 0xFF, 0xC4, 0x00,
    0x1F, 0x00, 0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0xFB, 0xD5, 0xDB, 0x20, 0xA8,
    0xF1, 0x7E, 0xFF, 0xD9,
];

/// Placeholder bytes embedded when a video's object could not be fetched.
/// Keeps the archive structure well-formed; devices treat zero-length-ish
/// entries as unavailable content.
pub const PLACEHOLDER_VIDEO: &[u8] = b"unavailable\n";

/// Raw assets to embed, keyed by video filename.
#[derive(Debug, Default)]
pub struct ArchiveAssets {
    pub videos: BTreeMap<String, Vec<u8>>,
    pub thumbnails: BTreeMap<String, Vec<u8>>,
}

/// Serialize a built package plus its assets into zip bytes.
pub fn write_archive(
    manifest: &VideoLibraryExport,
    playlist_files: &BTreeMap<String, PlaylistExport>,
    assets: &ArchiveAssets,
) -> Result<Vec<u8>, PackageError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (filename, data) in &assets.videos {
        writer.start_file(format!("{PACKAGES_DIR}/{filename}"), options)?;
        writer.write_all(data)?;
    }

    writer.start_file(MANIFEST_PATH, options)?;
    writer.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    for (filename, data) in &assets.thumbnails {
        let stem = filename_stem(filename);
        writer.start_file(format!("{THUMBNAILS_DIR}/{stem}.jpg"), options)?;
        writer.write_all(data)?;
    }

    for (file_name, playlist) in playlist_files {
        writer.start_file(format!("{PLAYLISTS_DIR}/{file_name}"), options)?;
        writer.write_all(&serde_json::to_vec_pretty(playlist)?)?;
    }

    let cursor = writer.finish()?;
    let bytes = cursor.into_inner();
    debug!("Serialized archive: {} bytes", bytes.len());
    Ok(bytes)
}

/// Parse an archive's manifest and playlist files without importing.
pub fn parse_structure(archive_key: &str, bytes: &[u8]) -> Result<PackageStructure, PackageError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let manifest: VideoLibraryExport = match archive.by_name(MANIFEST_PATH) {
        Ok(mut file) => {
            let mut json = String::new();
            file.read_to_string(&mut json).map_err(PackageError::Io)?;
            serde_json::from_str(&json)?
        }
        Err(ZipError::FileNotFound) => {
            return Err(PackageError::Integrity(format!(
                "Archive {archive_key} has no manifest at {MANIFEST_PATH}"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let playlist_paths: Vec<String> = archive
        .file_names()
        .filter(|name| {
            name.starts_with(&format!("{PLAYLISTS_DIR}/")) && name.ends_with(".json")
        })
        .map(str::to_string)
        .collect();

    let mut playlists = Vec::new();
    let mut required_filenames = BTreeSet::new();
    for path in playlist_paths {
        let mut file = archive.by_name(&path)?;
        let mut json = String::new();
        file.read_to_string(&mut json).map_err(PackageError::Io)?;
        let playlist: PlaylistExport = serde_json::from_str(&json)?;
        for entry in &playlist.videos {
            required_filenames.insert(entry.filename.clone());
        }
        playlists.push(playlist);
    }
    playlists.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(PackageStructure {
        archive_key: archive_key.to_string(),
        manifest,
        playlists,
        required_filenames,
    })
}

/// Read a single entry's bytes out of an archive.
pub fn read_entry(bytes: &[u8], path: &str) -> Result<Vec<u8>, PackageError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).map_err(PackageError::Io)?;
    Ok(data)
}

/// Human name of a package, recovered from its archive key.
///
/// `playlists/lobby-loop-20260807T101500Z-package.zip` → `lobby-loop`.
pub fn package_name_from_key(archive_key: &str) -> String {
    let basename = archive_key.rsplit('/').next().unwrap_or(archive_key);
    let trimmed = basename
        .strip_suffix(ARCHIVE_SUFFIX)
        .or_else(|| basename.strip_suffix(ARCHIVE_EXT))
        .unwrap_or(basename);
    match trimmed.rsplit_once('-') {
        Some((name, tail)) if is_compact_timestamp(tail) => name.to_string(),
        _ => trimmed.to_string(),
    }
}
