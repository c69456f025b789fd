//! Content package construction, metadata sidecars, and re-import
//!
//! A package is a self-contained zip archive of playlists, video bytes,
//! thumbnails, and a manifest, built for external playback devices. A small
//! JSON sidecar stored next to each archive summarizes its contents so
//! listings never need a full download.
pub mod archive;
mod builder;
mod loader;
mod model;
mod policy;
mod sidecar;

use thiserror::Error;

use crate::cloud_storage::ObjectStoreError;

pub use builder::{IntegrityReport, PackageBuilder, PublishOutcome};
pub use loader::{ImportResult, PackageLoader};
pub use model::{
    ContentPackage, PackageMetadata, PackageStructure, PackageSummary, PlaylistExport,
    PlaylistVideoEntry, VideoExportEntry, VideoLibraryExport, SIDECAR_FORMAT_VERSION,
};
pub use policy::{DefaultExportPolicy, ExportPolicy};
pub use sidecar::SidecarCache;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Object store error: {0}")]
    Store(#[from] ObjectStoreError),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Malformed package data: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Package integrity error: {0}")]
    Integrity(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
