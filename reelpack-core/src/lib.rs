//! Core engine for a video library backed by a remote object store.
//!
//! The crate keeps a locally-cached, user-editable view of the remote
//! catalog consistent with the store (the single source of truth), enforces
//! referential integrity between playlists and videos, and builds
//! self-contained content packages (zip archives plus a metadata sidecar)
//! for playback devices.

pub mod catalog;
pub mod cloud_storage;
pub mod config;
pub mod ingest;
pub mod library;
pub mod package;
pub mod playlist;
pub mod retry;
pub mod util;

pub use catalog::{
    CatalogError, CatalogEvent, CatalogService, DeleteOutcome, OrphanedAsset, RetryOutcome,
    StorageRef, Video, VideoOverride,
};
pub use cloud_storage::{ObjectStore, ObjectStoreError, RemoteObject, S3ObjectStore};
pub use config::{Config, ConfigError, S3Config};
pub use ingest::{IngestFile, IngestOutcome, IngestReport, IngestService, MediaProbe, ProbeError, ProbeOutcome};
pub use library::VideoLibrary;
pub use package::{
    ContentPackage, DefaultExportPolicy, ExportPolicy, ImportResult, IntegrityReport,
    PackageBuilder, PackageError, PackageLoader, PackageMetadata, PackageStructure,
    PackageSummary, PlaylistExport, PlaylistVideoEntry, PublishOutcome, SidecarCache,
    VideoExportEntry, VideoLibraryExport,
};
pub use playlist::{Playlist, PlaylistEvent, PlaylistMetadata, PlaylistStore};
pub use util::ProgressCallback;
