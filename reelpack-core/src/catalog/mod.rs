//! Catalog reconciliation layer
//!
//! The remote store owns the canonical video set; this module maintains the
//! in-memory snapshot derived from store listings, merges the local edit
//! overlay on top, and coordinates deletion (including orphan tracking for
//! force-removed assets whose remote delete failed).
mod model;
mod service;

pub use model::{
    CatalogEvent, DeleteOutcome, OrphanedAsset, RetryOutcome, StorageRef, Video, VideoOverride,
};
pub use service::{CatalogError, CatalogService};
