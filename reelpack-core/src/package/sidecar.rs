use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cloud_storage::{ObjectStore, ObjectStoreError};
use crate::package::archive::{self, package_name_from_key};
use crate::package::model::{migrate_sidecar, PackageMetadata, SIDECAR_FORMAT_VERSION};
use crate::package::PackageError;

const SIDECAR_EXT: &str = ".meta.json";

/// Sidecar key for an archive: the terminal archive extension is replaced
/// with `.meta.json`.
pub fn sidecar_key(archive_key: &str) -> String {
    match archive_key.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}{SIDECAR_EXT}"),
        None => format!("{archive_key}{SIDECAR_EXT}"),
    }
}

/// Cache of per-archive metadata sidecars.
///
/// A sidecar makes listing cheap: one small JSON read per archive instead of
/// a full download. Absence is not an error; it triggers the generation
/// fallback, which backfills the sidecar so the miss never recurs.
pub struct SidecarCache {
    store: Arc<dyn ObjectStore>,
}

impl SidecarCache {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        SidecarCache { store }
    }

    pub async fn save(
        &self,
        archive_key: &str,
        metadata: &PackageMetadata,
    ) -> Result<(), PackageError> {
        let key = sidecar_key(archive_key);
        let json = serde_json::to_vec_pretty(metadata)?;
        self.store
            .put(&key, &json, "application/json", HashMap::new())
            .await?;
        debug!("Saved sidecar {}", key);
        Ok(())
    }

    /// Fetch the sidecar for an archive. `Ok(None)` means not yet generated.
    pub async fn fetch(&self, archive_key: &str) -> Result<Option<PackageMetadata>, PackageError> {
        let key = sidecar_key(archive_key);
        match self.store.get(&key).await {
            Ok(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(&bytes)?;
                Ok(Some(migrate_sidecar(value)?))
            }
            Err(ObjectStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the sidecar for an archive. Callers treat failure as non-fatal.
    pub async fn delete(&self, archive_key: &str) -> Result<(), ObjectStoreError> {
        self.store.delete(&sidecar_key(archive_key)).await
    }

    /// Derive metadata from the archive itself and backfill the sidecar.
    ///
    /// Downloads the full archive once; after the backfill, listings for
    /// this key are sidecar reads again.
    pub async fn generate_from_archive(
        &self,
        archive_key: &str,
    ) -> Result<PackageMetadata, PackageError> {
        info!("Sidecar missing for {}, deriving from archive", archive_key);
        let bytes = self.store.get(archive_key).await?;
        let structure = archive::parse_structure(archive_key, &bytes)?;

        let metadata = PackageMetadata {
            package_name: package_name_from_key(archive_key),
            filename: archive_key
                .rsplit('/')
                .next()
                .unwrap_or(archive_key)
                .to_string(),
            playlist_count: structure.playlists.len(),
            video_count: structure.required_filenames.len(),
            playlist_names: structure.playlists.iter().map(|p| p.name.clone()).collect(),
            total_size_bytes: bytes.len() as u64,
            created_at: structure.manifest.last_updated,
            format_version: SIDECAR_FORMAT_VERSION,
        };

        if let Err(e) = self.save(archive_key, &metadata).await {
            warn!("Failed to backfill sidecar for {}: {}", archive_key, e);
        }
        Ok(metadata)
    }
}
