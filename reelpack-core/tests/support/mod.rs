#![allow(dead_code)]
//! Shared test support: in-memory object store and fixtures.
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reelpack_core::catalog::CatalogService;
use reelpack_core::cloud_storage::{ObjectStore, ObjectStoreError, RemoteObject};
use reelpack_core::ingest::{MediaProbe, ProbeError, ProbeOutcome};

pub const TEST_BUCKET: &str = "test-bucket";
pub const VIDEO_PREFIX: &str = "videos/";
pub const THUMBNAIL_PREFIX: &str = "thumbnails/";
pub const PACKAGE_PREFIX: &str = "playlists/";

/// Initialize tracing for tests
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_line_number(true)
        .with_target(false)
        .try_init();
}

struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    last_modified: chrono::DateTime<Utc>,
}

/// In-memory stand-in for the remote store.
///
/// Counts get/list calls per key so tests can assert how many downloads an
/// operation performed, and can be told to fail deletes for specific keys.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    get_counts: Mutex<HashMap<String, usize>>,
    list_calls: AtomicUsize,
    list_delay: Mutex<Option<Duration>>,
    /// key -> remaining failures (u32::MAX means fail forever)
    fail_deletes: Mutex<HashMap<String, u32>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_count(&self, key: &str) -> usize {
        self.get_counts.lock().get(key).copied().unwrap_or(0)
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock() = Some(delay);
    }

    /// Make every delete of `key` fail.
    pub fn fail_delete(&self, key: &str) {
        self.fail_deletes.lock().insert(key.to_string(), u32::MAX);
    }

    /// Make the next `times` deletes of `key` fail, then succeed.
    pub fn fail_delete_times(&self, key: &str, times: u32) {
        self.fail_deletes.lock().insert(key.to_string(), times);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    /// Remove an object out-of-band (no failure injection), simulating a
    /// change made by another writer.
    pub fn delete_object(&self, key: &str) {
        self.objects.lock().remove(key);
    }

    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        *self.get_counts.lock().entry(key.to_string()).or_insert(0) += 1;
        self.objects
            .lock()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        {
            let mut failures = self.fail_deletes.lock();
            if let Some(remaining) = failures.get_mut(key) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    return Err(ObjectStoreError::Transport(format!(
                        "Injected delete failure for {key}"
                    )));
                }
            }
        }
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        max_keys: Option<i32>,
    ) -> Result<Vec<RemoteObject>, ObjectStoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let objects = self.objects.lock();
        let mut listed: Vec<RemoteObject> = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| RemoteObject {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: o.last_modified,
                etag: None,
            })
            .collect();
        if let Some(max) = max_keys {
            listed.truncate(max as usize);
        }
        Ok(listed)
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.objects.lock().contains_key(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{TEST_BUCKET}/{key}")
    }
}

/// Seed a video object under the video prefix.
pub async fn seed_video(store: &MemoryObjectStore, filename: &str, data: &[u8]) {
    store
        .put(
            &format!("{VIDEO_PREFIX}{filename}"),
            data,
            "video/mp4",
            HashMap::new(),
        )
        .await
        .expect("seed video");
}

pub async fn open_catalog(store: Arc<MemoryObjectStore>, data_dir: &Path) -> CatalogService {
    let store: Arc<dyn ObjectStore> = store;
    CatalogService::open(store, TEST_BUCKET, VIDEO_PREFIX, THUMBNAIL_PREFIX, data_dir)
        .await
        .expect("open catalog")
}

/// Probe stub with a fixed duration and a canned thumbnail.
pub struct StubProbe {
    pub duration_seconds: u64,
}

#[async_trait]
impl MediaProbe for StubProbe {
    async fn probe(&self, _filename: &str, _data: &[u8]) -> Result<ProbeOutcome, ProbeError> {
        Ok(ProbeOutcome {
            duration_seconds: self.duration_seconds,
            resolution: Some("1920x1080".to_string()),
            thumbnail_jpeg: Some(vec![0xFF, 0xD8, 0xFF, 0xD9]),
        })
    }
}
