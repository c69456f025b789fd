//! Integration tests for catalog reconciliation, deletion, and ingestion.
mod support;

use crate::support::{
    open_catalog, seed_video, tracing_init, MemoryObjectStore, StubProbe, THUMBNAIL_PREFIX,
    VIDEO_PREFIX,
};
use reelpack_core::catalog::VideoOverride;
use reelpack_core::ingest::{IngestFile, IngestService};
use reelpack_core::util::stable_video_id;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn refresh_maps_store_objects_to_videos() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "sunset.mp4", b"0123456789").await;
    seed_video(&store, "waves.mp4", b"abc").await;
    let dir = TempDir::new().unwrap();
    let catalog = open_catalog(store.clone(), dir.path()).await;

    let videos = catalog.refresh().await.unwrap();
    assert_eq!(videos.len(), 2);

    let sunset = catalog
        .get(&stable_video_id("videos/sunset.mp4"))
        .expect("sunset should be cataloged");
    assert_eq!(sunset.filename, "sunset.mp4");
    assert_eq!(sunset.title, "sunset");
    assert_eq!(sunset.file_size_bytes, 10);
    assert_eq!(
        sunset.storage_ref.thumbnail_key.as_deref(),
        Some("thumbnails/sunset.jpg")
    );

    // Same listing, same ids
    let again = catalog.refresh().await.unwrap();
    assert_eq!(
        again.iter().map(|v| v.id.clone()).collect::<Vec<_>>(),
        videos.iter().map(|v| v.id.clone()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn overrides_survive_refresh_and_reopen() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "clip.mp4", b"data").await;
    let dir = TempDir::new().unwrap();
    let id = stable_video_id("videos/clip.mp4");

    {
        let catalog = open_catalog(store.clone(), dir.path()).await;
        catalog.refresh().await.unwrap();
        catalog
            .apply_override(
                &id,
                VideoOverride {
                    title: Some("Launch Day".to_string()),
                    duration_seconds: Some(95),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let video = catalog.get(&id).unwrap();
        assert_eq!(video.title, "Launch Day");
        assert_eq!(video.duration_seconds, 95);

        // A refresh rebuilds the snapshot from the store; the overlay is
        // merged back on top.
        catalog.refresh().await.unwrap();
        assert_eq!(catalog.get(&id).unwrap().title, "Launch Day");
    }

    // New service instance, same data dir: the overlay was persisted.
    let reopened = open_catalog(store.clone(), dir.path()).await;
    reopened.refresh().await.unwrap();
    let video = reopened.get(&id).unwrap();
    assert_eq!(video.title, "Launch Day");
    assert_eq!(video.duration_seconds, 95);
}

#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_coalesce_onto_one_listing() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "a.mp4", b"a").await;
    store.set_list_delay(Duration::from_millis(200));
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(open_catalog(store.clone(), dir.path()).await);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let catalog = catalog.clone();
            tokio::spawn(async move { catalog.refresh().await.unwrap() })
        })
        .collect();
    for task in tasks {
        let videos = task.await.unwrap();
        assert_eq!(videos.len(), 1);
    }

    assert_eq!(store.list_call_count(), 1, "refreshes should share one listing");
}

#[tokio::test]
async fn delete_without_force_keeps_video_when_remote_fails() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "keep.mp4", b"data").await;
    store.fail_delete("videos/keep.mp4");
    let dir = TempDir::new().unwrap();
    let catalog = open_catalog(store.clone(), dir.path()).await;
    catalog.refresh().await.unwrap();
    let id = stable_video_id("videos/keep.mp4");

    let outcome = catalog.delete(&id, false).await;
    assert!(!outcome.remote_deleted);
    assert!(!outcome.removed_locally);
    assert!(!outcome.orphaned);
    assert!(outcome.error.is_some());

    // Still visible and still remote
    assert!(catalog.get(&id).is_some());
    assert!(store.contains("videos/keep.mp4"));
    assert!(catalog.orphans().is_empty());
}

#[tokio::test]
async fn forced_delete_records_an_orphan() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "stuck.mp4", b"data").await;
    store.fail_delete("videos/stuck.mp4");
    let dir = TempDir::new().unwrap();
    let catalog = open_catalog(store.clone(), dir.path()).await;
    catalog.refresh().await.unwrap();
    let id = stable_video_id("videos/stuck.mp4");

    let outcome = catalog.delete(&id, true).await;
    assert!(!outcome.remote_deleted);
    assert!(outcome.removed_locally);
    assert!(outcome.orphaned);

    assert!(catalog.get(&id).is_none());
    let orphans = catalog.orphans();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].video.id, id);
    // The remote object is still there, awaiting manual reconciliation
    assert!(store.contains("videos/stuck.mp4"));
}

#[tokio::test(start_paused = true)]
async fn retry_delete_converges_after_transient_failures() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "flaky.mp4", b"data").await;
    // One failure for the initial delete, one for the first retry attempt.
    store.fail_delete_times("videos/flaky.mp4", 2);
    let dir = TempDir::new().unwrap();
    let catalog = open_catalog(store.clone(), dir.path()).await;
    catalog.refresh().await.unwrap();
    let id = stable_video_id("videos/flaky.mp4");

    let outcome = catalog.delete(&id, true).await;
    assert!(outcome.orphaned);

    let retry = catalog.retry_delete(&id).await;
    assert!(retry.succeeded, "retry should succeed: {:?}", retry.error);
    assert_eq!(retry.attempts, 2);

    // Final state matches a delete that succeeded outright
    assert!(catalog.get(&id).is_none());
    assert!(catalog.orphans().is_empty());
    assert!(!store.contains("videos/flaky.mp4"));
}

#[tokio::test(start_paused = true)]
async fn failed_retry_keeps_the_orphan_marker() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "wedged.mp4", b"data").await;
    store.fail_delete("videos/wedged.mp4");
    let dir = TempDir::new().unwrap();
    let catalog = open_catalog(store.clone(), dir.path()).await;
    catalog.refresh().await.unwrap();
    let id = stable_video_id("videos/wedged.mp4");

    catalog.delete(&id, true).await;
    let retry = catalog.retry_delete(&id).await;
    assert!(!retry.succeeded);
    assert_eq!(retry.attempts, 3);
    assert_eq!(catalog.orphans().len(), 1);
}

#[tokio::test]
async fn retry_delete_without_orphan_reports_zero_attempts() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    let dir = TempDir::new().unwrap();
    let catalog = open_catalog(store.clone(), dir.path()).await;

    let retry = catalog.retry_delete("nope").await;
    assert!(!retry.succeeded);
    assert_eq!(retry.attempts, 0);
}

#[tokio::test]
async fn ingest_uploads_sequentially_and_annotates_catalog() {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(open_catalog(store.clone(), dir.path()).await);
    let service = IngestService::new(
        store.clone(),
        catalog.clone(),
        Arc::new(StubProbe { duration_seconds: 42 }),
        VIDEO_PREFIX,
        THUMBNAIL_PREFIX,
    );

    let report = service
        .upload_videos(
            vec![
                IngestFile {
                    filename: "intro.mp4".to_string(),
                    data: b"intro-bytes".to_vec(),
                },
                IngestFile {
                    filename: "outro.mp4".to_string(),
                    data: b"outro-bytes".to_vec(),
                },
            ],
            None,
        )
        .await;

    assert_eq!(report.uploaded_count(), 2);
    assert!(store.contains("videos/intro.mp4"));
    assert!(store.contains("thumbnails/intro.jpg"));

    // upload_videos refreshes the catalog, and the probed duration lands in
    // the overlay.
    let video = catalog
        .get(&stable_video_id("videos/intro.mp4"))
        .expect("ingested video should be cataloged");
    assert_eq!(video.duration_seconds, 42);
    assert_eq!(video.resolution.as_deref(), Some("1920x1080"));
}
