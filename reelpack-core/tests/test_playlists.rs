//! Integration tests for playlist editing, aggregates, and integrity.
mod support;

use crate::support::{open_catalog, seed_video, tracing_init, MemoryObjectStore};
use reelpack_core::catalog::{CatalogService, VideoOverride};
use reelpack_core::package::PackageBuilder;
use reelpack_core::playlist::PlaylistStore;
use reelpack_core::util::stable_video_id;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Three videos with known durations (10/20/30s) and sizes (4/8/16 bytes).
async fn setup() -> (Arc<MemoryObjectStore>, Arc<CatalogService>, PlaylistStore, TempDir) {
    tracing_init();
    let store = Arc::new(MemoryObjectStore::new());
    seed_video(&store, "a.mp4", &[0u8; 4]).await;
    seed_video(&store, "b.mp4", &[0u8; 8]).await;
    seed_video(&store, "c.mp4", &[0u8; 16]).await;
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(open_catalog(store.clone(), dir.path()).await);
    catalog.refresh().await.unwrap();
    for (filename, duration) in [("a.mp4", 10), ("b.mp4", 20), ("c.mp4", 30)] {
        catalog
            .apply_override(
                &vid(filename),
                VideoOverride {
                    duration_seconds: Some(duration),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    let playlists = PlaylistStore::open(catalog.clone(), dir.path()).await.unwrap();
    (store, catalog, playlists, dir)
}

fn vid(filename: &str) -> String {
    stable_video_id(&format!("videos/{filename}"))
}

#[tokio::test]
async fn add_rejects_unknown_videos_without_mutation() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Morning", None).await;

    assert!(!playlists.add_video(&playlist.id, "not-a-video", None).await);
    let playlist = playlists.get(&playlist.id).unwrap();
    assert!(playlist.video_order.is_empty());
    assert_eq!(playlist.metadata.video_count, 0);
}

#[tokio::test]
async fn aggregates_track_every_mutation() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Mix", None).await;

    assert!(playlists.add_video(&playlist.id, &vid("a.mp4"), None).await);
    assert!(playlists.add_video(&playlist.id, &vid("b.mp4"), None).await);

    let p = playlists.get(&playlist.id).unwrap();
    assert_eq!(p.metadata.video_count, 2);
    assert_eq!(p.metadata.total_duration_seconds, 30);
    assert_eq!(p.metadata.total_size_bytes, 12);

    assert!(playlists.remove_video(&playlist.id, &vid("a.mp4")).await);
    let p = playlists.get(&playlist.id).unwrap();
    assert_eq!(p.metadata.video_count, 1);
    assert_eq!(p.metadata.total_duration_seconds, 20);
    assert_eq!(p.metadata.total_size_bytes, 8);
}

#[tokio::test]
async fn duplicate_adds_are_refused() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Mix", None).await;

    assert!(playlists.add_video(&playlist.id, &vid("a.mp4"), None).await);
    assert!(!playlists.add_video(&playlist.id, &vid("a.mp4"), Some(0)).await);
    assert_eq!(playlists.get(&playlist.id).unwrap().video_order.len(), 1);
}

#[tokio::test]
async fn add_at_index_inserts_in_order() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Mix", None).await;
    playlists.add_video(&playlist.id, &vid("a.mp4"), None).await;
    playlists.add_video(&playlist.id, &vid("b.mp4"), None).await;
    // Index past the end is clamped to an append
    playlists.add_video(&playlist.id, &vid("c.mp4"), Some(99)).await;

    let order = playlists.get(&playlist.id).unwrap().video_order;
    assert_eq!(order, vec![vid("a.mp4"), vid("b.mp4"), vid("c.mp4")]);
}

#[tokio::test]
async fn reorder_splices_and_clamps() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Mix", None).await;
    for f in ["a.mp4", "b.mp4", "c.mp4"] {
        playlists.add_video(&playlist.id, &vid(f), None).await;
    }

    assert!(playlists.reorder(&playlist.id, &vid("c.mp4"), 0).await);
    let p = playlists.get(&playlist.id).unwrap();
    assert_eq!(p.video_order, vec![vid("c.mp4"), vid("a.mp4"), vid("b.mp4")]);
    // Aggregates unaffected by pure reordering
    assert_eq!(p.metadata.total_duration_seconds, 60);

    // Out-of-range index clamps to the end
    assert!(playlists.reorder(&playlist.id, &vid("c.mp4"), 999).await);
    let p = playlists.get(&playlist.id).unwrap();
    assert_eq!(p.video_order, vec![vid("a.mp4"), vid("b.mp4"), vid("c.mp4")]);
}

#[tokio::test]
async fn reorder_to_current_index_is_idempotent() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Mix", None).await;
    for f in ["a.mp4", "b.mp4", "c.mp4"] {
        playlists.add_video(&playlist.id, &vid(f), None).await;
    }
    let before = playlists.get(&playlist.id).unwrap().video_order;

    assert!(playlists.reorder(&playlist.id, &vid("b.mp4"), 1).await);
    assert_eq!(playlists.get(&playlist.id).unwrap().video_order, before);
}

#[tokio::test]
async fn move_between_playlists_is_remove_then_add() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let from = playlists.create("From", None).await;
    let to = playlists.create("To", None).await;
    playlists.add_video(&from.id, &vid("a.mp4"), None).await;
    playlists.add_video(&to.id, &vid("b.mp4"), None).await;

    assert!(
        playlists
            .move_video(Some(&from.id), &to.id, &vid("a.mp4"), Some(0))
            .await
    );
    assert!(playlists.get(&from.id).unwrap().video_order.is_empty());
    assert_eq!(
        playlists.get(&to.id).unwrap().video_order,
        vec![vid("a.mp4"), vid("b.mp4")]
    );

    // Null source behaves as a plain add
    assert!(
        playlists
            .move_video(None, &from.id, &vid("c.mp4"), None)
            .await
    );
    assert_eq!(playlists.get(&from.id).unwrap().video_order, vec![vid("c.mp4")]);
}

#[tokio::test]
async fn move_does_not_roll_back_when_add_fails() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let from = playlists.create("From", None).await;
    playlists.add_video(&from.id, &vid("a.mp4"), None).await;

    // Target playlist does not exist: the remove has already happened and is
    // not rolled back.
    assert!(
        !playlists
            .move_video(Some(&from.id), "missing-playlist", &vid("a.mp4"), None)
            .await
    );
    assert!(playlists.get(&from.id).unwrap().video_order.is_empty());
}

#[tokio::test]
async fn integrity_report_partitions_the_order_exactly() {
    let (_store, catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Mix", None).await;
    for f in ["a.mp4", "b.mp4"] {
        playlists.add_video(&playlist.id, &vid(f), None).await;
    }
    // Simulate a reference that stopped resolving after the edit
    let mut playlist = playlists.get(&playlist.id).unwrap();
    playlist.video_order.push("gone".to_string());

    let videos = catalog.videos();
    let report = PackageBuilder::validate_integrity(&playlist, &videos);
    assert!(!report.valid);
    assert_eq!(report.valid_ids, vec![vid("a.mp4"), vid("b.mp4")]);
    assert_eq!(report.missing_ids, vec!["gone".to_string()]);

    // valid ∪ missing == order, and the partitions are disjoint
    let union: BTreeSet<_> = report
        .valid_ids
        .iter()
        .chain(report.missing_ids.iter())
        .cloned()
        .collect();
    let order: BTreeSet<_> = playlist.video_order.iter().cloned().collect();
    assert_eq!(union, order);
    assert!(report.valid_ids.iter().all(|id| !report.missing_ids.contains(id)));
}

#[tokio::test]
async fn playlists_persist_across_reopen() {
    let (_store, catalog, playlists, dir) = setup().await;
    let playlist = playlists.create("Keeper", Some("survives restarts")).await;
    playlists.add_video(&playlist.id, &vid("a.mp4"), None).await;
    drop(playlists);

    let reopened = PlaylistStore::open(catalog, dir.path()).await.unwrap();
    let loaded = reopened.get(&playlist.id).expect("playlist should be persisted");
    assert_eq!(loaded.name, "Keeper");
    assert_eq!(loaded.description, "survives restarts");
    assert_eq!(loaded.video_order, vec![vid("a.mp4")]);
    assert_eq!(loaded.metadata.video_count, 1);
}

#[tokio::test]
async fn rename_and_delete() {
    let (_store, _catalog, playlists, _dir) = setup().await;
    let playlist = playlists.create("Old Name", None).await;

    assert!(playlists.rename(&playlist.id, "New Name").await);
    assert_eq!(playlists.get(&playlist.id).unwrap().name, "New Name");

    assert!(playlists.delete(&playlist.id).await);
    assert!(playlists.get(&playlist.id).is_none());
    assert!(!playlists.delete(&playlist.id).await);
}
