/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use odin_firecam::model::{ArchiveImage, BBox, Camera, CameraType, EpochSecs, Score};
use odin_firecam::store::{SqlxStore, Store};

fn flat_triangle() -> odin_firecam::model::Polygon {
    use geo::{Coord, LineString};
    odin_firecam::model::Polygon::new(LineString::new(vec![
        Coord { x: -122.3, y: 37.8 }, Coord { x: -122.0, y: 38.0 },
        Coord { x: -121.9, y: 37.7 }, Coord { x: -122.3, y: 37.8 },
    ]), vec![])
}

fn scratch_db(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("odin_firecam_test_{}_{}.sqlite", name, std::process::id()))
}

fn sample_camera(id: &str) -> Camera {
    Camera {
        id: id.into(),
        url: format!("http://example/{id}.jpg"),
        camera_type: CameraType::Fixed,
        heading: Some(45.0),
        fov: Some(90.0),
        latitude: 37.8,
        longitude: -122.3,
        dormant: false,
        is_prototype: false,
        recognized_views: None,
    }
}

#[tokio::test]
async fn upsert_camera_round_trips_and_updates() {
    let path = scratch_db("camera");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    let camera = sample_camera("cam-a");
    store.upsert_camera(&camera).await.unwrap();

    let fetched = store.camera("cam-a").await.unwrap().expect("camera should exist");
    assert_eq!(fetched.url, "http://example/cam-a.jpg");
    assert_eq!(fetched.heading, Some(45.0));

    let active = store.active_cameras().await.unwrap();
    assert_eq!(active.len(), 1);

    // upsert again with a changed field - should update in place, not duplicate.
    let mut moved = camera.clone();
    moved.heading = Some(90.0);
    store.upsert_camera(&moved).await.unwrap();

    let active = store.active_cameras().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].heading, Some(90.0));

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn dormant_cameras_are_excluded_from_active_cameras() {
    let path = scratch_db("dormant");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    let mut dormant = sample_camera("cam-dormant");
    dormant.dormant = true;
    store.upsert_camera(&dormant).await.unwrap();
    store.upsert_camera(&sample_camera("cam-live")).await.unwrap();

    let active = store.active_cameras().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "cam-live");

    // dormant cameras are still addressable by id, just not in the active roster.
    assert!(store.camera("cam-dormant").await.unwrap().is_some());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn increment_counter_advances_monotonically_from_zero() {
    let path = scratch_db("counter");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    assert_eq!(store.increment_counter("detect-group").await.unwrap(), 0);
    assert_eq!(store.increment_counter("detect-group").await.unwrap(), 1);
    assert_eq!(store.increment_counter("detect-group").await.unwrap(), 2);

    // a distinct counter name starts its own sequence from zero.
    assert_eq!(store.increment_counter("archive-group").await.unwrap(), 0);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn archive_image_lifecycle_tracks_processed_flag() {
    let path = scratch_db("archive");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    let image = ArchiveImage {
        camera_id: "cam-a".into(),
        heading: 0.0,
        timestamp: EpochSecs(1_700_000_000),
        image_path: "/archive/cam-a/0.jpg".into(),
        fov: 90.0,
        processed: false,
    };
    store.insert_archive_image(&image).await.unwrap();

    let unprocessed = store.unprocessed_images("cam-a").await.unwrap();
    assert_eq!(unprocessed.len(), 1);
    assert!(!unprocessed[0].processed);

    store.mark_image_processed("cam-a", 0.0, EpochSecs(1_700_000_000)).await.unwrap();
    let unprocessed = store.unprocessed_images("cam-a").await.unwrap();
    assert!(unprocessed.is_empty());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn scores_in_window_wraps_around_midnight() {
    let path = scratch_db("scores");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    // one score a few seconds before midnight, one a few seconds after - both should be
    // visible to a query centered near midnight with a small half-width.
    let before_midnight = Score {
        camera_id: "cam-a".into(),
        heading: 0.0,
        timestamp: EpochSecs(1_700_000_000),
        bbox: BBox { min_x: 0, min_y: 0, max_x: 10, max_y: 10 },
        score: 0.9,
        seconds_in_day: 86_390,
        model_id: "test-model".into(),
    };
    let after_midnight = Score { seconds_in_day: 10, ..before_midnight.clone() };
    store.insert_scores(&[before_midnight, after_midnight]).await.unwrap();

    let now = EpochSecs(1_700_000_000 + 50_000);
    let hits = store.scores_in_window("cam-a", 0.0, 0, 30, now).await.unwrap();
    assert_eq!(hits.len(), 2);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn probable_dedup_finds_recent_but_not_stale_rows() {
    let path = scratch_db("probable");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    let probable = odin_firecam::model::Probable {
        camera_id: "cam-a".into(),
        heading: 0.0,
        timestamp: EpochSecs(1_700_000_000),
        bbox: BBox { min_x: 0, min_y: 0, max_x: 10, max_y: 10 },
        score: 0.8,
        adj_score: 0.8,
        image_path: String::new(),
        model_id: "test-model".into(),
    };
    store.insert_probable(&probable).await.unwrap();

    let found = store.recent_probable("cam-a", 0.0, EpochSecs(1_699_999_000)).await.unwrap();
    assert!(found.is_some());

    let not_found = store.recent_probable("cam-a", 0.0, EpochSecs(1_700_000_001)).await.unwrap();
    assert!(not_found.is_none());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn archive_gc_skips_images_still_referenced_by_a_probable() {
    let path = scratch_db("archive_gc");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    let referenced = ArchiveImage {
        camera_id: "cam-a".into(),
        heading: 0.0,
        timestamp: EpochSecs(1_700_000_000),
        image_path: "/archive/cam-a/referenced.jpg".into(),
        fov: 90.0,
        processed: false,
    };
    let unreferenced = ArchiveImage {
        image_path: "/archive/cam-a/unreferenced.jpg".into(),
        heading: 1.0,
        ..referenced.clone()
    };
    store.insert_archive_image(&referenced).await.unwrap();
    store.insert_archive_image(&unreferenced).await.unwrap();
    store.mark_image_processed("cam-a", 0.0, EpochSecs(1_700_000_000)).await.unwrap();
    store.mark_image_processed("cam-a", 1.0, EpochSecs(1_700_000_000)).await.unwrap();

    store.insert_probable(&odin_firecam::model::Probable {
        camera_id: "cam-a".into(),
        heading: 0.0,
        timestamp: EpochSecs(1_700_000_000),
        bbox: BBox { min_x: 0, min_y: 0, max_x: 10, max_y: 10 },
        score: 0.8,
        adj_score: 0.8,
        image_path: referenced.image_path.clone(),
        model_id: "test-model".into(),
    }).await.unwrap();

    let deleted = store.delete_archive_images_older_than(EpochSecs(1_700_000_001)).await.unwrap();
    assert_eq!(deleted, 1, "only the unreferenced row should be swept");

    // running the sweep again finds nothing left to delete: the referenced row is
    // permanently protected while its probable exists, not just skipped once.
    let deleted_again = store.delete_archive_images_older_than(EpochSecs(1_700_000_001)).await.unwrap();
    assert_eq!(deleted_again, 0);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn alert_insert_persists_polygon_and_counts_toward_daily_stats() {
    let path = scratch_db("alert");
    let _ = tokio::fs::remove_file(&path).await;
    let store = SqlxStore::open(&path, true).await.unwrap();

    let polygon = flat_triangle();
    store.insert_detection(&odin_firecam::model::Detection {
        camera_id: "cam-a".into(),
        heading: 0.0,
        timestamp: EpochSecs(1_700_000_000),
        polygon: polygon.clone(),
        source_polygons: vec![polygon.clone()],
        weather_score: 0.6,
        video_uri: "https://example/video.mp4".into(),
        annotated_image_uri: "https://example/still.jpg".into(),
        map_uri: "https://example/map.jpg".into(),
        adj_score: 0.5,
    }).await.unwrap();

    store.insert_alert(&odin_firecam::model::Alert {
        camera_id: "cam-a".into(),
        timestamp: EpochSecs(1_700_000_000),
        adj_score: 0.5,
        weather_score: 0.6,
        annotated_url: "https://example/still.jpg".into(),
        cropped_url: "https://example/video.mp4".into(),
        map_url: "https://example/map.jpg".into(),
        polygon,
        is_proto: false,
    }).await.unwrap();

    let stats = store.daily_counts(EpochSecs(1_699_999_000), EpochSecs(1_700_000_001)).await.unwrap();
    assert_eq!(stats.detections, 1);
    assert_eq!(stats.alerts, 1);

    let _ = tokio::fs::remove_file(&path).await;
}
