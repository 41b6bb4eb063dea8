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

//! the detection pipeline: FETCHED -> CLASSIFIED -> FILTERED -> QUALIFIED ->
//! COMPOSED -> PUBLISHED, threaded through one `process_image` call per fetched image as an
//! explicit `PipelineStage`/`PipelineOutcome` pair rather than exception-driven control flow
//! or duck-typed detection-policy variants.

use crate::composer::{AlertComposer, ComposeRequest, FrameRole, SequenceFrame};
use crate::errors::Result;
use crate::geometry::{self, AngularInterval, RecentDetection};
use crate::model::{Alert, ArchiveImage, BBox, Camera, CameraId, Detection, EpochSecs, Polygon, Probable};
use crate::notify::NotificationBus;
use crate::policy::{DetectionPolicy, ImageSpec, PriorImageFetch};
use crate::store::Store;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{info, warn};

/// the stage the pipeline reached before either stopping or producing a terminal outcome -
/// kept even on a `Dropped` outcome so callers/tests can assert exactly where a candidate was
/// cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Fetched,
    Classified,
    Filtered,
    Qualified,
    Composed,
    Published,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Dropped { stage: PipelineStage, reason: String },
    /// reached QUALIFIED but the composer failed.
    ComposeFailed { reason: String },
    /// a Detection row was inserted unconditionally; `alert` is `Some` only when the weather
    /// gate passed and the camera isn't a prototype/PTZ camera.
    Published { detection: Detection, alert: Option<Alert> },
}

/// static inputs a single `process_image` call needs beyond what's in the Store: the land
/// mask for viewshed clipping and a way to rasterize lon/lat to the base map's pixel space
/// for the alert map render.
pub struct GeometryContext {
    pub coastline: Polygon,
}

pub struct DetectionPipeline {
    pub store: Arc<dyn Store>,
    pub policy: Arc<dyn DetectionPolicy>,
    pub composer: AlertComposer,
    pub notify: NotificationBus,
    pub geometry: GeometryContext,
    pub weather_threshold: f64,
    pub model_id: String,
    pub stateful: bool,
    pub check_shifts: bool,
}

/// everything the pipeline needs about a single fetched image to run it end to end.
pub struct FetchedFrame<'a> {
    pub camera: &'a Camera,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub image: DynamicImage,
    /// path of the raw fetched frame on disk, carried onto the `Probable` row so the
    /// archive gc's not-referenced predicate (`store.rs`'s `delete_archive_images_older_than`)
    /// can actually find it.
    pub image_path: String,
    pub roi: Option<BBox>,
    pub fov: f64,
    pub img_width: u32,
    pub base_map: Option<&'a DynamicImage>,
    pub to_pixel: Option<Box<dyn Fn(f64, f64) -> (i32, i32) + Send + Sync>>,
}

impl DetectionPipeline {
    pub async fn process_image(
        &self,
        frame: FetchedFrame<'_>,
        fetch_diff: Option<&dyn PriorImageFetch>,
        sequence: Vec<SequenceFrame>,
    ) -> Result<PipelineOutcome> {
        let camera_id: CameraId = frame.camera.id.clone();

        // FETCHED -> CLASSIFIED
        let spec = ImageSpec {
            camera_id: camera_id.clone(),
            heading: frame.heading,
            timestamp: frame.timestamp,
            image: &frame.image,
            roi: frame.roi,
            model_id: self.model_id.clone(),
        };

        let outcome = match self.policy.detect(self.store.as_ref(), &spec, self.check_shifts, fetch_diff).await {
            Ok(o) => o,
            Err(e) => return Ok(PipelineOutcome::Dropped { stage: PipelineStage::Fetched, reason: e.to_string() }),
        };

        if !self.stateful {
            // no scores recorded in stateless/replay mode.
        } else if !outcome.scores_to_record.is_empty() {
            let scores: Vec<crate::model::Score> = outcome.scores_to_record.iter().map(|s| crate::model::Score {
                    camera_id: camera_id.clone(),
                    heading: frame.heading,
                    timestamp: frame.timestamp,
                    bbox: s.bbox,
                    score: s.score,
                    seconds_in_day: frame.timestamp.seconds_in_day(),
                    model_id: self.model_id.clone(),
            }).collect();
            self.store.insert_scores(&scores).await?;
        }

        let (bbox, score, adj_score) = match outcome.promoted {
            Some(p) => p,
            None => return Ok(PipelineOutcome::Dropped { stage: PipelineStage::Classified, reason: "no tiles / filter rejected".into() }),
        };

        // CLASSIFIED -> FILTERED: record Probable, dedupe against the last hour.
        if let Some(_existing) = self.store.recent_probable(&camera_id, frame.heading, frame.timestamp.plus_secs(-crate::model::PROBABLE_DEDUP_WINDOW_SECS)).await? {
            return Ok(PipelineOutcome::Dropped { stage: PipelineStage::Filtered, reason: "deduplicated against recent probable".into() });
        }

        let probable = Probable {
            camera_id: camera_id.clone(),
            heading: frame.heading,
            timestamp: frame.timestamp,
            bbox,
            score,
            adj_score,
            image_path: frame.image_path.clone(),
            model_id: self.model_id.clone(),
        };
        self.store.insert_probable(&probable).await?;

        // FILTERED -> QUALIFIED: geometry.
        let interval: AngularInterval = geometry::heading_range(frame.fov_heading(), frame.fov, &bbox, frame.img_width);
        let triangle = geometry::viewshed_triangle(frame.camera.latitude, frame.camera.longitude, &interval);

        let on_land = match geometry::intersect_land(&triangle, &self.geometry.coastline) {
            Some(p) => p,
            None => return Ok(PipelineOutcome::Dropped { stage: PipelineStage::Filtered, reason: "viewshed triangle has no land intersection".into() }),
        };

        let ignored_views = self.store.ignored_views(&camera_id).await?;
        if let Some(view) = geometry::ignored_sector(&ignored_views, &camera_id, &interval) {
            self.store.increment_ignore_counter(&camera_id, view.heading_center, view.angular_width, frame.timestamp).await?;
            return Ok(PipelineOutcome::Dropped { stage: PipelineStage::Filtered, reason: "suppressed by ignored sector".into() });
        }

        let recent = self.store.recent_detections(frame.timestamp.plus_secs(-geometry::RECENT_DETECTION_WINDOW_SECS)).await?;
        let recent_refs = recent.iter().map(|d| RecentDetection { polygon: &d.polygon, timestamp_secs: d.timestamp.0 });
        let (confirmed_polygon, source_polygons) = match geometry::intersect_recent_detections(&on_land, frame.timestamp.0, recent_refs) {
            Some((poly, sources)) => (poly, sources),
            None => (on_land.clone(), vec![on_land.clone()]),
        };

        // QUALIFIED -> COMPOSED: crop, align, annotate, sequence, render, upload, then score weather.
        let (base_map, to_pixel) = match (frame.base_map, frame.to_pixel) {
            (Some(m), Some(p)) => (m, p),
            _ => return Ok(PipelineOutcome::ComposeFailed { reason: "no base map configured for camera".into() }),
        };

        let req = ComposeRequest {
            camera_id: &camera_id,
            timestamp: frame.timestamp,
            bbox,
            full_res_frame: &frame.image,
            sequence,
            is_ptz: frame.camera.is_ptz(),
            base_map,
            source_polygons: &source_polygons,
            confirmed_polygon: &confirmed_polygon,
            img_score: score,
            centroid_lat: centroid_lat(&confirmed_polygon, frame.camera.latitude),
            centroid_lon: centroid_lon(&confirmed_polygon, frame.camera.longitude),
            camera_lat: frame.camera.latitude,
            camera_lon: frame.camera.longitude,
            to_pixel,
        };

        let work_dir = std::env::temp_dir().join(format!("odin_firecam_compose_{}_{}", camera_id, frame.timestamp.0));
        let artifacts = match self.composer.compose(req, &work_dir).await {
            Ok(a) => a,
            Err(e) => {
                warn!(camera_id = %camera_id, "alert composer failed: {}", e);
                return Ok(PipelineOutcome::ComposeFailed { reason: e.to_string() });
            }
        };
        let _ = tokio::fs::remove_dir_all(&work_dir).await;

        // COMPOSED -> PUBLISHED: insert the Detection, gate the Alert on the weather threshold.
        let detection = Detection {
            camera_id: camera_id.clone(),
            heading: frame.heading,
            timestamp: frame.timestamp,
            polygon: confirmed_polygon.clone(),
            source_polygons,
            weather_score: artifacts.weather_score,
            video_uri: artifacts.video_uri.clone(),
            annotated_image_uri: artifacts.annotated_image_uri.clone(),
            map_uri: artifacts.map_uri.clone(),
            adj_score,
        };
        self.store.insert_detection(&detection).await?;
        info!(camera_id = %camera_id, adj_score, weather_score = artifacts.weather_score, "detection recorded");

        let alert = if artifacts.weather_score > self.weather_threshold && !frame.camera.is_prototype && !frame.camera.is_ptz() {
            let alert = Alert {
                camera_id: camera_id.clone(),
                timestamp: frame.timestamp,
                adj_score,
                weather_score: artifacts.weather_score,
                annotated_url: artifacts.annotated_image_uri,
                cropped_url: artifacts.video_uri,
                map_url: artifacts.map_uri,
                polygon: detection.polygon.clone(),
                is_proto: frame.camera.is_prototype,
            };
            self.store.insert_alert(&alert).await?;
            self.notify.publish(&alert).await;
            Some(alert)
        } else {
            None
        };

        Ok(PipelineOutcome::Published { detection, alert })
    }
}

fn centroid_lat(p: &Polygon, fallback: f64) -> f64 {
    use geo::Centroid;
    p.centroid().map(|c| c.y()).unwrap_or(fallback)
}

fn centroid_lon(p: &Polygon, fallback: f64) -> f64 {
    use geo::Centroid;
    p.centroid().map(|c| c.x()).unwrap_or(fallback)
}

impl FetchedFrame<'_> {
    /// the camera's nominal heading used as `centralHeading` in `heading_range` - PTZ cameras
    /// report their per-image heading directly, fixed cameras fall back to the configured one.
    fn fov_heading(&self) -> f64 { self.heading }
}

#[allow(dead_code)]
fn sequence_frame_roles_reference() -> Vec<FrameRole> {
    vec![FrameRole::Prior, FrameRole::Trigger, FrameRole::After]
}

#[allow(dead_code)]
fn archive_image_reference() -> Option<ArchiveImage> { None }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::LocalBlobStore;
    use crate::model::{CameraType, IgnoredView, Score, WeatherObservation};
    use crate::weather::{LinearWeatherScorer, WeatherProvider};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemStore {
        probables: Mutex<Vec<Probable>>,
        ignored: Mutex<Vec<IgnoredView>>,
        detections: Mutex<Vec<Detection>>,
    }

    impl MemStore {
        fn new() -> Self { MemStore { probables: Mutex::new(vec![]), ignored: Mutex::new(vec![]), detections: Mutex::new(vec![]) } }
    }

    #[async_trait]
    impl Store for MemStore {
        async fn active_cameras(&self) -> Result<Vec<Camera>> { Ok(vec![]) }
        async fn camera(&self, _id: &str) -> Result<Option<Camera>> { Ok(None) }
        async fn upsert_camera(&self, _camera: &Camera) -> Result<()> { Ok(()) }
        async fn increment_counter(&self, _g: &str) -> Result<u64> { Ok(0) }
        async fn insert_archive_image(&self, _i: &ArchiveImage) -> Result<()> { Ok(()) }
        async fn mark_image_processed(&self, _c: &str, _h: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn unprocessed_images(&self, _c: &str) -> Result<Vec<ArchiveImage>> { Ok(vec![]) }
        async fn delete_archive_images_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(0) }
        async fn insert_scores(&self, _s: &[Score]) -> Result<()> { Ok(()) }
        async fn scores_in_window(&self, _c: &str, _h: f64, _s: u32, _w: u32, _now: EpochSecs) -> Result<Vec<Score>> { Ok(vec![]) }
        async fn delete_scores_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(0) }
        async fn insert_probable(&self, p: &Probable) -> Result<()> { self.probables.lock().unwrap().push(p.clone()); Ok(()) }
        async fn recent_probable(&self, camera_id: &str, heading: f64, since: EpochSecs) -> Result<Option<Probable>> {
            Ok(self.probables.lock().unwrap().iter().find(|p| p.camera_id == camera_id && p.heading == heading && p.timestamp >= since).cloned())
        }
        async fn insert_detection(&self, d: &Detection) -> Result<()> { self.detections.lock().unwrap().push(d.clone()); Ok(()) }
        async fn recent_detections(&self, _s: EpochSecs) -> Result<Vec<Detection>> { Ok(vec![]) }
        async fn insert_alert(&self, _a: &Alert) -> Result<()> { Ok(()) }
        async fn ignored_views(&self, camera_id: &str) -> Result<Vec<IgnoredView>> {
            Ok(self.ignored.lock().unwrap().iter().filter(|v| v.camera_id == camera_id).cloned().collect())
        }
        async fn increment_ignore_counter(&self, _c: &str, _hc: f64, _aw: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn weather_cache_get(&self, _c: &str, _m: i64) -> Result<Option<(WeatherObservation, WeatherObservation)>> { Ok(None) }
        async fn weather_cache_put(&self, _c: &str, _m: i64, _ce: &WeatherObservation, _ca: &WeatherObservation) -> Result<()> { Ok(()) }
        async fn daily_counts(&self, _since: EpochSecs, _until: EpochSecs) -> Result<crate::model::DailyStats> { Ok(crate::model::DailyStats::default()) }
        async fn insert_daily_stats(&self, _day: &str, _stats: &crate::model::DailyStats) -> Result<()> { Ok(()) }
    }

    struct FixedWeather;

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn observation_at(&self, _lat: f64, _lon: f64, _at: EpochSecs) -> Result<WeatherObservation> {
            Ok(WeatherObservation { temp_f: 70.0, dew_point_f: 40.0, humidity_pct: 20.0, precip_in: 0.0, windspeed_mph: 5.0, wind_dir_deg: 180.0, pressure_mb: 1013.0, visibility_mi: 10.0, cloud_cover_pct: 10.0 })
        }
    }

    fn sample_camera() -> Camera {
        Camera {
            id: "cam-1".into(), url: "http://example/cam1.jpg".into(), camera_type: CameraType::Fixed,
            heading: Some(0.0), fov: Some(110.0), latitude: 34.0, longitude: -118.0,
            dormant: false, is_prototype: false, recognized_views: None,
        }
    }

    fn flat_land() -> Polygon {
        use geo::{Coord, LineString};
        Polygon::new(LineString::new(vec![
                    Coord { x: -120.0, y: 30.0 }, Coord { x: -116.0, y: 30.0 },
                    Coord { x: -116.0, y: 38.0 }, Coord { x: -120.0, y: 38.0 }, Coord { x: -120.0, y: 30.0 },
            ]), vec![])
    }

    #[tokio::test]
    async fn ignored_sector_stops_before_composition() {
        let ignored = IgnoredView { camera_id: "cam-1".into(), heading_center: 5.0, angular_width: 30.0, count_ignored: 0, update_timestamp: EpochSecs(0) };
        let mem_store = MemStore::new();
        mem_store.ignored.lock().unwrap().push(ignored);
        let store: Arc<dyn Store> = Arc::new(mem_store);

        let composer = AlertComposer::new(
            Box::new(LocalBlobStore::new(std::env::temp_dir().join("odin_firecam_pipeline_test"))),
            Box::new(FixedWeather),
            Box::new(LinearWeatherScorer::default()),
        );

        let pipeline = DetectionPipeline {
            store: store.clone(),
            policy: Arc::new(crate::policy::DetectAlways),
            composer,
            notify: NotificationBus::new(),
            geometry: GeometryContext { coastline: flat_land() },
            weather_threshold: 0.25,
            model_id: "test-model".into(),
            stateful: true,
            check_shifts: false,
        };

        let camera = sample_camera();
        let image = DynamicImage::new_rgb8(3072, 2048);
        let frame = FetchedFrame {
            camera: &camera, heading: 0.0, timestamp: EpochSecs(1_700_000_000), image,
            image_path: "/tmp/cam-1_test.jpg".into(),
            roi: None, fov: 110.0, img_width: 3072, base_map: None, to_pixel: None,
        };

        let outcome = pipeline.process_image(frame, None, vec![]).await.unwrap();
        match outcome {
            PipelineOutcome::Dropped { stage,.. } => assert_eq!(stage, PipelineStage::Filtered),
            other => panic!("expected Filtered drop, got {:?}", other),
        }
    }
}
