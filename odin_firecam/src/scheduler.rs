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

//! the camera scheduler: one round-robin worker-pool cycle per call, run as a plain
//! `tokio` loop grounded on `odin_job::JobScheduler`'s sleep-until-deadline idea, generalized
//! from one-shot/repeated jobs to a fixed-cadence cycle whose worker count can change between
//! cycles (so it's hand-rolled here rather than driven through a `JobScheduler` job, which
//! assumes a fixed action per schedule). `odin_job` itself is used in `fleet.rs` instead, for
//! the day-rollover watchdog - a plain repeated job fits that one-shot synchronous check well.

use crate::errors::Result;
use crate::image_source::{FetchOutcome, FetchedImage, ImageSource, MAX_INTERVAL_SECS};
use crate::model::{Camera, CameraId, EpochSecs};
use crate::pipeline::{DetectionPipeline, FetchedFrame, PipelineOutcome};
use crate::store::Store;
use async_trait::async_trait;
use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// supplies the per-camera base map raster and lon/lat-to-pixel projection the Alert Composer
/// needs for its map render - a narrow injected dependency so the Scheduler doesn't have to
/// own map asset loading itself.
#[async_trait]
pub trait BaseMapProvider: Send + Sync {
    async fn base_map(&self, camera_id: &str) -> Option<(DynamicImage, Box<dyn Fn(f64, f64) -> (i32, i32) + Send + Sync>)>;
}

/// test/replay double: no camera has a configured base map, so every candidate stops at
/// `PipelineOutcome::ComposeFailed` rather than panicking on a missing asset.
pub struct NullBaseMapProvider;

#[async_trait]
impl BaseMapProvider for NullBaseMapProvider {
    async fn base_map(&self, _camera_id: &str) -> Option<(DynamicImage, Box<dyn Fn(f64, f64) -> (i32, i32) + Send + Sync>)> {
        None
    }
}

/// worker-pool cycles don't run faster than this even with an otherwise-idle fleet.
pub const MIN_CYCLE_SECS: u64 = 13;

/// archive rows backing `processed` images are eligible for cleanup once they're this old;
/// distinct from - and much shorter than - the Fleet Controller's once-daily deep archive gc.
pub const ARCHIVE_GC_RETENTION_SECS: i64 = 3600;

/// how many camera slots a worker's queue holds before the dispatch loop backs off - bounded so
/// a stalled worker can't let the dispatcher buffer the whole fleet in memory.
pub const WORKER_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleSummary {
    pub cameras_assigned: usize,
    pub images_fetched: usize,
    pub published: usize,
    pub dropped: usize,
    pub compose_failed: usize,
    pub errors: usize,
}

pub struct Scheduler {
    pub store: Arc<dyn Store>,
    pub image_source: Arc<dyn ImageSource>,
    pub pipeline: Arc<DetectionPipeline>,
    pub base_maps: Arc<dyn BaseMapProvider>,
    pub num_workers: usize,
    pub heartbeat_path: Option<PathBuf>,
    cycle_count: AtomicU64,
    last_fetch: Mutex<HashMap<CameraId, EpochSecs>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        image_source: Arc<dyn ImageSource>,
        pipeline: Arc<DetectionPipeline>,
        base_maps: Arc<dyn BaseMapProvider>,
        num_workers: usize,
        heartbeat_path: Option<PathBuf>,
    ) -> Self {
        Scheduler {
            store, image_source, pipeline, base_maps, num_workers: num_workers.max(1), heartbeat_path,
            cycle_count: AtomicU64::new(0), last_fetch: Mutex::new(HashMap::new()),
        }
    }

    /// the single-cycle scheduling algorithm: assign every active, non-dormant camera that is
    /// due (per `is_due`/`MAX_INTERVAL_SECS`, tracked in `last_fetch`) to a worker via the
    /// persisted `sources` round-robin counter, run the assigned workers concurrently,
    /// barrier-join them, then run archive gc and close out the cycle.
    /// `run_detection` is false in the Fleet Controller's `archive` mode: every worker still
    /// fetches and archives images, but the detection pipeline itself does not run.
    pub async fn run_cycle(&self, now: EpochSecs, run_detection: bool) -> Result<CycleSummary> {
        let cameras: Vec<Camera> = self.store.active_cameras().await?.into_iter().filter(|c| !c.dormant).collect();

        let cameras: Vec<Camera> = {
            let mut last_fetch = self.last_fetch.lock().unwrap();
            let due: Vec<Camera> = cameras.into_iter().filter(|c| is_due(last_fetch.get(&c.id).copied(), now)).collect();
            for c in &due { last_fetch.insert(c.id.clone(), now); }
            due
        };

        let mut senders = Vec::with_capacity(self.num_workers);
        let mut receivers = Vec::with_capacity(self.num_workers);
        for _ in 0..self.num_workers {
            let (tx, rx) = mpsc::channel::<Camera>(WORKER_QUEUE_CAPACITY);
            senders.push(tx);
            receivers.push(rx);
        }

        for camera in cameras.iter().cloned() {
            let counter = self.store.increment_counter("sources").await?;
            let worker_idx = (counter as usize) % self.num_workers;
            if senders[worker_idx].send(camera).await.is_err() {
                warn!("worker queue closed before dispatch completed");
            }
        }
        drop(senders);

        let mut handles = Vec::with_capacity(self.num_workers);
        for mut rx in receivers {
            let store = self.store.clone();
            let image_source = self.image_source.clone();
            let pipeline = self.pipeline.clone();
            let base_maps = self.base_maps.clone();

            handles.push(tokio::task::spawn(async move {
                        let mut summary = CycleSummary::default();
                        while let Some(camera) = rx.recv().await {
                            summary.cameras_assigned += 1;
                            process_camera(&store, image_source.as_ref(), pipeline.as_ref(), base_maps.as_ref(), &camera, now, run_detection, &mut summary).await;
                        }
                        summary
            }));
        }

        let mut total = CycleSummary::default();
        for handle in handles {
            match handle.await {
                Ok(summary) => total = merge(total, summary),
                Err(e) => { warn!("worker task panicked: {}", e); total.errors += 1; }
            }
        }

        let gc_cutoff = now.plus_secs(-ARCHIVE_GC_RETENTION_SECS);
        if let Err(e) = self.image_source.archive_gc(self.store.as_ref(), gc_cutoff).await {
            warn!("archive gc failed: {}", e);
        }

        if let Some(path) = &self.heartbeat_path {
            if let Err(e) = tokio::fs::write(path, now.0.to_string()).await {
                warn!("heartbeat touch failed: {}", e);
            }
        }

        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        if cycle % 10 == 0 {
            info!(cycle, cameras = total.cameras_assigned, fetched = total.images_fetched,
                published = total.published, dropped = total.dropped, "scheduler cycle summary");
        }

        Ok(total)
    }
}

fn merge(mut a: CycleSummary, b: CycleSummary) -> CycleSummary {
    a.cameras_assigned += b.cameras_assigned;
    a.images_fetched += b.images_fetched;
    a.published += b.published;
    a.dropped += b.dropped;
    a.compose_failed += b.compose_failed;
    a.errors += b.errors;
    a
}

async fn process_camera(
    store: &Arc<dyn Store>,
    image_source: &dyn ImageSource,
    pipeline: &DetectionPipeline,
    base_maps: &dyn BaseMapProvider,
    camera: &Camera,
    now: EpochSecs,
    run_detection: bool,
    summary: &mut CycleSummary,
) {
    match image_source.fetch(store.as_ref(), camera, now).await {
        FetchOutcome::Live(image) => {
            run_one(store, pipeline, base_maps, camera, image, now, run_detection, summary).await;
        }
        FetchOutcome::PtzBatch(images) => {
            for image in images {
                let heading = image.heading;
                let timestamp = image.timestamp;
                run_one(store, pipeline, base_maps, camera, image, now, run_detection, summary).await;
                if let Err(e) = store.mark_image_processed(&camera.id, heading, timestamp).await {
                    warn!(camera_id = %camera.id, "failed to mark PTZ image processed: {}", e);
                }
            }
        }
        FetchOutcome::Unchanged => {}
        FetchOutcome::Error(e) => {
            warn!(camera_id = %camera.id, "image fetch failed: {}", e);
            summary.errors += 1;
        }
    }
}

/// used by the scheduler to keep a per-camera last-seen timestamp so a stuck camera doesn't
/// monopolize a worker queue slot faster than `MAX_INTERVAL_SECS` allows it to be retried.
pub fn is_due(last_fetch: Option<EpochSecs>, now: EpochSecs) -> bool {
    match last_fetch {
        Some(last) => now.minus(last) >= MAX_INTERVAL_SECS,
        None => true,
    }
}

async fn run_one(
    store: &Arc<dyn Store>,
    pipeline: &DetectionPipeline,
    base_maps: &dyn BaseMapProvider,
    camera: &Camera,
    image: FetchedImage,
    now: EpochSecs,
    run_detection: bool,
    summary: &mut CycleSummary,
) {
    summary.images_fetched += 1;

    let archive_row = crate::model::ArchiveImage {
        camera_id: camera.id.clone(),
        heading: image.heading,
        timestamp: image.timestamp,
        image_path: image.image_path.to_string_lossy().to_string(),
        fov: image.fov,
        processed: false,
    };
    if let Err(e) = store.insert_archive_image(&archive_row).await {
        warn!(camera_id = %camera.id, "failed to record archive image: {}", e);
    }

    if !run_detection {
        // archive mode: fetch and archive only, the Detection Pipeline does not run.
        if let Err(e) = store.mark_image_processed(&camera.id, image.heading, image.timestamp).await {
            warn!(camera_id = %camera.id, "failed to mark image processed: {}", e);
        }
        return;
    }

    let bytes = match tokio::fs::read(&image.image_path).await {
        Ok(b) => b,
        Err(e) => { warn!(camera_id = %camera.id, "failed to read fetched image: {}", e); summary.errors += 1; return; }
    };
    let decoded = match image::load_from_memory(&bytes) {
        Ok(d) => d,
        Err(e) => { warn!(camera_id = %camera.id, "failed to decode fetched image: {}", e); summary.errors += 1; return; }
    };

    let img_width = decoded.width();
    let (base_map, to_pixel) = match base_maps.base_map(&camera.id).await {
        Some((m, p)) => (Some(m), Some(p)),
        None => (None, None),
    };

    let frame = FetchedFrame {
        camera,
        heading: image.heading,
        timestamp: image.timestamp,
        image: decoded,
        image_path: image.image_path.to_string_lossy().to_string(),
        roi: None,
        fov: image.fov,
        img_width,
        base_map: base_map.as_ref(),
        to_pixel,
    };

    match pipeline.process_image(frame, None, Vec::new()).await {
        Ok(PipelineOutcome::Published {.. }) => summary.published += 1,
        Ok(PipelineOutcome::Dropped { stage, reason }) => {
            summary.dropped += 1;
            info!(camera_id = %camera.id, ?stage, reason, "candidate dropped");
        }
        Ok(PipelineOutcome::ComposeFailed { reason }) => {
            summary.compose_failed += 1;
            warn!(camera_id = %camera.id, reason, "alert composition failed");
        }
        Err(e) => {
            summary.errors += 1;
            warn!(camera_id = %camera.id, "pipeline error: {}", e);
        }
    }

    if let Err(e) = store.mark_image_processed(&camera.id, image.heading, image.timestamp).await {
        warn!(camera_id = %camera.id, "failed to mark image processed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::LocalBlobStore;
    use crate::composer::AlertComposer;
    use crate::model::{Alert, ArchiveImage, CameraType, Detection, IgnoredView, Probable, Score, WeatherObservation};
    use crate::notify::NotificationBus;
    use crate::pipeline::GeometryContext;
    use crate::policy::DetectNever;
    use crate::weather::{LinearWeatherScorer, WeatherProvider};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct CountingStore {
        counters: StdMutex<HashMap<String, u64>>,
        cameras: Vec<Camera>,
    }

    impl CountingStore {
        fn new(cameras: Vec<Camera>) -> Self { CountingStore { counters: StdMutex::new(HashMap::new()), cameras } }
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn active_cameras(&self) -> Result<Vec<Camera>> { Ok(self.cameras.clone()) }
        async fn camera(&self, id: &str) -> Result<Option<Camera>> { Ok(self.cameras.iter().find(|c| c.id == id).cloned()) }
        async fn upsert_camera(&self, _camera: &Camera) -> Result<()> { Ok(()) }
        async fn increment_counter(&self, group: &str) -> Result<u64> {
            let mut counters = self.counters.lock().unwrap();
            let v = counters.entry(group.to_string()).or_insert(0);
            let pre = *v;
            *v += 1;
            Ok(pre)
        }
        async fn insert_archive_image(&self, _i: &ArchiveImage) -> Result<()> { Ok(()) }
        async fn mark_image_processed(&self, _c: &str, _h: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn unprocessed_images(&self, _c: &str) -> Result<Vec<ArchiveImage>> { Ok(vec![]) }
        async fn delete_archive_images_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(0) }
        async fn insert_scores(&self, _s: &[Score]) -> Result<()> { Ok(()) }
        async fn scores_in_window(&self, _c: &str, _h: f64, _s: u32, _w: u32, _now: EpochSecs) -> Result<Vec<Score>> { Ok(vec![]) }
        async fn delete_scores_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(0) }
        async fn insert_probable(&self, _p: &Probable) -> Result<()> { Ok(()) }
        async fn recent_probable(&self, _c: &str, _h: f64, _s: EpochSecs) -> Result<Option<Probable>> { Ok(None) }
        async fn insert_detection(&self, _d: &Detection) -> Result<()> { Ok(()) }
        async fn recent_detections(&self, _s: EpochSecs) -> Result<Vec<Detection>> { Ok(vec![]) }
        async fn insert_alert(&self, _a: &Alert) -> Result<()> { Ok(()) }
        async fn ignored_views(&self, _c: &str) -> Result<Vec<IgnoredView>> { Ok(vec![]) }
        async fn increment_ignore_counter(&self, _c: &str, _hc: f64, _aw: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn weather_cache_get(&self, _c: &str, _m: i64) -> Result<Option<(WeatherObservation, WeatherObservation)>> { Ok(None) }
        async fn weather_cache_put(&self, _c: &str, _m: i64, _ce: &WeatherObservation, _ca: &WeatherObservation) -> Result<()> { Ok(()) }
        async fn daily_counts(&self, _since: EpochSecs, _until: EpochSecs) -> Result<crate::model::DailyStats> { Ok(crate::model::DailyStats::default()) }
        async fn insert_daily_stats(&self, _day: &str, _stats: &crate::model::DailyStats) -> Result<()> { Ok(()) }
    }

    struct NoImages;

    #[async_trait]
    impl ImageSource for NoImages {
        async fn fetch(&self, _store: &dyn Store, _camera: &Camera, _now: EpochSecs) -> FetchOutcome { FetchOutcome::Unchanged }
        async fn archive_gc(&self, _store: &dyn Store, _cutoff: EpochSecs) -> Result<u64> { Ok(0) }
    }

    struct FixedWeather;

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn observation_at(&self, _lat: f64, _lon: f64, _at: EpochSecs) -> Result<WeatherObservation> {
            Ok(WeatherObservation { temp_f: 70.0, dew_point_f: 40.0, humidity_pct: 20.0, precip_in: 0.0, windspeed_mph: 5.0, wind_dir_deg: 180.0, pressure_mb: 1013.0, visibility_mi: 10.0, cloud_cover_pct: 10.0 })
        }
    }

    fn sample_cameras(n: usize) -> Vec<Camera> {
        (0..n).map(|i| Camera {
                id: format!("cam-{}", i), url: format!("http://example/{}.jpg", i), camera_type: CameraType::Fixed,
                heading: Some(0.0), fov: Some(110.0), latitude: 34.0, longitude: -118.0,
                dormant: false, is_prototype: false, recognized_views: None,
        }).collect()
    }

    fn flat_land() -> crate::model::Polygon {
        use geo::{Coord, LineString};
        crate::model::Polygon::new(LineString::new(vec![
                    Coord { x: -120.0, y: 30.0 }, Coord { x: -116.0, y: 30.0 },
                    Coord { x: -116.0, y: 38.0 }, Coord { x: -120.0, y: 38.0 }, Coord { x: -120.0, y: 30.0 },
            ]), vec![])
    }

    fn test_pipeline(store: Arc<dyn Store>) -> Arc<DetectionPipeline> {
        let composer = AlertComposer::new(
            Box::new(LocalBlobStore::new(std::env::temp_dir().join("odin_firecam_scheduler_test"))),
            Box::new(FixedWeather),
            Box::new(LinearWeatherScorer::default()),
        );
        Arc::new(DetectionPipeline {
                store,
                policy: Arc::new(DetectNever),
                composer,
                notify: NotificationBus::new(),
                geometry: GeometryContext { coastline: flat_land() },
                weather_threshold: 0.25,
                model_id: "test-model".into(),
                stateful: true,
                check_shifts: false,
        })
    }

    #[tokio::test]
    async fn round_robin_assignment_spreads_cameras_across_workers() {
        let cameras = sample_cameras(6);
        let store: Arc<dyn Store> = Arc::new(CountingStore::new(cameras));
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(NoImages),
            test_pipeline(store.clone()),
            Arc::new(NullBaseMapProvider),
            3,
            None,
        );

        let summary = scheduler.run_cycle(EpochSecs(1_700_000_000), true).await.unwrap();
        assert_eq!(summary.cameras_assigned, 6);
        assert_eq!(summary.images_fetched, 0);
    }

    #[tokio::test]
    async fn dormant_cameras_are_never_assigned() {
        let mut cameras = sample_cameras(2);
        cameras[1].dormant = true;
        let store: Arc<dyn Store> = Arc::new(CountingStore::new(cameras));
        let scheduler = Scheduler::new(store.clone(), Arc::new(NoImages), test_pipeline(store.clone()), Arc::new(NullBaseMapProvider), 2, None);

        let summary = scheduler.run_cycle(EpochSecs(0), true).await.unwrap();
        assert_eq!(summary.cameras_assigned, 1);
    }

    #[tokio::test]
    async fn a_camera_fetched_this_cycle_is_skipped_until_max_interval_elapses() {
        let cameras = sample_cameras(1);
        let store: Arc<dyn Store> = Arc::new(CountingStore::new(cameras));
        let scheduler = Scheduler::new(store.clone(), Arc::new(NoImages), test_pipeline(store.clone()), Arc::new(NullBaseMapProvider), 1, None);

        let first = scheduler.run_cycle(EpochSecs(0), true).await.unwrap();
        assert_eq!(first.cameras_assigned, 1);

        let too_soon = scheduler.run_cycle(EpochSecs(MAX_INTERVAL_SECS - 1), true).await.unwrap();
        assert_eq!(too_soon.cameras_assigned, 0);

        let due_again = scheduler.run_cycle(EpochSecs(MAX_INTERVAL_SECS), true).await.unwrap();
        assert_eq!(due_again.cameras_assigned, 1);
    }

    #[test]
    fn due_check_matches_max_interval() {
        assert!(is_due(None, EpochSecs(0)));
        assert!(!is_due(Some(EpochSecs(0)), EpochSecs(MAX_INTERVAL_SECS - 1)));
        assert!(is_due(Some(EpochSecs(0)), EpochSecs(MAX_INTERVAL_SECS)));
    }
}
