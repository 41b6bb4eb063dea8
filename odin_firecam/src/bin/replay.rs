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

//! the bounded backfill/test harness. Walks a plain directory of already-archived images named
//! per `image_source::image_file_name`'s grammar, runs each one through the same
//! `DetectionPipeline` the live binary uses, and exits 0 once the bounded window (by time
//! range and/or `--limit-images`) is exhausted - unlike `firecam_detector`, which never
//! returns.

use clap::Parser;
use odin_firecam::blob::LocalBlobStore;
use odin_firecam::classifier::HttpClassifier;
use odin_firecam::composer::AlertComposer;
use odin_firecam::config::{self, FirecamConfig, StoreConfig, WeatherConfig};
use odin_firecam::image_source::parse_image_file_name;
use odin_firecam::logging::init_tracing;
use odin_firecam::model::{Camera, CameraType, EpochSecs};
use odin_firecam::notify::{NotificationBus, SpyNotifier};
use odin_firecam::pipeline::{DetectionPipeline, FetchedFrame, GeometryContext, PipelineOutcome};
use odin_firecam::policy::InceptionV3AndHistoricalThreshold;
use odin_firecam::store::{SqlxStore, Store};
use odin_firecam::weather::{CachedWeatherProvider, HttpWeatherProvider, LinearWeatherScorer};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// replays a directory of previously archived camera frames through the detection pipeline
/// without touching any live camera or orchestrator endpoint.
#[derive(Parser, Debug)]
#[command(name = "firecam_replay")]
struct Cli {
    /// directory of `image_file_name`-shaped frames to replay.
    #[arg(long, default_value = "./local/archive")]
    archive_dir: PathBuf,

    /// bounds how many frames are decoded/classified concurrently.
    #[arg(long, default_value_t = 4)]
    num_threads: usize,

    /// only replay frames from cameras of this type ("fixed" or "ptz").
    #[arg(long)]
    restrict_type: Option<String>,

    /// path touched after every 50 processed frames.
    #[arg(long)]
    heartbeat: Option<PathBuf>,

    /// run against an in-memory store so nothing persists across runs, rather than the
    /// configured `firecam_store.ron` database.
    #[arg(long, default_value_t = false)]
    no_state: bool,

    /// only replay frames at or after this epoch-seconds timestamp.
    #[arg(long)]
    start_time: Option<i64>,
    /// only replay frames at or before this epoch-seconds timestamp.
    #[arg(long)]
    end_time: Option<i64>,
    /// stop after this many frames, chosen from the filtered set per `--random-seed`.
    #[arg(long)]
    limit_images: Option<usize>,
    /// seeds the shuffle `--limit-images` samples from, for a repeatable subset.
    #[arg(long)]
    random_seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let fleet_config: FirecamConfig = config::config_for("firecam")?;
    let weather_config: WeatherConfig = config::config_for("firecam_weather")?;

    let store: Arc<dyn Store> = if cli.no_state {
        // a uniquely-named scratch file rather than ":memory:" - sqlx's connection pool would
        // otherwise hand different workers unrelated in-memory databases.
        let scratch = std::env::temp_dir().join(format!("odin_firecam_replay_{}.sqlite", std::process::id()));
        Arc::new(SqlxStore::open(&scratch, true).await?)
    } else {
        let store_config: StoreConfig = config::config_for("firecam_store")?;
        Arc::new(SqlxStore::open(&store_config.db_path, true).await?)
    };

    for camera_cfg in &fleet_config.cameras {
        store.upsert_camera(&camera_from_config(camera_cfg)).await?;
    }

    let mut notify = NotificationBus::new();
    let spy = Arc::new(SpyNotifier::default());
    notify.register(Box::new(SpySink(spy.clone())));

    let blob = Box::new(LocalBlobStore::new("./local/replay_blobs"));
    let weather_provider = Box::new(CachedWeatherProvider::new(HttpWeatherProvider::new(weather_config.endpoint.clone())));
    let composer = AlertComposer::new(blob, weather_provider, Box::new(LinearWeatherScorer::default()));

    let classifier = HttpClassifier::new(fleet_config.classifier_endpoint.clone());
    let policy = Arc::new(InceptionV3AndHistoricalThreshold::new(classifier, !cli.no_state));

    let pipeline = Arc::new(DetectionPipeline {
            store: store.clone(),
            policy,
            composer,
            notify,
            geometry: GeometryContext { coastline: odin_firecam::assets::coastline()? },
            weather_threshold: weather_config.threshold,
            model_id: fleet_config.model_id.clone(),
            stateful: !cli.no_state,
            check_shifts: true,
    });

    let mut frames = collect_frames(&cli)?;
    if let Some(seed) = cli.random_seed {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        frames.shuffle(&mut rng);
    }
    if let Some(limit) = cli.limit_images {
        frames.truncate(limit);
    }

    info!("replaying {} frames from {}", frames.len(), cli.archive_dir.display());

    let semaphore = Arc::new(tokio::sync::Semaphore::new(cli.num_threads.max(1)));
    let mut handles = Vec::with_capacity(frames.len());
    for (path, camera_id, timestamp) in frames {
        let camera = match store.camera(&camera_id).await? {
            Some(c) => c,
            None => { warn!(camera_id = %camera_id, "no configured camera for replayed frame, skipping"); continue; }
        };
        if let Some(restrict) = &cli.restrict_type {
            let is_ptz = restrict == "ptz";
            if camera.is_ptz() != is_ptz { continue; }
        }

        let permit = semaphore.clone().acquire_owned().await?;
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    replay_one(&pipeline, &camera, timestamp, &path).await
        }));
    }

    let mut published = 0usize;
    let mut dropped = 0usize;
    let mut errors = 0usize;
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(PipelineOutcome::Published {.. })) => published += 1,
            Ok(Ok(PipelineOutcome::Dropped {.. })) | Ok(Ok(PipelineOutcome::ComposeFailed {.. })) => dropped += 1,
            Ok(Err(e)) => { errors += 1; warn!("replay frame failed: {}", e); }
            Err(e) => { errors += 1; warn!("replay task panicked: {}", e); }
        }
        if let Some(path) = &cli.heartbeat {
            if i % 50 == 0 {
                let _ = tokio::fs::write(path, i.to_string()).await;
            }
        }
    }

    info!(published, dropped, errors, notifications = spy.received.lock().unwrap().len(), "replay complete");
    Ok(())
}

async fn replay_one(
    pipeline: &DetectionPipeline,
    camera: &Camera,
    timestamp: EpochSecs,
    path: &PathBuf,
) -> odin_firecam::errors::Result<PipelineOutcome> {
    let bytes = tokio::fs::read(path).await?;
    let image = image::load_from_memory(&bytes)?;
    let img_width = image.width();
    let heading = camera.heading.unwrap_or(0.0);
    let fov = camera.fov.unwrap_or(60.0);

    let frame = FetchedFrame {
        camera,
        heading,
        timestamp,
        image,
        image_path: path.to_string_lossy().to_string(),
        roi: None,
        fov,
        img_width,
        base_map: None,
        to_pixel: None,
    };
    pipeline.process_image(frame, None, Vec::new()).await
}

fn collect_frames(cli: &Cli) -> anyhow::Result<Vec<(PathBuf, String, EpochSecs)>> {
    let mut frames = Vec::new();
    let entries = match std::fs::read_dir(&cli.archive_dir) {
        Ok(e) => e,
        Err(e) => { warn!("cannot read archive dir {}: {}", cli.archive_dir.display(), e); return Ok(frames); }
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = match name.to_str() { Some(n) => n, None => continue };
        let (camera_id, timestamp) = match parse_image_file_name(name) {
            Some(parsed) => parsed,
            None => continue,
        };
        if let Some(start) = cli.start_time { if timestamp.0 < start { continue; } }
        if let Some(end) = cli.end_time { if timestamp.0 > end { continue; } }
        frames.push((entry.path(), camera_id, timestamp));
    }
    frames.sort_by_key(|(_, _, ts)| ts.0);
    Ok(frames)
}

fn camera_from_config(cfg: &odin_firecam::config::CameraConfig) -> Camera {
    Camera {
        id: cfg.id.clone(),
        url: cfg.url.clone(),
        camera_type: if cfg.camera_type == "ptz" { CameraType::Ptz } else { CameraType::Fixed },
        heading: cfg.heading,
        fov: cfg.fov,
        latitude: cfg.latitude,
        longitude: cfg.longitude,
        dormant: cfg.dormant,
        is_prototype: cfg.is_prototype,
        recognized_views: None,
    }
}

/// adapts the `SpyNotifier` test double (`execute(&self,...)`) to the `DynDataAction`
/// callback shape `NotificationBus::register` expects.
#[derive(Debug)]
struct SpySink(Arc<SpyNotifier>);

#[async_trait::async_trait]
impl odin_action::DynDataActionTrait<odin_firecam::notify::AlertNotification> for SpySink {
    async fn execute(&self, data: odin_firecam::notify::AlertNotification) -> std::result::Result<(), odin_action::OdinActionError> {
        self.0.execute(data).await
    }
}
