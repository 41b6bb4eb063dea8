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

//! the long-running detection/archive binary. Loads the fleet roster and
//! thresholds from `local/config/*.ron`, wires every external collaborator behind its trait,
//! and runs the scheduler cycle loop under a Fleet Controller that exits with status 1 on
//! calendar-day rollover so a process supervisor restarts it with clean per-day state. Never
//! returns 0.

use clap::Parser;
use odin_firecam::blob::LocalBlobStore;
#[cfg(feature = "s3")]
use odin_firecam::blob::S3BlobStore;
use odin_firecam::classifier::HttpClassifier;
use odin_firecam::composer::AlertComposer;
use odin_firecam::config::{self, BlobConfig, FirecamConfig, NotifyConfig, StoreConfig, WeatherConfig};
use odin_firecam::fleet::FleetController;
use odin_firecam::image_source::HttpImageSource;
use odin_firecam::logging::init_tracing;
use odin_firecam::model::{Camera, CameraType, EpochSecs};
use odin_firecam::notify::{NotificationBus, WebhookNotifier};
use odin_firecam::orchestrator::{ConfiguredOrchestrator, HttpOrchestrator, LoggingOrchestrator};
use odin_firecam::pipeline::{DetectionPipeline, GeometryContext};
use odin_firecam::policy::InceptionV3AndHistoricalThreshold;
use odin_firecam::scheduler::{NullBaseMapProvider, Scheduler};
use odin_firecam::store::{SqlxStore, Store};
use odin_firecam::weather::{CachedWeatherProvider, HttpWeatherProvider, LinearWeatherScorer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// a wildfire-detection cycle runner: fetches fleet imagery, classifies and filters it
/// against historical scores, qualifies candidates by viewshed geometry and weather, and
/// publishes alerts.
#[derive(Parser, Debug)]
#[command(name = "firecam_detector")]
struct Cli {
    /// directory raw fetched/archived images are written under.
    #[arg(long, default_value = "./local/archive")]
    archive_dir: PathBuf,

    /// number of scheduler worker tasks per cycle.
    #[arg(long)]
    num_threads: Option<usize>,

    /// only run cameras of this type this process instance ("fixed" or "ptz").
    #[arg(long)]
    restrict_type: Option<String>,

    /// path to touch once per cycle as a liveness signal for external monitoring.
    #[arg(long)]
    heartbeat: Option<PathBuf>,

    /// skip Score persistence (the historical filter always passes) - diagnostic/replay use.
    #[arg(long, default_value_t = false)]
    no_state: bool,

    /// unused by the long-lived binary; accepted so the two binaries share one flag set.
    #[arg(long)]
    start_time: Option<i64>,
    #[arg(long)]
    end_time: Option<i64>,
    #[arg(long)]
    limit_images: Option<u64>,
    #[arg(long)]
    random_seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let fleet_config: FirecamConfig = config::config_for("firecam")?;
    let store_config: StoreConfig = config::config_for("firecam_store")?;
    let weather_config: WeatherConfig = config::config_for("firecam_weather")?;
    let notify_config: NotifyConfig = config::config_for("firecam_notify")?;

    let store: Arc<dyn Store> = Arc::new(SqlxStore::open(&store_config.db_path, true).await?);
    for camera_cfg in &fleet_config.cameras {
        if let Some(restrict) = &cli.restrict_type {
            if &camera_cfg.camera_type != restrict { continue; }
        }
        store.upsert_camera(&camera_from_config(camera_cfg)).await?;
    }

    let image_source = Arc::new(HttpImageSource::new(cli.archive_dir.clone()));

    let mut notify = NotificationBus::new();
    for url in &notify_config.webhook_urls {
        notify.register(Box::new(WebhookNotifier::new(url.clone())));
    }

    let blob = blob_store_from_config(&fleet_config.blob).await?;
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

    let num_workers = cli.num_threads.unwrap_or(fleet_config.num_workers);
    let heartbeat_path = cli.heartbeat.clone().or_else(|| fleet_config.heartbeat_path.clone().map(PathBuf::from));
    let scheduler = Scheduler::new(
        store.clone(),
        image_source,
        pipeline,
        Arc::new(NullBaseMapProvider),
        num_workers,
        heartbeat_path,
    );

    let orchestrator = match &fleet_config.orchestrator_base_url {
        Some(base_url) => ConfiguredOrchestrator::Http(HttpOrchestrator::new(base_url.clone())),
        None => ConfiguredOrchestrator::Logging(LoggingOrchestrator::new()),
    };
    let fleet = FleetController::with_archive_dir(
        store.clone(),
        orchestrator,
        fleet_config.timezone,
        fleet_config.detect_start_hour,
        fleet_config.detect_end_hour,
        num_workers as u32,
        Some(cli.archive_dir.clone()),
    );
    fleet.start_watchdog()?;

    info!("firecam_detector starting, {} cameras configured", fleet_config.cameras.len());

    let mut cycle_interval = tokio::time::interval(Duration::from_secs(odin_firecam::scheduler::MIN_CYCLE_SECS));
    loop {
        cycle_interval.tick().await;
        let now = EpochSecs::now();
        let mode = fleet.tick(now).await?;

        // inactive mode just sleeps and lets the watchdog's daily post-work run.
        if mode == odin_firecam::fleet::DiurnalMode::Inactive {
            continue;
        }

        let run_detection = mode == odin_firecam::fleet::DiurnalMode::Detect;
        if let Err(e) = scheduler.run_cycle(now, run_detection).await {
            warn!("scheduler cycle failed: {}", e);
        }
    }
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

async fn blob_store_from_config(cfg: &BlobConfig) -> anyhow::Result<Box<dyn odin_firecam::blob::BlobStore>> {
    #[cfg(feature = "s3")]
    if let (Some(bucket), Some(region)) = (&cfg.bucket, &cfg.region) {
        let public_base_url = cfg.public_base_url.clone().unwrap_or_else(|| format!("https://{bucket}.s3.{region}.amazonaws.com"));
        let store = S3BlobStore::new(region.clone(), bucket.clone(), public_base_url).await?;
        return Ok(Box::new(store));
    }
    #[cfg(not(feature = "s3"))]
    let _ = (&cfg.bucket, &cfg.region);

    Ok(Box::new(LocalBlobStore::new(cfg.local_root.clone().unwrap_or_else(|| "./local/blobs".to_string()))))
}
