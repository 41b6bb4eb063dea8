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

//! the Fleet Controller: the diurnal `detect`/`archive`/`inactive` mode state
//! machine, the once-per-day idempotent post-work that runs after the inactive grace period,
//! and the calendar-day-rollover restart. The daily post-work check runs on its own cadence via
//! `odin_job::JobScheduler::schedule_repeated` - a genuine fit for "repeat a plain action on a
//! fixed interval", unlike the detection Scheduler's own per-cycle loop (see scheduler.rs).

use crate::errors::{op_failed, Result};
use crate::model::EpochSecs;
use crate::orchestrator::{GroupOrchestrator, ThrottledOrchestrator};
use crate::store::Store;
use chrono_tz::Tz;
use odin_job::JobScheduler;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// the apron either side of the detect window during which the group is kept warm rather than
/// scaled straight to zero.
pub const ARCHIVE_APRON_SECS: i64 = 10 * 60;

/// how long the fleet must have been continuously inactive before the daily post-work runs.
pub const INACTIVE_GRACE_SECS: i64 = 80 * 60;

/// cadence of the background day-rollover/post-work watchdog, independent of the detection
/// Scheduler's own worker-pool cycle cadence.
pub const WATCHDOG_INTERVAL_SECS: u64 = 5 * 60;

pub const DETECT_GROUP_NAME: &str = "detect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiurnalMode {
    Detect,
    Archive,
    Inactive,
}

/// pure function version of the mode decision so it's testable without a clock or a Store.
/// `detect_start_hour`/`detect_end_hour` are local-time hours in `[0,24)`; a window that wraps
/// past midnight (`start > end`) is supported for the detect test itself, but the inactive
/// grace-period calculation below assumes the single daily inactive stretch starts right after
/// `detect_end_hour + apron`, which only has one meaning per day regardless of wraparound.
pub fn mode_for(now: EpochSecs, tz: Tz, detect_start_hour: u32, detect_end_hour: u32) -> DiurnalMode {
    let sid = now.seconds_in_day_tz(tz) as i64;
    let start = detect_start_hour as i64 * 3600;
    let end = detect_end_hour as i64 * 3600;

    let in_detect = if start <= end { sid >= start && sid < end } else { sid >= start || sid < end };
    if in_detect {
        return DiurnalMode::Detect;
    }

    let near = |boundary: i64| {
        let mut delta = (sid - boundary).abs();
        delta = delta.min((sid - boundary + 86400).abs()).min((sid - boundary - 86400).abs());
        delta <= ARCHIVE_APRON_SECS
    };
    if near(start) || near(end) { DiurnalMode::Archive } else { DiurnalMode::Inactive }
}

/// target size for the orchestrator-managed detect compute group - this is the heavy
/// classifier/GPU group, distinct from the Scheduler's own lightweight fetch workers, which
/// keep running in `archive` mode regardless (`Scheduler::run_cycle`'s `run_detection` flag).
pub fn group_target(mode: DiurnalMode, detect_workers: u32) -> u32 {
    match mode {
        DiurnalMode::Detect => detect_workers,
        DiurnalMode::Archive | DiurnalMode::Inactive => 0,
    }
}

/// seconds elapsed since the single daily inactive stretch began, wrapping at the day boundary.
/// negative/zero only at the instant the stretch starts.
fn seconds_since_inactive_start(now: EpochSecs, tz: Tz, detect_end_hour: u32) -> i64 {
    let sid = now.seconds_in_day_tz(tz) as i64;
    let inactive_start = (detect_end_hour as i64 * 3600 + ARCHIVE_APRON_SECS).rem_euclid(86400);
    (sid - inactive_start).rem_euclid(86400)
}

pub struct FleetController<O: GroupOrchestrator> {
    store: Arc<dyn Store>,
    orchestrator: ThrottledOrchestrator<O>,
    tz: Tz,
    detect_start_hour: u32,
    detect_end_hour: u32,
    detect_workers: u32,
    /// the Image Source's raw-frame directory; `None` when the deploying binary owns its own
    /// archive cleanup (e.g. the replay harness, which never runs post-work at all).
    archive_dir: Option<PathBuf>,
    job_scheduler: Mutex<JobScheduler>,
}

impl<O: GroupOrchestrator + Send + Sync + 'static> FleetController<O> {
    pub fn new(store: Arc<dyn Store>, orchestrator: O, tz: Tz, detect_start_hour: u32, detect_end_hour: u32, detect_workers: u32) -> Arc<Self> {
        Self::with_archive_dir(store, orchestrator, tz, detect_start_hour, detect_end_hour, detect_workers, None)
    }

    pub fn with_archive_dir(
        store: Arc<dyn Store>, orchestrator: O, tz: Tz, detect_start_hour: u32, detect_end_hour: u32, detect_workers: u32,
        archive_dir: Option<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(FleetController {
                store,
                orchestrator: ThrottledOrchestrator::new(orchestrator),
                tz,
                detect_start_hour,
                detect_end_hour,
                detect_workers,
                archive_dir,
                job_scheduler: Mutex::new(JobScheduler::new()),
        })
    }

    /// called once per detection-scheduler cycle (or on any similarly short cadence): computes
    /// the current mode and resizes the detect group to match, rate-limited/idempotent via
    /// `ThrottledOrchestrator`.
    pub async fn tick(&self, now: EpochSecs) -> Result<DiurnalMode> {
        let mode = mode_for(now, self.tz, self.detect_start_hour, self.detect_end_hour);
        let target = group_target(mode, self.detect_workers);
        self.orchestrator.maybe_resize(DETECT_GROUP_NAME, target, now).await?;
        Ok(mode)
    }

    /// starts the background watchdog that independently checks for the inactive grace period
    /// and runs the once-daily post-work. Exits the process with status 1 once post-work
    /// completes for the day, so a supervisor restarts the binary with a clean per-day state
    /// (the calendar-day-rollover behavior).
    pub fn start_watchdog(self: &Arc<Self>) -> Result<()> {
        let mut js = self.job_scheduler.lock().unwrap();
        js.run().map_err(|e| op_failed(e))?;

        let this = self.clone();
        js.schedule_repeated(Duration::from_secs(0), Duration::from_secs(WATCHDOG_INTERVAL_SECS), move |_ctx| {
                let this = this.clone();
                tokio::spawn(async move {
                        match this.maybe_run_daily_post_work(EpochSecs::now()).await {
                            Ok(true) => {
                                info!("daily post-work complete, exiting for calendar-day rollover");
                                std::process::exit(1);
                            }
                            Ok(false) => {}
                            Err(e) => warn!("daily post-work check failed: {}", e),
                        }
                });
        }).map_err(|e| op_failed(e))?;

        Ok(())
    }

    /// runs the once-per-day post-work if the fleet has been inactive long enough and no other
    /// process instance has already claimed today, per the Store's optimistic counter. Returns `true` iff this call actually ran post-work.
    pub async fn maybe_run_daily_post_work(&self, now: EpochSecs) -> Result<bool> {
        let mode = mode_for(now, self.tz, self.detect_start_hour, self.detect_end_hour);
        if mode != DiurnalMode::Inactive { return Ok(false); }
        if seconds_since_inactive_start(now, self.tz, self.detect_end_hour) < INACTIVE_GRACE_SECS { return Ok(false); }

        let day_key = format!("post_work_{}", now.day_key_tz(self.tz));
        let claimed_before = self.store.increment_counter(&day_key).await?;
        if claimed_before > 0 { return Ok(false); }

        self.run_post_work(now).await?;
        Ok(true)
    }

    async fn run_post_work(&self, now: EpochSecs) -> Result<()> {
        let day_start = now.plus_secs(-(now.seconds_in_day_tz(self.tz) as i64));
        let day = now.day_key_tz(self.tz);
        let stats = self.store.daily_counts(day_start, now).await?;
        self.store.insert_daily_stats(&day, &stats).await?;

        let score_cutoff = now.plus_secs(-crate::model::SCORE_RETENTION_DAYS * 86400);
        let deleted_scores = self.store.delete_scores_older_than(score_cutoff).await?;

        let archive_cutoff = now.plus_secs(-3600);
        let deleted_images = self.store.delete_archive_images_older_than(archive_cutoff).await?;

        if let Some(dir) = &self.archive_dir {
            clear_archive_directory(dir).await;
        }

        info!(
            day, deleted_scores, deleted_images,
            images = stats.images, segments = stats.segments, positive_segments = stats.positive_segments,
            probables = stats.probables, detections = stats.detections, alerts = stats.alerts,
            "daily post-work complete"
        );
        Ok(())
    }
}

/// remove the archive directory's contents (not the directory itself) - best-effort, since a
/// missing/already-empty directory is not an error at this point in the day.
async fn clear_archive_directory(dir: &std::path::Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(_) => return,
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = result {
            warn!(path = %path.display(), "failed to remove archive directory entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, ArchiveImage, Camera, Detection, IgnoredView, Probable, Score, WeatherObservation};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn detect_window_is_active_between_start_and_end() {
        // 08:00-20:00 local, sample at noon
        let noon = EpochSecs(12 * 3600);
        assert_eq!(mode_for(noon, chrono_tz::UTC, 8, 20), DiurnalMode::Detect);
    }

    #[test]
    fn apron_before_detect_start_is_archive() {
        let just_before = EpochSecs(8 * 3600 - 300);
        assert_eq!(mode_for(just_before, chrono_tz::UTC, 8, 20), DiurnalMode::Archive);
    }

    #[test]
    fn deep_night_is_inactive() {
        let midnight_ish = EpochSecs(2 * 3600);
        assert_eq!(mode_for(midnight_ish, chrono_tz::UTC, 8, 20), DiurnalMode::Inactive);
    }

    #[test]
    fn inactive_grace_period_gates_post_work_timing() {
        let end_hour = 20;
        let inactive_start = EpochSecs((20 * 3600 + ARCHIVE_APRON_SECS) as i64);
        assert!(seconds_since_inactive_start(inactive_start, chrono_tz::UTC, end_hour) < INACTIVE_GRACE_SECS);

        let after_grace = inactive_start.plus_secs(INACTIVE_GRACE_SECS + 1);
        assert!(seconds_since_inactive_start(after_grace, chrono_tz::UTC, end_hour) >= INACTIVE_GRACE_SECS);
    }

    struct CountingStore {
        counters: StdMutex<HashMap<String, u64>>,
        deleted_scores: StdMutex<u64>,
        deleted_images: StdMutex<u64>,
    }

    impl CountingStore {
        fn new() -> Self { CountingStore { counters: StdMutex::new(HashMap::new()), deleted_scores: StdMutex::new(0), deleted_images: StdMutex::new(0) } }
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn active_cameras(&self) -> Result<Vec<Camera>> { Ok(vec![]) }
        async fn camera(&self, _id: &str) -> Result<Option<Camera>> { Ok(None) }
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
        async fn delete_archive_images_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(*self.deleted_images.lock().unwrap()) }
        async fn insert_scores(&self, _s: &[Score]) -> Result<()> { Ok(()) }
        async fn scores_in_window(&self, _c: &str, _h: f64, _s: u32, _w: u32, _now: EpochSecs) -> Result<Vec<Score>> { Ok(vec![]) }
        async fn delete_scores_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(*self.deleted_scores.lock().unwrap()) }
        async fn insert_probable(&self, _p: &Probable) -> Result<()> { Ok(()) }
        async fn recent_probable(&self, _c: &str, _h: f64, _s: EpochSecs) -> Result<Option<Probable>> { Ok(None) }
        async fn insert_detection(&self, _d: &Detection) -> Result<()> { Ok(()) }
        async fn recent_detections(&self, _s: EpochSecs) -> Result<Vec<Detection>> { Ok(vec![]) }
        async fn insert_alert(&self, _a: &Alert) -> Result<()> { Ok(()) }
        async fn ignored_views(&self, _c: &str) -> Result<Vec<IgnoredView>> { Ok(vec![]) }
        async fn increment_ignore_counter(&self, _c: &str, _hc: f64, _aw: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn weather_cache_get(&self, _c: &str, _m: i64) -> Result<Option<(WeatherObservation, WeatherObservation)>> { Ok(None) }
        async fn weather_cache_put(&self, _c: &str, _m: i64, _ce: &WeatherObservation, _ca: &WeatherObservation) -> Result<()> { Ok(()) }
        async fn daily_counts(&self, _since: EpochSecs, _until: EpochSecs) -> Result<crate::model::DailyStats> {
            Ok(crate::model::DailyStats { images: 7, segments: 5, positive_segments: 2, probables: 1, detections: 1, alerts: 0 })
        }
        async fn insert_daily_stats(&self, _day: &str, _stats: &crate::model::DailyStats) -> Result<()> { Ok(()) }
    }

    #[tokio::test]
    async fn daily_post_work_persists_stats_and_clears_archive_dir() {
        let store_impl = CountingStore::new();
        let store: Arc<dyn Store> = Arc::new(store_impl);

        let archive_dir = std::env::temp_dir().join(format!("odin_firecam_fleet_gc_test_{}", std::process::id()));
        tokio::fs::create_dir_all(&archive_dir).await.unwrap();
        tokio::fs::write(archive_dir.join("stale.jpg"), b"x").await.unwrap();

        let controller = FleetController::with_archive_dir(
            store, crate::orchestrator::LoggingOrchestrator::new(), chrono_tz::UTC, 8, 20, 4, Some(archive_dir.clone()),
        );

        let after_grace = EpochSecs((20 * 3600 + ARCHIVE_APRON_SECS + INACTIVE_GRACE_SECS + 1) as i64);
        assert!(controller.maybe_run_daily_post_work(after_grace).await.unwrap());

        let mut remaining = tokio::fs::read_dir(&archive_dir).await.unwrap();
        assert!(remaining.next_entry().await.unwrap().is_none(), "archive directory should be emptied");

        let _ = tokio::fs::remove_dir_all(&archive_dir).await;
    }

    #[tokio::test]
    async fn daily_post_work_runs_once_per_day() {
        let store: Arc<dyn Store> = Arc::new(CountingStore::new());
        let controller = FleetController::new(store, crate::orchestrator::LoggingOrchestrator::new(), chrono_tz::UTC, 8, 20, 4);

        let after_grace = EpochSecs((20 * 3600 + ARCHIVE_APRON_SECS + INACTIVE_GRACE_SECS + 1) as i64);
        assert!(controller.maybe_run_daily_post_work(after_grace).await.unwrap());
        assert!(!controller.maybe_run_daily_post_work(after_grace.plus_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn post_work_does_not_run_before_grace_period_elapses() {
        let store: Arc<dyn Store> = Arc::new(CountingStore::new());
        let controller = FleetController::new(store, crate::orchestrator::LoggingOrchestrator::new(), chrono_tz::UTC, 8, 20, 4);

        let just_inactive = EpochSecs((20 * 3600 + ARCHIVE_APRON_SECS + 1) as i64);
        assert!(!controller.maybe_run_daily_post_work(just_inactive).await.unwrap());
    }

    #[tokio::test]
    async fn tick_resizes_group_to_zero_when_inactive() {
        let store: Arc<dyn Store> = Arc::new(CountingStore::new());
        let controller = FleetController::new(store, crate::orchestrator::LoggingOrchestrator::new(), chrono_tz::UTC, 8, 20, 4);
        let mode = controller.tick(EpochSecs(2 * 3600)).await.unwrap();
        assert_eq!(mode, DiurnalMode::Inactive);
    }
}
