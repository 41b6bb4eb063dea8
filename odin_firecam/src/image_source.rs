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

//! image acquisition. `HttpImageSource` fetches live images over HTTP using
//! `odin_common::net`'s download helpers (already a workspace dependency), keeping a
//! process-local last-seen-hash map per camera so a lost dedupe across processes is
//! harmless.

use crate::errors::Result;
use crate::model::{ArchiveImage, Camera, CameraId, EpochSecs, SENTINEL_HEADING};
use crate::store::Store;
use async_trait::async_trait;
use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// maximum age a camera's last fetch timestamp may have before the Scheduler enqueues it
/// again.
pub const MAX_INTERVAL_SECS: i64 = 60;

/// PTZ batches only draw unprocessed `ArchiveImage` rows from this recent a window.
pub const PTZ_BATCH_WINDOW_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub camera_id: CameraId,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub image_path: PathBuf,
    pub fov: f64,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Live(FetchedImage),
    PtzBatch(Vec<FetchedImage>),
    Unchanged,
    Error(String),
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// fixed cameras fetch one live frame; PTZ cameras surface their backlog through `store`
    /// instead, so both paths live behind this one trait method.
    async fn fetch(&self, store: &dyn Store, camera: &Camera, now: EpochSecs) -> FetchOutcome;

    /// deletes archive files backing `processed` rows older than `cutoff`; invoked only by
    /// the Scheduler after a worker-pool barrier join.
    async fn archive_gc(&self, store: &dyn Store, cutoff: EpochSecs) -> Result<u64>;
}

pub struct HttpImageSource {
    client: reqwest::Client,
    archive_dir: PathBuf,
    last_seen: Mutex<HashMap<CameraId, u64>>,
}

impl HttpImageSource {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        HttpImageSource {
            client: reqwest::Client::new(),
            archive_dir: archive_dir.into(),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    fn hash_bytes(bytes: &[u8]) -> u64 {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        hasher.finish()
    }

    async fn fetch_fixed(&self, camera: &Camera, now: EpochSecs) -> FetchOutcome {
        let bytes = match self.client.get(&camera.url).send().await {
            Ok(resp) => match resp.bytes().await {
                Ok(b) => b,
                Err(e) => return FetchOutcome::Error(e.to_string()),
            },
            Err(e) => return FetchOutcome::Error(e.to_string()),
        };

        let hash = Self::hash_bytes(&bytes);
        {
            let mut seen = self.last_seen.lock().unwrap();
            if seen.get(&camera.id) == Some(&hash) {
                return FetchOutcome::Unchanged;
            }
            seen.insert(camera.id.clone(), hash);
        }

        let image_path = self.archive_dir.join(image_file_name(&camera.id, now, None, None));
        if let Err(e) = tokio::fs::write(&image_path, &bytes).await {
            return FetchOutcome::Error(e.to_string());
        }

        FetchOutcome::Live(FetchedImage {
                camera_id: camera.id.clone(),
                heading: camera.heading.unwrap_or(0.0),
                timestamp: now,
                image_path,
                fov: camera.fov.unwrap_or(110.0),
        })
    }

    async fn fetch_ptz_batch(&self, camera: &Camera, store: &dyn Store, now: EpochSecs) -> FetchOutcome {
        let cutoff = now.plus_secs(-PTZ_BATCH_WINDOW_SECS);
        match store.unprocessed_images(&camera.id).await {
            Ok(rows) => {
                let batch = rows.into_iter()
                .filter(|r| r.heading != SENTINEL_HEADING && r.timestamp >= cutoff)
                .map(|r| FetchedImage {
                        camera_id: r.camera_id,
                        heading: r.heading,
                        timestamp: r.timestamp,
                        image_path: PathBuf::from(r.image_path),
                        fov: r.fov,
                }).collect::<Vec<_>>();
                if batch.is_empty() { FetchOutcome::Unchanged } else { FetchOutcome::PtzBatch(batch) }
            }
            Err(e) => FetchOutcome::Error(e.to_string()),
        }
    }

}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, store: &dyn Store, camera: &Camera, now: EpochSecs) -> FetchOutcome {
        if camera.is_ptz() { self.fetch_ptz_batch(camera, store, now).await } else { self.fetch_fixed(camera, now).await }
    }

    async fn archive_gc(&self, store: &dyn Store, cutoff: EpochSecs) -> Result<u64> {
        let deleted_rows = store.delete_archive_images_older_than(cutoff).await?;
        if deleted_rows > 0 {
            info!(deleted_rows, "archive gc removed processed rows older than cutoff");
        }
        Ok(deleted_rows)
    }
}

/// `<cameraId>__<iso8601-with-semicolons>[_Diff<m>][_Crop_<x0>x<y0>x<x1>x<y1>].jpg`, the
/// on-disk filename grammar for archived frames.
pub fn image_file_name(camera_id: &str, timestamp: EpochSecs, diff_minutes: Option<i64>, crop: Option<(u32, u32, u32, u32)>) -> String {
    let iso = timestamp.datetime().to_rfc3339().replace(':', ";");
    let mut name = format!("{}__{}", camera_id, iso);
    if let Some(m) = diff_minutes { name.push_str(&format!("_Diff{}", m)); }
    if let Some((x0, y0, x1, y1)) = crop { name.push_str(&format!("_Crop_{}x{}x{}x{}", x0, y0, x1, y1)); }
    name.push_str(".jpg");
    name
}

lazy_static! {
    static ref IMAGE_FILE_NAME_RE: Regex = Regex::new(
        r"^(?P<camera_id>.+?)__(?P<iso>[^_]+)(?:_Diff(?P<diff>\d+))?(?:_Crop_\d+x\d+x\d+x\d+)?\.jpg$"
    ).unwrap();
}

/// recovers `(cameraId, timestamp)` from a filename produced by `image_file_name`, used by the
/// replay binary to reconstruct a backlog from a plain directory of archived frames instead of
/// a `Store`-backed one.
pub fn parse_image_file_name(name: &str) -> Option<(CameraId, EpochSecs)> {
    let caps = IMAGE_FILE_NAME_RE.captures(name)?;
    let camera_id = caps.name("camera_id")?.as_str().to_string();
    let iso = caps.name("iso")?.as_str().replace(';', ":");
    let dt = DateTime::parse_from_rfc3339(&iso).ok()?;
    Some((camera_id, EpochSecs::from_datetime(dt.with_timezone(&chrono::Utc))))
}

/// a contract-violation placeholder row: an empty-classification result still needs an
/// `Archive` entry with the sentinel heading so the camera isn't retried for ~1 cycle.
pub fn sentinel_archive_row(camera_id: &str, now: EpochSecs) -> ArchiveImage {
    ArchiveImage {
        camera_id: camera_id.to_string(),
        heading: SENTINEL_HEADING,
        timestamp: now,
        image_path: String::new(),
        fov: 0.0,
        processed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, Camera, CameraType, Detection, IgnoredView, Probable, Score, WeatherObservation};

    struct FixedUnprocessed(Vec<ArchiveImage>);

    #[async_trait]
    impl Store for FixedUnprocessed {
        async fn active_cameras(&self) -> Result<Vec<Camera>> { Ok(vec![]) }
        async fn camera(&self, _id: &str) -> Result<Option<Camera>> { Ok(None) }
        async fn upsert_camera(&self, _camera: &Camera) -> Result<()> { Ok(()) }
        async fn increment_counter(&self, _g: &str) -> Result<u64> { Ok(0) }
        async fn insert_archive_image(&self, _i: &ArchiveImage) -> Result<()> { Ok(()) }
        async fn mark_image_processed(&self, _c: &str, _h: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn unprocessed_images(&self, _c: &str) -> Result<Vec<ArchiveImage>> { Ok(self.0.clone()) }
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

    fn ptz_camera() -> Camera {
        Camera {
            id: "ptz-1".into(), url: "http://example/ptz1".into(), camera_type: CameraType::Ptz,
            heading: None, fov: None, latitude: 34.0, longitude: -118.0,
            dormant: false, is_prototype: false, recognized_views: None,
        }
    }

    #[tokio::test]
    async fn ptz_batch_excludes_rows_older_than_five_minutes() {
        let now = EpochSecs(1_700_000_000);
        let fresh = ArchiveImage {
            camera_id: "ptz-1".into(), heading: 10.0, timestamp: now.plus_secs(-60),
            image_path: "/a/fresh.jpg".into(), fov: 90.0, processed: false,
        };
        let stale = ArchiveImage {
            camera_id: "ptz-1".into(), heading: 20.0, timestamp: now.plus_secs(-PTZ_BATCH_WINDOW_SECS - 1),
            image_path: "/a/stale.jpg".into(), fov: 90.0, processed: false,
        };
        let store = FixedUnprocessed(vec![stale, fresh]);
        let source = HttpImageSource::new(std::env::temp_dir());

        match source.fetch(&store, &ptz_camera(), now).await {
            FetchOutcome::PtzBatch(batch) => {
                assert_eq!(batch.len(), 1);
                assert_eq!(batch[0].heading, 10.0);
            }
            other => panic!("expected PtzBatch, got {:?}", other),
        }
    }

    #[test]
    fn file_name_matches_grammar() {
        let name = image_file_name("a-n-mobo-c", EpochSecs(0), None, None);
        assert!(name.starts_with("a-n-mobo-c__"));
        assert!(name.ends_with(".jpg"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn file_name_includes_diff_and_crop_suffixes() {
        let name = image_file_name("cam", EpochSecs(0), Some(5), Some((0, 0, 100, 100)));
        assert!(name.contains("_Diff5"));
        assert!(name.contains("_Crop_0x0x100x100"));
    }

    #[test]
    fn file_name_parse_round_trips_through_generation() {
        let ts = EpochSecs(1_700_000_000);
        let name = image_file_name("a-n-mobo-c", ts, None, None);
        let (camera_id, parsed) = parse_image_file_name(&name).expect("should parse");
        assert_eq!(camera_id, "a-n-mobo-c");
        assert_eq!(parsed, ts);
    }

    #[test]
    fn file_name_parse_rejects_garbage() {
        assert!(parse_image_file_name("not_a_valid_name.jpg").is_none());
    }
}
