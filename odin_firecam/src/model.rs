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

//! the data model: cameras, archive images, scores, probables, detections, alerts,
//! ignored views, counters and the weather cache. Timestamps are always integer seconds
//! since the epoch, never strings.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use odin_common::angle::{Latitude, Longitude};
use serde::{Deserialize, Serialize};
use std::fmt;

/// integer seconds since the Unix epoch - the one timestamp representation used at every
/// component boundary in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpochSecs(pub i64);

impl EpochSecs {
    pub fn now() -> Self { EpochSecs(Utc::now().timestamp()) }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self { EpochSecs(dt.timestamp()) }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.0, 0).unwrap_or_else(|| Utc::now())
    }

    /// `hour*3600 + minute*60 + second` in UTC - the key used for time-of-day historical
    /// comparisons, which only ever compare against other UTC-keyed rows from the same camera
    /// so no timezone conversion is needed to stay self-consistent.
    pub fn seconds_in_day(&self) -> u32 {
        let t = self.datetime().time();
        t.hour() * 3600 + t.minute() * 60 + t.second()
    }

    /// `hour*3600 + minute*60 + second` in `tz` - what the diurnal mode machine compares
    /// against `detect_start_hour`/`detect_end_hour`, which are documented as local hours.
    pub fn seconds_in_day_tz(&self, tz: Tz) -> u32 {
        let t = self.datetime().with_timezone(&tz).time();
        t.hour() * 3600 + t.minute() * 60 + t.second()
    }

    /// calendar day in `tz`, e.g. `"2026-07-30"` - the key the once-daily post-work and its
    /// dedup counter are keyed on, so the day rolls over at local midnight, not UTC midnight.
    pub fn day_key_tz(&self, tz: Tz) -> String {
        self.datetime().with_timezone(&tz).format("%Y-%m-%d").to_string()
    }

    pub fn plus_secs(&self, secs: i64) -> Self { EpochSecs(self.0 + secs) }
    pub fn minus(&self, other: EpochSecs) -> i64 { self.0 - other.0 }
}

impl fmt::Display for EpochSecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime().to_rfc3339())
    }
}

pub type CameraId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CameraType {
    Fixed,
    Ptz,
}

/// a fixed or pan-tilt-zoom camera in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: CameraId,
    pub url: String,
    pub camera_type: CameraType,
    /// fixed cameras carry a heading/fov; PTZ cameras get theirs per fetched image
    pub heading: Option<f64>,
    pub fov: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub dormant: bool,
    pub is_prototype: bool,
    pub recognized_views: Option<String>,
}

impl Camera {
    pub fn is_ptz(&self) -> bool { matches!(self.camera_type, CameraType::Ptz) }

    pub fn lat(&self) -> Latitude { Latitude::from_degrees(self.latitude) }
    pub fn lon(&self) -> Longitude { Longitude::from_degrees(self.longitude) }
}

/// `(cameraId, heading, timestamp, imagePath, fieldOfView, processed)`. `processed` flips
/// exactly once; for a given `(cameraId, heading)` timestamps are monotonically non-decreasing
/// per producer and an image is never reprocessed once `processed == true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveImage {
    pub camera_id: CameraId,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub image_path: String,
    pub fov: f64,
    pub processed: bool,
}

/// sentinel heading used to record a "contract violation" archive row so the camera
/// isn't retried for roughly one scheduler cycle.
pub const SENTINEL_HEADING: f64 = 999.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BBox {
    pub fn width(&self) -> u32 { self.max_x - self.min_x }
    pub fn height(&self) -> u32 { self.max_y - self.min_y }

    pub fn center_x(&self) -> f64 { (self.min_x as f64 + self.max_x as f64) / 2.0 }

    /// intersection of two boxes, or `None` if they don't overlap.
    pub fn intersect(&self, other: &BBox) -> Option<BBox> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        if min_x < max_x && min_y < max_y {
            Some(BBox { min_x, min_y, max_x, max_y })
        } else {
            None
        }
    }
}

/// one row per classified tile, retained for a multi-week rolling window (purged beyond 3 weeks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub camera_id: CameraId,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub bbox: BBox,
    pub score: f64,
    pub seconds_in_day: u32,
    pub model_id: String,
}

pub const SCORE_RETENTION_DAYS: i64 = 21;

/// subset of scores the historical filter promoted. At-most-one per `(camera, heading,
/// hour-window)` - duplicate suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probable {
    pub camera_id: CameraId,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub bbox: BBox,
    pub score: f64,
    pub adj_score: f64,
    pub image_path: String,
    pub model_id: String,
}

pub const PROBABLE_DEDUP_WINDOW_SECS: i64 = 3600;

/// a simple (lon,lat) polygon - kept crate-local rather than routed through `odin_common::geo::GeoPolygon`
/// since that type does not (yet) expose boolean ops; see geometry.rs.
pub type Polygon = geo::Polygon<f64>;

/// a confirmed candidate, promoted after viewshed/weather qualification.
#[derive(Debug, Clone)]
pub struct Detection {
    pub camera_id: CameraId,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub polygon: Polygon,
    pub source_polygons: Vec<Polygon>,
    pub weather_score: f64,
    pub video_uri: String,
    pub annotated_image_uri: String,
    pub map_uri: String,
    pub adj_score: f64,
}

/// a detection that crossed the weather threshold and is not a prototype/PTZ camera.
#[derive(Debug, Clone)]
pub struct Alert {
    pub camera_id: CameraId,
    pub timestamp: EpochSecs,
    pub adj_score: f64,
    pub weather_score: f64,
    pub annotated_url: String,
    pub cropped_url: String,
    pub map_url: String,
    pub polygon: Polygon,
    pub is_proto: bool,
}

/// `(cameraId, headingCenter, angularWidth, countIgnored, updateTimestamp)` - angular sectors
/// known to false-trigger for a camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoredView {
    pub camera_id: CameraId,
    pub heading_center: f64,
    pub angular_width: f64,
    pub count_ignored: u64,
    pub update_timestamp: EpochSecs,
}

/// `(cameraId, timestamp) -> (weatherAtCentroid, weatherAtCamera, sources)`, used to amortize
/// external weather fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCacheEntry {
    pub camera_id: CameraId,
    pub timestamp: EpochSecs,
    pub weather_at_centroid: WeatherObservation,
    pub weather_at_camera: WeatherObservation,
    pub sources: Vec<String>,
}

/// one day's counts at each pipeline stage, persisted once by the Fleet Controller's daily
/// post-work: images fetched, tiles classified, tiles scoring >= 0.5, and promotions
/// through probables/detections/alerts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DailyStats {
    pub images: u64,
    pub segments: u64,
    pub positive_segments: u64,
    pub probables: u64,
    pub detections: u64,
    pub alerts: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temp_f: f64,
    pub dew_point_f: f64,
    pub humidity_pct: f64,
    pub precip_in: f64,
    pub windspeed_mph: f64,
    pub wind_dir_deg: f64,
    pub pressure_mb: f64,
    pub visibility_mi: f64,
    pub cloud_cover_pct: f64,
}
