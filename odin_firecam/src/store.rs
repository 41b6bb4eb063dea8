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

//! persistence. `Store` is the trait every other module programs against;
//! `SqlxStore` is the sqlite-backed implementation, following the `sqlx::query`/`query_as`
//! runtime-query convention (not the `query!` macro, which needs a live DB at compile time)
//! used by odin_server's auth backend.

use crate::errors::{op_failed, Result};
use crate::model::{
    ArchiveImage, BBox, Camera, CameraId, Detection, EpochSecs, IgnoredView, Probable, Score,
    WeatherObservation,
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, FromRow, Row, SqlitePool};
use std::path::Path;

#[async_trait]
pub trait Store: Send + Sync {
    async fn active_cameras(&self) -> Result<Vec<Camera>>;
    async fn camera(&self, camera_id: &str) -> Result<Option<Camera>>;

    /// insert or replace the row for this camera's id - how the fleet roster in
    /// `firecam.ron` gets mirrored into the `cameras` table at startup.
    async fn upsert_camera(&self, camera: &Camera) -> Result<()>;

    /// atomically advance the named round-robin counter by one and return the pre-increment
    /// value, retrying on optimistic-concurrency conflicts.
    async fn increment_counter(&self, group: &str) -> Result<u64>;

    async fn insert_archive_image(&self, image: &ArchiveImage) -> Result<()>;
    async fn mark_image_processed(&self, camera_id: &str, heading: f64, timestamp: EpochSecs) -> Result<()>;
    async fn unprocessed_images(&self, camera_id: &str) -> Result<Vec<ArchiveImage>>;

    /// gc sweep for processed rows older than `cutoff`; never removes a row still
    /// referenced by a `probables.image_path` (a live probable/detection candidate may
    /// still need the raw frame for composition).
    async fn delete_archive_images_older_than(&self, cutoff: EpochSecs) -> Result<u64>;

    async fn insert_scores(&self, scores: &[Score]) -> Result<()>;

    /// scores for the same `(camera, heading)` within `half_width_secs` of `seconds_in_day`,
    /// bounded to the 12h-7.5day lookback window ending at `now` - the same window
    /// `historical_filter::evaluate` applies when deciding which rows count as "historical".
    async fn scores_in_window(&self, camera_id: &str, heading: f64, seconds_in_day: u32, half_width_secs: u32, now: EpochSecs) -> Result<Vec<Score>>;
    async fn delete_scores_older_than(&self, cutoff: EpochSecs) -> Result<u64>;

    async fn insert_probable(&self, probable: &Probable) -> Result<()>;
    async fn recent_probable(&self, camera_id: &str, heading: f64, since: EpochSecs) -> Result<Option<Probable>>;

    async fn insert_detection(&self, detection: &Detection) -> Result<()>;
    async fn recent_detections(&self, since: EpochSecs) -> Result<Vec<Detection>>;

    async fn insert_alert(&self, alert: &crate::model::Alert) -> Result<()>;

    async fn ignored_views(&self, camera_id: &str) -> Result<Vec<IgnoredView>>;
    async fn increment_ignore_counter(&self, camera_id: &str, heading_center: f64, angular_width: f64, at: EpochSecs) -> Result<()>;

    async fn weather_cache_get(&self, camera_id: &str, minute_bucket: i64) -> Result<Option<(WeatherObservation, WeatherObservation)>>;
    async fn weather_cache_put(&self, camera_id: &str, minute_bucket: i64, centroid: &WeatherObservation, camera: &WeatherObservation) -> Result<()>;

    /// tallies images/segments/positive-segments/probables/detections/alerts recorded in
    /// `[since, until)`, for the daily post-work rollup.
    async fn daily_counts(&self, since: EpochSecs, until: EpochSecs) -> Result<crate::model::DailyStats>;
    async fn insert_daily_stats(&self, day: &str, stats: &crate::model::DailyStats) -> Result<()>;
}

/// polygons have no direct sqlite column type; round-trip the exterior ring through a plain
/// JSON array of (lon,lat) pairs rather than pulling in a WKT crate for one table.
fn polygon_to_coords(p: &crate::model::Polygon) -> Vec<(f64, f64)> {
    p.exterior().coords().map(|c| (c.x, c.y)).collect()
}

fn coords_to_polygon(coords: &[(f64, f64)]) -> crate::model::Polygon {
    use geo::{Coord, LineString};
    let line = LineString::new(coords.iter().map(|&(x, y)| Coord { x, y }).collect());
    crate::model::Polygon::new(line, vec![])
}

pub struct SqlxStore {
    pool: SqlitePool,
}

impl SqlxStore {
    pub async fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
        .filename(path.as_ref())
        .create_if_missing(create_if_missing);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| op_failed(e))?;
        Ok(SqlxStore { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self { SqlxStore { pool } }
}

#[derive(FromRow)]
struct CameraRow {
    id: String,
    url: String,
    camera_type: String,
    heading: Option<f64>,
    fov: Option<f64>,
    latitude: f64,
    longitude: f64,
    dormant: bool,
    is_prototype: bool,
    recognized_views: Option<String>,
}

impl From<CameraRow> for Camera {
    fn from(r: CameraRow) -> Self {
        Camera {
            id: r.id,
            url: r.url,
            camera_type: if r.camera_type == "ptz" { crate::model::CameraType::Ptz } else { crate::model::CameraType::Fixed },
            heading: r.heading,
            fov: r.fov,
            latitude: r.latitude,
            longitude: r.longitude,
            dormant: r.dormant,
            is_prototype: r.is_prototype,
            recognized_views: r.recognized_views,
        }
    }
}

#[async_trait]
impl Store for SqlxStore {
    async fn active_cameras(&self) -> Result<Vec<Camera>> {
        let rows: Vec<CameraRow> = sqlx::query_as("select * from cameras where dormant = 0")
        .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Camera::from).collect())
    }

    async fn camera(&self, camera_id: &str) -> Result<Option<Camera>> {
        let row: Option<CameraRow> = sqlx::query_as("select * from cameras where id = ?")
        .bind(camera_id)
        .fetch_optional(&self.pool).await?;
        Ok(row.map(Camera::from))
    }

    async fn upsert_camera(&self, camera: &Camera) -> Result<()> {
        let camera_type = if camera.is_ptz() { "ptz" } else { "fixed" };
        sqlx::query(
            "insert into cameras (id, url, camera_type, heading, fov, latitude, longitude, dormant, is_prototype, recognized_views) \
            values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
            on conflict(id) do update set url = excluded.url, camera_type = excluded.camera_type, \
            heading = excluded.heading, fov = excluded.fov, latitude = excluded.latitude, \
            longitude = excluded.longitude, dormant = excluded.dormant, is_prototype = excluded.is_prototype, \
            recognized_views = excluded.recognized_views"
        )
        .bind(&camera.id).bind(&camera.url).bind(camera_type)
        .bind(camera.heading).bind(camera.fov)
        .bind(camera.latitude).bind(camera.longitude)
        .bind(camera.dormant).bind(camera.is_prototype)
        .bind(&camera.recognized_views)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn increment_counter(&self, group: &str) -> Result<u64> {
        // optimistic CAS loop: read (value,version), then write back gated on the version
        // being unchanged, retrying on conflict instead of taking a write lock - same
        // pattern as the rest of this crate's "no global mutex" stance on shared counters.
        loop {
            let row = sqlx::query("select value, version from counters where name = ?")
            .bind(group)
            .fetch_optional(&self.pool).await?;

            let (value, version): (i64, i64) = match row {
                Some(r) => (r.get("value"), r.get("version")),
                None => {
                    let inserted = sqlx::query(
                        "insert into counters (name, value, version) values (?, 0, 0) on conflict(name) do nothing"
                    ).bind(group).execute(&self.pool).await?;
                    if inserted.rows_affected() == 0 { continue; }
                    (0, 0)
                }
            };

            let result = sqlx::query(
                "update counters set value = ?, version = version + 1 where name = ? and version = ?"
            ).bind(value + 1).bind(group).bind(version).execute(&self.pool).await?;

            if result.rows_affected() == 1 {
                return Ok(value as u64);
            }
            // lost the race - another worker advanced the counter first, retry
        }
    }

    async fn insert_archive_image(&self, image: &ArchiveImage) -> Result<()> {
        sqlx::query(
            "insert into archive_images (camera_id, heading, timestamp, image_path, fov, processed) values (?, ?, ?, ?, ?, ?)"
        )
        .bind(&image.camera_id).bind(image.heading).bind(image.timestamp.0)
        .bind(&image.image_path).bind(image.fov).bind(image.processed)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn mark_image_processed(&self, camera_id: &str, heading: f64, timestamp: EpochSecs) -> Result<()> {
        sqlx::query("update archive_images set processed = 1 where camera_id = ? and heading = ? and timestamp = ?")
        .bind(camera_id).bind(heading).bind(timestamp.0)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn unprocessed_images(&self, camera_id: &str) -> Result<Vec<ArchiveImage>> {
        let rows = sqlx::query(
            "select camera_id, heading, timestamp, image_path, fov, processed from archive_images where camera_id = ? and processed = 0 order by timestamp asc"
        ).bind(camera_id).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(|r| ArchiveImage {
                    camera_id: r.get("camera_id"),
                    heading: r.get("heading"),
                    timestamp: EpochSecs(r.get("timestamp")),
                    image_path: r.get("image_path"),
                    fov: r.get("fov"),
                    processed: r.get("processed"),
            }).collect())
    }

    async fn delete_archive_images_older_than(&self, cutoff: EpochSecs) -> Result<u64> {
        let result = sqlx::query(
            "delete from archive_images where timestamp < ? and processed = 1 \
            and not exists (select 1 from probables p where p.image_path = archive_images.image_path)"
        )
        .bind(cutoff.0).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_scores(&self, scores: &[Score]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for s in scores {
            sqlx::query(
                "insert into scores (camera_id, heading, timestamp, min_x, min_y, max_x, max_y, score, seconds_in_day, model_id) values (?,?,?,?,?,?,?,?,?,?)"
            )
            .bind(&s.camera_id).bind(s.heading).bind(s.timestamp.0)
            .bind(s.bbox.min_x).bind(s.bbox.min_y).bind(s.bbox.max_x).bind(s.bbox.max_y)
            .bind(s.score).bind(s.seconds_in_day).bind(&s.model_id)
            .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn scores_in_window(&self, camera_id: &str, heading: f64, seconds_in_day: u32, half_width_secs: u32, now: EpochSecs) -> Result<Vec<Score>> {
        // the seconds-in-day window wraps at midnight; querying both legs and letting
        // the caller re-filter by exact distance keeps this SQL simple.
        let lo = seconds_in_day as i64 - half_width_secs as i64;
        let hi = seconds_in_day as i64 + half_width_secs as i64;
        let earliest = now.0 - crate::historical_filter::LOOKBACK_MAX_SECS;
        let latest = now.0 - crate::historical_filter::LOOKBACK_MIN_SECS;

        let rows = sqlx::query(
            "select camera_id, heading, timestamp, min_x, min_y, max_x, max_y, score, seconds_in_day, model_id from scores \
            where camera_id = ? and heading = ? and timestamp between ? and ? and (seconds_in_day between ? and ? \
                or seconds_in_day between ? and ? or seconds_in_day between ? and ?)"
        )
        .bind(camera_id).bind(heading)
        .bind(earliest).bind(latest)
        .bind(lo).bind(hi)
        .bind(lo + 86400).bind(hi + 86400)
        .bind(lo - 86400).bind(hi - 86400)
        .fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(|r| Score {
            camera_id: r.get("camera_id"),
            heading: r.get("heading"),
            timestamp: EpochSecs(r.get("timestamp")),
            bbox: BBox { min_x: r.get("min_x"), min_y: r.get("min_y"), max_x: r.get("max_x"), max_y: r.get("max_y") },
            score: r.get("score"),
            seconds_in_day: r.get::<i64, _>("seconds_in_day") as u32,
            model_id: r.get("model_id"),
        }).collect())
    }

    async fn delete_scores_older_than(&self, cutoff: EpochSecs) -> Result<u64> {
        let result = sqlx::query("delete from scores where timestamp < ?").bind(cutoff.0).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_probable(&self, p: &Probable) -> Result<()> {
        sqlx::query(
            "insert into probables (camera_id, heading, timestamp, min_x, min_y, max_x, max_y, score, adj_score, image_path, model_id) values (?,?,?,?,?,?,?,?,?,?,?)"
        )
        .bind(&p.camera_id).bind(p.heading).bind(p.timestamp.0)
        .bind(p.bbox.min_x).bind(p.bbox.min_y).bind(p.bbox.max_x).bind(p.bbox.max_y)
        .bind(p.score).bind(p.adj_score).bind(&p.image_path).bind(&p.model_id)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn recent_probable(&self, camera_id: &str, heading: f64, since: EpochSecs) -> Result<Option<Probable>> {
        let row = sqlx::query(
            "select camera_id, heading, timestamp, min_x, min_y, max_x, max_y, score, adj_score, image_path, model_id from probables \
            where camera_id = ? and heading = ? and timestamp >= ? order by timestamp desc limit 1"
        ).bind(camera_id).bind(heading).bind(since.0).fetch_optional(&self.pool).await?;

        Ok(row.map(|r| Probable {
                    camera_id: r.get("camera_id"),
                    heading: r.get("heading"),
                    timestamp: EpochSecs(r.get("timestamp")),
                    bbox: BBox { min_x: r.get("min_x"), min_y: r.get("min_y"), max_x: r.get("max_x"), max_y: r.get("max_y") },
                    score: r.get("score"),
                    adj_score: r.get("adj_score"),
                    image_path: r.get("image_path"),
                    model_id: r.get("model_id"),
        }))
    }

    async fn insert_detection(&self, d: &Detection) -> Result<()> {
        let polygon_json = serde_json::to_string(&polygon_to_coords(&d.polygon))?;
        sqlx::query(
            "insert into detections (camera_id, heading, timestamp, polygon_json, weather_score, video_uri, annotated_image_uri, map_uri, adj_score) values (?,?,?,?,?,?,?,?,?)"
        )
        .bind(&d.camera_id).bind(d.heading).bind(d.timestamp.0).bind(polygon_json)
        .bind(d.weather_score).bind(&d.video_uri).bind(&d.annotated_image_uri).bind(&d.map_uri).bind(d.adj_score)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn recent_detections(&self, since: EpochSecs) -> Result<Vec<Detection>> {
        let rows = sqlx::query(
            "select camera_id, heading, timestamp, polygon_json, weather_score, video_uri, annotated_image_uri, map_uri, adj_score from detections where timestamp >= ?"
        ).bind(since.0).fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let polygon_json: String = r.get("polygon_json");
            let coords: Vec<(f64, f64)> = serde_json::from_str(&polygon_json)?;
            out.push(Detection {
                    camera_id: r.get("camera_id"),
                    heading: r.get("heading"),
                    timestamp: EpochSecs(r.get("timestamp")),
                    polygon: coords_to_polygon(&coords),
                    source_polygons: Vec::new(),
                    weather_score: r.get("weather_score"),
                    video_uri: r.get("video_uri"),
                    annotated_image_uri: r.get("annotated_image_uri"),
                    map_uri: r.get("map_uri"),
                    adj_score: r.get("adj_score"),
            });
        }
        Ok(out)
    }

    async fn insert_alert(&self, a: &crate::model::Alert) -> Result<()> {
        let polygon_json = serde_json::to_string(&polygon_to_coords(&a.polygon))?;
        sqlx::query(
            "insert into alerts (camera_id, timestamp, adj_score, weather_score, annotated_url, cropped_url, map_url, polygon_json, is_proto) values (?,?,?,?,?,?,?,?,?)"
        )
        .bind(&a.camera_id).bind(a.timestamp.0).bind(a.adj_score).bind(a.weather_score)
        .bind(&a.annotated_url).bind(&a.cropped_url).bind(&a.map_url).bind(polygon_json).bind(a.is_proto)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn ignored_views(&self, camera_id: &str) -> Result<Vec<IgnoredView>> {
        let rows = sqlx::query(
            "select camera_id, heading_center, angular_width, count_ignored, update_timestamp from ignored_views where camera_id = ?"
        ).bind(camera_id).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(|r| IgnoredView {
                    camera_id: r.get("camera_id"),
                    heading_center: r.get("heading_center"),
                    angular_width: r.get("angular_width"),
                    count_ignored: r.get::<i64, _>("count_ignored") as u64,
                    update_timestamp: EpochSecs(r.get("update_timestamp")),
            }).collect())
    }

    async fn increment_ignore_counter(&self, camera_id: &str, heading_center: f64, angular_width: f64, at: EpochSecs) -> Result<()> {
        sqlx::query(
            "update ignored_views set count_ignored = count_ignored + 1, update_timestamp = ? \
            where camera_id = ? and heading_center = ? and angular_width = ?"
        )
        .bind(at.0).bind(camera_id).bind(heading_center).bind(angular_width)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn weather_cache_get(&self, camera_id: &str, minute_bucket: i64) -> Result<Option<(WeatherObservation, WeatherObservation)>> {
        let row = sqlx::query(
            "select temp_f_c, dew_point_f_c, humidity_pct_c, precip_in_c, windspeed_mph_c, wind_dir_deg_c, pressure_mb_c, visibility_mi_c, cloud_cover_pct_c, \
            temp_f_s, dew_point_f_s, humidity_pct_s, precip_in_s, windspeed_mph_s, wind_dir_deg_s, pressure_mb_s, visibility_mi_s, cloud_cover_pct_s \
            from weather_cache where camera_id = ? and minute_bucket = ?"
        ).bind(camera_id).bind(minute_bucket).fetch_optional(&self.pool).await?;

        Ok(row.map(|r| {
            let centroid = WeatherObservation {
                temp_f: r.get("temp_f_c"), dew_point_f: r.get("dew_point_f_c"), humidity_pct: r.get("humidity_pct_c"),
                precip_in: r.get("precip_in_c"), windspeed_mph: r.get("windspeed_mph_c"), wind_dir_deg: r.get("wind_dir_deg_c"),
                pressure_mb: r.get("pressure_mb_c"), visibility_mi: r.get("visibility_mi_c"), cloud_cover_pct: r.get("cloud_cover_pct_c"),
            };
            let camera = WeatherObservation {
                temp_f: r.get("temp_f_s"), dew_point_f: r.get("dew_point_f_s"), humidity_pct: r.get("humidity_pct_s"),
                precip_in: r.get("precip_in_s"), windspeed_mph: r.get("windspeed_mph_s"), wind_dir_deg: r.get("wind_dir_deg_s"),
                pressure_mb: r.get("pressure_mb_s"), visibility_mi: r.get("visibility_mi_s"), cloud_cover_pct: r.get("cloud_cover_pct_s"),
            };
            (centroid, camera)
        }))
    }

    async fn weather_cache_put(&self, camera_id: &str, minute_bucket: i64, centroid: &WeatherObservation, camera: &WeatherObservation) -> Result<()> {
        sqlx::query(
            "insert into weather_cache (camera_id, minute_bucket, \
            temp_f_c, dew_point_f_c, humidity_pct_c, precip_in_c, windspeed_mph_c, wind_dir_deg_c, pressure_mb_c, visibility_mi_c, cloud_cover_pct_c, \
            temp_f_s, dew_point_f_s, humidity_pct_s, precip_in_s, windspeed_mph_s, wind_dir_deg_s, pressure_mb_s, visibility_mi_s, cloud_cover_pct_s) \
            values (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?) \
            on conflict(camera_id, minute_bucket) do nothing"
        )
        .bind(camera_id).bind(minute_bucket)
        .bind(centroid.temp_f).bind(centroid.dew_point_f).bind(centroid.humidity_pct).bind(centroid.precip_in)
        .bind(centroid.windspeed_mph).bind(centroid.wind_dir_deg).bind(centroid.pressure_mb).bind(centroid.visibility_mi).bind(centroid.cloud_cover_pct)
        .bind(camera.temp_f).bind(camera.dew_point_f).bind(camera.humidity_pct).bind(camera.precip_in)
        .bind(camera.windspeed_mph).bind(camera.wind_dir_deg).bind(camera.pressure_mb).bind(camera.visibility_mi).bind(camera.cloud_cover_pct)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn daily_counts(&self, since: EpochSecs, until: EpochSecs) -> Result<crate::model::DailyStats> {
        let images: i64 = sqlx::query_scalar("select count(*) from archive_images where timestamp >= ? and timestamp < ?")
        .bind(since.0).bind(until.0).fetch_one(&self.pool).await?;
        let segments: i64 = sqlx::query_scalar("select count(*) from scores where timestamp >= ? and timestamp < ?")
        .bind(since.0).bind(until.0).fetch_one(&self.pool).await?;
        let positive_segments: i64 = sqlx::query_scalar("select count(*) from scores where timestamp >= ? and timestamp < ? and score >= 0.5")
        .bind(since.0).bind(until.0).fetch_one(&self.pool).await?;
        let probables: i64 = sqlx::query_scalar("select count(*) from probables where timestamp >= ? and timestamp < ?")
        .bind(since.0).bind(until.0).fetch_one(&self.pool).await?;
        let detections: i64 = sqlx::query_scalar("select count(*) from detections where timestamp >= ? and timestamp < ?")
        .bind(since.0).bind(until.0).fetch_one(&self.pool).await?;
        let alerts: i64 = sqlx::query_scalar("select count(*) from alerts where timestamp >= ? and timestamp < ?")
        .bind(since.0).bind(until.0).fetch_one(&self.pool).await?;

        Ok(crate::model::DailyStats {
            images: images as u64, segments: segments as u64, positive_segments: positive_segments as u64,
            probables: probables as u64, detections: detections as u64, alerts: alerts as u64,
        })
    }

    async fn insert_daily_stats(&self, day: &str, stats: &crate::model::DailyStats) -> Result<()> {
        sqlx::query(
            "insert into daily_stats (day, images, segments, positive_segments, probables, detections, alerts) \
            values (?,?,?,?,?,?,?) \
            on conflict(day) do update set images = excluded.images, segments = excluded.segments, \
            positive_segments = excluded.positive_segments, probables = excluded.probables, \
            detections = excluded.detections, alerts = excluded.alerts"
        )
        .bind(day)
        .bind(stats.images as i64).bind(stats.segments as i64).bind(stats.positive_segments as i64)
        .bind(stats.probables as i64).bind(stats.detections as i64).bind(stats.alerts as i64)
        .execute(&self.pool).await?;
        Ok(())
    }
}
