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

//! weather gating: an 11-dimensional feature vector built from observations at the
//! detection centroid and at the camera, scored by a pluggable `WeatherScorer`, with results
//! amortized in a `WeatherCache`.

use crate::errors::Result;
use crate::model::{CameraId, EpochSecs, WeatherObservation};
use crate::store::Store;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// source of current-conditions observations, one call per (lat,lon). Grounded on
/// odin_openmeteo/odin_wx's "fetch current conditions for a point" shape, generalized to a
/// trait so a live HTTP provider and a replay/fixture provider share one interface.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn observation_at(&self, lat: f64, lon: f64, at: EpochSecs) -> Result<WeatherObservation>;
}

/// `[2*(imgScore-0.5), numSourcePolys-1, (temp-70)/20, (dew-50)/20, (humidity-50)/50,
/// 5*precip, (windspeed-6)/6, (winddir-180)/180, (pressure-1013)/10, (visibility-5)/5,
/// (cloudcover-50)/50]`, verbatim per the weather subsystem's external interface.
pub type FeatureVector = [f64; 11];

pub fn feature_vector(img_score: f64, num_source_polys: usize, obs: &WeatherObservation) -> FeatureVector {
    [
        2.0 * (img_score - 0.5),
        num_source_polys as f64 - 1.0,
        (obs.temp_f - 70.0) / 20.0,
        (obs.dew_point_f - 50.0) / 20.0,
        (obs.humidity_pct - 50.0) / 50.0,
        5.0 * obs.precip_in,
        (obs.windspeed_mph - 6.0) / 6.0,
        (obs.wind_dir_deg - 180.0) / 180.0,
        (obs.pressure_mb - 1013.0) / 10.0,
        (obs.visibility_mi - 5.0) / 5.0,
        (obs.cloud_cover_pct - 50.0) / 50.0,
    ]
}

/// scores the combined `(imgScore, sourcePolygons, weatherAtCentroid)` evidence into a
/// single confidence value, i.e. `weatherModel.predict(features)` in the external weather
/// provider's terms.
pub trait WeatherScorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> f64;
}

/// a conservative linear scorer: conditions that suppress smoke visibility (rain, low
/// visibility, high wind dispersing plume) reduce the score; calibration weights are a
/// fixed placeholder pending a trained replacement model.
pub struct LinearWeatherScorer {
    pub weights: FeatureVector,
    pub bias: f64,
}

impl Default for LinearWeatherScorer {
    fn default() -> Self {
        LinearWeatherScorer {
            // imgScore, numSourcePolys, temp, dewpt, humidity, precip, wind, winddir, pressure, vis, cloud
            weights: [0.3, 0.1, 0.05, -0.02, -0.08, -0.6, -0.05, 0.0, 0.0, 0.05, -0.05],
            bias: 0.5,
        }
    }
}

impl WeatherScorer for LinearWeatherScorer {
    fn score(&self, features: &FeatureVector) -> f64 {
        let mut s = self.bias;
        for i in 0..features.len() { s += self.weights[i] * features[i]; }
        s.clamp(0.0, 1.0)
    }
}

/// `(cameraId, timestamp) -> observations` cache, keyed to the minute so repeated lookups
/// within a scheduler cycle don't refetch. Not persisted beyond process lifetime; the
/// store-backed variant sits behind the `Store` trait instead.
#[derive(Default)]
pub struct WeatherCache {
    entries: HashMap<(CameraId, i64), (WeatherObservation, WeatherObservation, Vec<String>)>,
}

impl WeatherCache {
    fn key(camera_id: &str, at: EpochSecs) -> (CameraId, i64) {
        (camera_id.to_string(), at.0 / 60)
    }

    pub fn get(&self, camera_id: &str, at: EpochSecs) -> Option<&(WeatherObservation, WeatherObservation, Vec<String>)> {
        self.entries.get(&Self::key(camera_id, at))
    }

    pub fn put(&mut self, camera_id: &str, at: EpochSecs, centroid: WeatherObservation, camera: WeatherObservation, sources: Vec<String>) {
        self.entries.insert(Self::key(camera_id, at), (centroid, camera, sources));
    }
}

/// decorates a `WeatherProvider` with a process-local, minute-bucketed cache - the `--noState`
/// path, where a `Store` round-trip would be pure overhead since nothing else persists either.
pub struct CachedWeatherProvider<P: WeatherProvider> {
    inner: P,
    cache: Mutex<WeatherCache>,
}

impl<P: WeatherProvider> CachedWeatherProvider<P> {
    pub fn new(inner: P) -> Self { CachedWeatherProvider { inner, cache: Mutex::new(WeatherCache::default()) } }
}

#[async_trait]
impl<P: WeatherProvider> WeatherProvider for CachedWeatherProvider<P> {
    async fn observation_at(&self, lat: f64, lon: f64, at: EpochSecs) -> Result<WeatherObservation> {
        let key = format!("{:.4},{:.4}", lat, lon);
        if let Some((centroid, _camera, _sources)) = self.cache.lock().unwrap().get(&key, at) {
            return Ok(*centroid);
        }
        let obs = self.inner.observation_at(lat, lon, at).await?;
        self.cache.lock().unwrap().put(&key, at, obs, obs, vec!["live".into()]);
        Ok(obs)
    }
}

/// decorates a `WeatherProvider` with `Store`'s persistent `weather_cache` table, keyed to the
/// minute so every worker in a cycle shares one fetch per `(camera, minute)` pair. `camera_id` doubles as the cache key
/// since observations are always requested in (centroid, camera) pairs for the same camera.
pub struct StoreBackedWeatherProvider<P: WeatherProvider> {
    inner: P,
    store: std::sync::Arc<dyn Store>,
    camera_id: CameraId,
}

impl<P: WeatherProvider> StoreBackedWeatherProvider<P> {
    pub fn new(inner: P, store: std::sync::Arc<dyn Store>, camera_id: CameraId) -> Self {
        StoreBackedWeatherProvider { inner, store, camera_id }
    }
}

#[async_trait]
impl<P: WeatherProvider> WeatherProvider for StoreBackedWeatherProvider<P> {
    async fn observation_at(&self, lat: f64, lon: f64, at: EpochSecs) -> Result<WeatherObservation> {
        let minute_bucket = at.0 / 60;
        if let Some((centroid, _camera)) = self.store.weather_cache_get(&self.camera_id, minute_bucket).await? {
            return Ok(centroid);
        }
        let obs = self.inner.observation_at(lat, lon, at).await?;
        self.store.weather_cache_put(&self.camera_id, minute_bucket, &obs, &obs).await?;
        Ok(obs)
    }
}

/// live HTTP provider against an open-meteo-shaped current-conditions endpoint
/// (`?latitude=..&longitude=..&current=temperature_2m,...`). `odin_openmeteo`/`odin_wx`
/// describe the same response shape but aren't usable workspace members (empty `src/`), so
/// this talks to the endpoint directly with `reqwest`, the same client-per-adapter pattern
/// `image_source::HttpImageSource` uses.
pub struct HttpWeatherProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWeatherProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpWeatherProvider { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }
}

#[derive(serde::Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    dew_point_2m: f64,
    relative_humidity_2m: f64,
    precipitation: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    surface_pressure: f64,
    visibility: f64,
    cloud_cover: f64,
}

#[derive(serde::Deserialize)]
struct CurrentConditionsResponse {
    current: CurrentConditions,
}

#[async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn observation_at(&self, lat: f64, lon: f64, _at: EpochSecs) -> Result<WeatherObservation> {
        let response: CurrentConditionsResponse = self.client
            .get(&self.endpoint)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", "temperature_2m,dew_point_2m,relative_humidity_2m,precipitation,\
                    wind_speed_10m,wind_direction_10m,surface_pressure,visibility,cloud_cover".to_string()),
            ])
            .send().await?
            .error_for_status()?
            .json().await?;
        let c = response.current;
        Ok(WeatherObservation {
            temp_f: c.temperature_2m, dew_point_f: c.dew_point_2m, humidity_pct: c.relative_humidity_2m,
            precip_in: c.precipitation, windspeed_mph: c.wind_speed_10m, wind_dir_deg: c.wind_direction_10m,
            pressure_mb: c.surface_pressure, visibility_mi: c.visibility, cloud_cover_pct: c.cloud_cover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(temp: f64) -> WeatherObservation {
        WeatherObservation {
            temp_f: temp, dew_point_f: 40.0, humidity_pct: 20.0, precip_in: 0.0,
            windspeed_mph: 5.0, wind_dir_deg: 270.0, pressure_mb: 1013.0,
            visibility_mi: 10.0, cloud_cover_pct: 10.0,
        }
    }

    #[test]
    fn rain_suppresses_score() {
        let scorer = LinearWeatherScorer::default();
        let dry = obs(85.0);
        let mut wet = obs(85.0);
        wet.precip_in = 0.5;
        let dry_fv = feature_vector(0.8, 1, &dry);
        let wet_fv = feature_vector(0.8, 1, &wet);
        assert!(scorer.score(&wet_fv) < scorer.score(&dry_fv));
    }

    #[test]
    fn weather_gate_scenario_5() {
        // adjScore=0.6, weatherScore=0.2, threshold=0.25 => no alert
        let weather_score = 0.2;
        let weather_threshold = 0.25;
        assert!(!(weather_score > weather_threshold));
    }

    #[test]
    fn cache_round_trips_within_same_minute() {
        let mut cache = WeatherCache::default();
        let at = EpochSecs(1_700_000_000);
        cache.put("cam-1", at, obs(70.0), obs(70.0), vec!["test".into()]);
        assert!(cache.get("cam-1", at.plus_secs(30)).is_some());
        assert!(cache.get("cam-1", at.plus_secs(90)).is_none());
    }

    struct CountingProvider(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl WeatherProvider for &CountingProvider {
        async fn observation_at(&self, _lat: f64, _lon: f64, _at: EpochSecs) -> Result<WeatherObservation> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(obs(70.0))
        }
    }

    #[tokio::test]
    async fn cached_provider_fetches_once_per_minute_bucket() {
        let counting = CountingProvider(std::sync::atomic::AtomicUsize::new(0));
        let cached = CachedWeatherProvider::new(&counting);
        let at = EpochSecs(1_700_000_000);
        cached.observation_at(34.0, -118.0, at).await.unwrap();
        cached.observation_at(34.0, -118.0, at.plus_secs(10)).await.unwrap();
        assert_eq!(counting.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
