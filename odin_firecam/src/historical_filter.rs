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

//! the false-positive filter: haze/glare recurs at the same pixel region at the same
//! time of day, so a raw classifier score alone is not sufficient evidence.

use crate::model::{BBox, EpochSecs, Score};
use crate::store::Store;

/// scores within ±1h of the current image's seconds-in-day, over the 12h-7.5day lookback
/// window, qualify as "historical" for the same `(camera, heading, bbox, modelId)`.
pub const LOOKBACK_MIN_SECS: i64 = 12 * 3600;
pub const LOOKBACK_MAX_SECS: i64 = (7.5 * 86400.0) as i64;
pub const TIME_OF_DAY_HALF_WIDTH_SECS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOutcome {
    pub accepted: bool,
    pub adj_score: f64,
    pub hist_avg: f64,
    pub hist_max: f64,
    pub hist_n: usize,
}

fn threshold_for(hist_max: f64) -> f64 {
    ((hist_max + 1.0) / 2.0).max(hist_max + 0.2)
}

/// evaluate a single segment's raw score against its historical same-bbox/time-of-day scores.
/// `stateful = false` (the `--no-state` replay path) bypasses the lookback entirely: any
/// `s > 0.5` is accepted unconditionally and no threshold/adjScore stats are meaningful.
pub async fn evaluate(
    store: &dyn Store,
    camera_id: &str,
    heading: f64,
    now: EpochSecs,
    model_id: &str,
    bbox: &BBox,
    raw_score: f64,
    stateful: bool,
) -> crate::errors::Result<FilterOutcome> {
    if raw_score < 0.5 {
        return Ok(FilterOutcome { accepted: false, adj_score: 0.0, hist_avg: 0.0, hist_max: 0.0, hist_n: 0 });
    }

    if !stateful {
        return Ok(FilterOutcome { accepted: true, adj_score: raw_score, hist_avg: 0.0, hist_max: 0.0, hist_n: 0 });
    }

    let candidates = store.scores_in_window(camera_id, heading, now.seconds_in_day(), TIME_OF_DAY_HALF_WIDTH_SECS, now).await?;
    let historical: Vec<&Score> = candidates.iter()
    .filter(|s| s.model_id == model_id && same_bbox(&s.bbox, bbox))
    .collect();

    let hist_n = historical.len();
    let hist_max = historical.iter().map(|s| s.score).fold(0.0, f64::max);
    let hist_avg = if hist_n > 0 { historical.iter().map(|s| s.score).sum::<f64>() / hist_n as f64 } else { 0.0 };

    let threshold = threshold_for(hist_max);
    let accepted = raw_score > threshold;
    let adj_score = if accepted { (raw_score - threshold) / (1.0 - threshold) } else { 0.0 };

    Ok(FilterOutcome { accepted, adj_score, hist_avg, hist_max, hist_n })
}

fn same_bbox(a: &BBox, b: &BBox) -> bool {
    a.min_x == b.min_x && a.min_y == b.min_y && a.max_x == b.max_x && a.max_y == b.max_y
}

/// a re-scored segment from the shift-check classifier invocation.
pub struct RescoredSegment {
    pub bbox: BBox,
    pub score: f64,
}

/// re-invoke the classifier on a region stretched by one-third on each side (the caller
/// does the stretching/re-invocation; this function implements just the accept/intersect
/// decision). If the top re-scored segment also exceeds 0.5, tighten the original bbox by
/// intersecting with every re-scored segment above 0.5; otherwise discard the candidate.
pub fn shift_check(original: &BBox, rescored: &[RescoredSegment]) -> Option<BBox> {
    let top = rescored.iter().max_by(|a, b| a.score.total_cmp(&b.score))?;
    if top.score <= 0.5 { return None; }

    let mut tightened = *original;
    for seg in rescored.iter().filter(|s| s.score > 0.5) {
        tightened = tightened.intersect(&seg.bbox)?;
    }
    Some(tightened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::model::{CameraId, EpochSecs, WeatherObservation};
    use async_trait::async_trait;

    struct FixedScoreStore { scores: Vec<Score> }

    #[async_trait]
    impl Store for FixedScoreStore {
        async fn active_cameras(&self) -> Result<Vec<crate::model::Camera>> { Ok(vec![]) }
        async fn camera(&self, _id: &str) -> Result<Option<crate::model::Camera>> { Ok(None) }
        async fn upsert_camera(&self, _camera: &crate::model::Camera) -> Result<()> { Ok(()) }
        async fn increment_counter(&self, _g: &str) -> Result<u64> { Ok(0) }
        async fn insert_archive_image(&self, _i: &crate::model::ArchiveImage) -> Result<()> { Ok(()) }
        async fn mark_image_processed(&self, _c: &str, _h: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn unprocessed_images(&self, _c: &str) -> Result<Vec<crate::model::ArchiveImage>> { Ok(vec![]) }
        async fn delete_archive_images_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(0) }
        async fn insert_scores(&self, _s: &[Score]) -> Result<()> { Ok(()) }
        async fn scores_in_window(&self, _c: &str, _h: f64, _s: u32, _w: u32, _now: EpochSecs) -> Result<Vec<Score>> { Ok(self.scores.clone()) }
        async fn delete_scores_older_than(&self, _c: EpochSecs) -> Result<u64> { Ok(0) }
        async fn insert_probable(&self, _p: &crate::model::Probable) -> Result<()> { Ok(()) }
        async fn recent_probable(&self, _c: &str, _h: f64, _s: EpochSecs) -> Result<Option<crate::model::Probable>> { Ok(None) }
        async fn insert_detection(&self, _d: &crate::model::Detection) -> Result<()> { Ok(()) }
        async fn recent_detections(&self, _s: EpochSecs) -> Result<Vec<crate::model::Detection>> { Ok(vec![]) }
        async fn insert_alert(&self, _a: &crate::model::Alert) -> Result<()> { Ok(()) }
        async fn ignored_views(&self, _c: &str) -> Result<Vec<crate::model::IgnoredView>> { Ok(vec![]) }
        async fn increment_ignore_counter(&self, _c: &str, _hc: f64, _aw: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn weather_cache_get(&self, _c: &str, _m: i64) -> Result<Option<(WeatherObservation, WeatherObservation)>> { Ok(None) }
        async fn weather_cache_put(&self, _c: &str, _m: i64, _ce: &WeatherObservation, _ca: &WeatherObservation) -> Result<()> { Ok(()) }
        async fn daily_counts(&self, _since: EpochSecs, _until: EpochSecs) -> Result<crate::model::DailyStats> { Ok(crate::model::DailyStats::default()) }
        async fn insert_daily_stats(&self, _day: &str, _stats: &crate::model::DailyStats) -> Result<()> { Ok(()) }
    }

    fn score_at(bbox: BBox, score: f64) -> Score {
        Score { camera_id: "cam".into(), heading: 0.0, timestamp: EpochSecs(0), bbox, score, seconds_in_day: 0, model_id: "m1".into() }
    }

    #[tokio::test]
    async fn scenario_1_stable_glare_rejected() {
        let bbox = BBox { min_x: 100, min_y: 50, max_x: 400, max_y: 350 };
        let scores: Vec<Score> = (0..14).map(|_| score_at(bbox, 0.82)).collect();
        let store = FixedScoreStore { scores };
        let outcome = evaluate(&store, "cam", 0.0, EpochSecs(0), "m1", &bbox, 0.88, true).await.unwrap();
        assert!(!outcome.accepted);
    }

    #[tokio::test]
    async fn scenario_2_true_positive_promoted() {
        let bbox = BBox { min_x: 100, min_y: 50, max_x: 400, max_y: 350 };
        let scores: Vec<Score> = (0..14).map(|_| score_at(bbox, 0.15)).collect();
        let store = FixedScoreStore { scores };
        let outcome = evaluate(&store, "cam", 0.0, EpochSecs(0), "m1", &bbox, 0.81, true).await.unwrap();
        assert!(outcome.accepted);
        assert!((outcome.adj_score - 0.553).abs() < 0.01, "adjScore was {}", outcome.adj_score);
    }

    #[test]
    fn shift_check_discards_when_top_rescore_below_half() {
        let original = BBox { min_x: 100, min_y: 100, max_x: 200, max_y: 200 };
        let rescored = vec![RescoredSegment { bbox: original, score: 0.4 }];
        assert!(shift_check(&original, &rescored).is_none());
    }

    #[test]
    fn shift_check_tightens_bounds() {
        let original = BBox { min_x: 100, min_y: 100, max_x: 200, max_y: 200 };
        let tighter = BBox { min_x: 120, min_y: 120, max_x: 180, max_y: 180 };
        let rescored = vec![RescoredSegment { bbox: tighter, score: 0.7 }];
        let result = shift_check(&original, &rescored).unwrap();
        assert_eq!(result.min_x, 120);
        assert_eq!(result.max_x, 180);
    }
}
