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

//! detection policies: `DetectAlways`/`DetectNever`/
//! `DetectMulti`/`DetectDiff`/`InceptionV3AndHistoricalThreshold` are represented as
//! implementations of one `DetectionPolicy` trait instead of a duck-typed capability set.
//! `DetectMulti` composes two boxed policies explicitly (no trait inheritance); `DetectDiff`'s
//! prior-aligned-image need is an injected `PriorImageFetch` dependency.

use crate::classifier::{ScoredSegment, TileClassifier};
use crate::errors::Result;
use crate::historical_filter::{self, RescoredSegment};
use crate::model::{BBox, CameraId, EpochSecs};
use crate::store::Store;
use async_trait::async_trait;
use image::DynamicImage;

/// everything a policy needs to classify one fetched image - the pipeline's CLASSIFIED-stage
/// input, named after the classifier's own "black-box callable" shape.
pub struct ImageSpec<'a> {
    pub camera_id: CameraId,
    pub heading: f64,
    pub timestamp: EpochSecs,
    pub image: &'a DynamicImage,
    pub roi: Option<BBox>,
    pub model_id: String,
}

/// the policy's verdict: the promoted bbox (if any), its score/adjScore, and every scored
/// tile that should be recorded via `Store::insert_scores` (empty when stateless).
#[derive(Debug, Clone, Default)]
pub struct PolicyOutcome {
    pub promoted: Option<(BBox, f64, f64)>,
    pub scores_to_record: Vec<ScoredSegment>,
}

/// out-of-band "get the prior spatially-aligned image for this camera/heading" dependency
/// `DetectDiff` needs; injected rather than threaded through optional closures.
#[async_trait]
pub trait PriorImageFetch: Send + Sync {
    async fn prior_aligned_image(&self, camera_id: &str, heading: f64, before: EpochSecs) -> Result<Option<DynamicImage>>;
}

#[async_trait]
pub trait DetectionPolicy: Send + Sync {
    async fn detect(
        &self,
        store: &dyn Store,
        image: &ImageSpec<'_>,
        check_shifts: bool,
        fetch_diff: Option<&dyn PriorImageFetch>,
    ) -> Result<PolicyOutcome>;
}

/// test/replay fixture: promotes the full frame unconditionally at score 1.0.
pub struct DetectAlways;

#[async_trait]
impl DetectionPolicy for DetectAlways {
    async fn detect(&self, _store: &dyn Store, image: &ImageSpec<'_>, _check_shifts: bool, _fetch_diff: Option<&dyn PriorImageFetch>) -> Result<PolicyOutcome> {
        let bbox = image.roi.unwrap_or(BBox { min_x: 0, min_y: 0, max_x: image.image.width(), max_y: image.image.height() });
        Ok(PolicyOutcome { promoted: Some((bbox, 1.0, 1.0)), scores_to_record: Vec::new() })
    }
}

/// test/replay fixture: never promotes anything.
pub struct DetectNever;

#[async_trait]
impl DetectionPolicy for DetectNever {
    async fn detect(&self, _store: &dyn Store, _image: &ImageSpec<'_>, _check_shifts: bool, _fetch_diff: Option<&dyn PriorImageFetch>) -> Result<PolicyOutcome> {
        Ok(PolicyOutcome::default())
    }
}

/// the production policy: tile-classify the ROI, then run every raw-accepted tile through the
/// historical-scores filter, optionally followed by the shift check. `stateful` mirrors the `--noState` CLI flag.
pub struct InceptionV3AndHistoricalThreshold<C> {
    pub classifier: C,
    pub stateful: bool,
}

impl<C: TileClassifier> InceptionV3AndHistoricalThreshold<C> {
    pub fn new(classifier: C, stateful: bool) -> Self { InceptionV3AndHistoricalThreshold { classifier, stateful } }
}

#[async_trait]
impl<C: TileClassifier> DetectionPolicy for InceptionV3AndHistoricalThreshold<C> {
    async fn detect(&self, store: &dyn Store, image: &ImageSpec<'_>, check_shifts: bool, _fetch_diff: Option<&dyn PriorImageFetch>) -> Result<PolicyOutcome> {
        let segments = self.classifier.classify(image.image, image.roi).await?;
        if segments.is_empty() { return Ok(PolicyOutcome::default()); }

        let scores_to_record: Vec<ScoredSegment> = if self.stateful { segments.clone() } else { Vec::new() };

        let top = &segments[0];
        let outcome = historical_filter::evaluate(
            store,
            &image.camera_id,
            image.heading,
            image.timestamp,
            &image.model_id,
            &top.bbox,
            top.score,
            self.stateful,
        ).await?;

        if !outcome.accepted {
            return Ok(PolicyOutcome { promoted: None, scores_to_record });
        }

        let mut bbox = top.bbox;
        if check_shifts {
            let stretched = stretch_bbox(&bbox, 1.0 / 3.0, image.image.width(), image.image.height());
            let rescored = self.classifier.classify(image.image, Some(stretched)).await?;
            let rescored_segments: Vec<RescoredSegment> = rescored.iter()
            .map(|s| RescoredSegment { bbox: s.bbox, score: s.score })
            .collect();
            match historical_filter::shift_check(&bbox, &rescored_segments) {
                Some(tightened) => bbox = tightened,
                None => return Ok(PolicyOutcome { promoted: None, scores_to_record }),
            }
        }

        Ok(PolicyOutcome { promoted: Some((bbox, top.score, outcome.adj_score)), scores_to_record })
    }
}

/// expands `bbox` by `fraction` on every side, clipped to the image bounds.
fn stretch_bbox(bbox: &BBox, fraction: f64, img_width: u32, img_height: u32) -> BBox {
    let dw = (bbox.width() as f64 * fraction).round() as i64;
    let dh = (bbox.height() as f64 * fraction).round() as i64;
    let min_x = (bbox.min_x as i64 - dw).max(0) as u32;
    let min_y = (bbox.min_y as i64 - dh).max(0) as u32;
    let max_x = ((bbox.max_x as i64 + dw) as u32).min(img_width);
    let max_y = ((bbox.max_y as i64 + dh) as u32).min(img_height);
    BBox { min_x, min_y, max_x, max_y }
}

/// PTZ diff-mode: promotes whenever the current frame differs materially from the prior
/// spatially-aligned frame fetched via `fetch_diff`. A missing prior image (first sighting of
/// this heading) never promotes.
pub struct DetectDiff<C> {
    pub classifier: C,
    pub diff_threshold: f64,
}

#[async_trait]
impl<C: TileClassifier> DetectionPolicy for DetectDiff<C> {
    async fn detect(&self, _store: &dyn Store, image: &ImageSpec<'_>, _check_shifts: bool, fetch_diff: Option<&dyn PriorImageFetch>) -> Result<PolicyOutcome> {
        let fetch_diff = match fetch_diff {
            Some(f) => f,
            None => return Ok(PolicyOutcome::default()),
        };
        let prior = match fetch_diff.prior_aligned_image(&image.camera_id, image.heading, image.timestamp).await? {
            Some(p) => p,
            None => return Ok(PolicyOutcome::default()),
        };

        let diff_score = odin_image::rgb_hybrid_compare(image.image, &prior)
        .map(|sim| 1.0 - sim.score)
        .unwrap_or(0.0);

        if diff_score < self.diff_threshold { return Ok(PolicyOutcome::default()); }

        let segments = self.classifier.classify(image.image, image.roi).await?;
        let promoted = segments.first().map(|s| (s.bbox, diff_score, diff_score));
        Ok(PolicyOutcome { promoted, scores_to_record: Vec::new() })
    }
}

/// composes a main policy with a confirmation policy: the main policy runs first; on
/// promotion, the confirmation policy re-evaluates a tightened ROI (the main bbox) and only a
/// confirmed promotion from both survives. Explicit composition, not trait inheritance.
pub struct DetectMulti {
    pub main: Box<dyn DetectionPolicy>,
    pub confirmation: Box<dyn DetectionPolicy>,
}

#[async_trait]
impl DetectionPolicy for DetectMulti {
    async fn detect(&self, store: &dyn Store, image: &ImageSpec<'_>, check_shifts: bool, fetch_diff: Option<&dyn PriorImageFetch>) -> Result<PolicyOutcome> {
        let main_outcome = self.main.detect(store, image, check_shifts, fetch_diff).await?;
        let (bbox, score, adj_score) = match main_outcome.promoted {
            Some(p) => p,
            None => return Ok(main_outcome),
        };

        let confirm_spec = ImageSpec {
            camera_id: image.camera_id.clone(),
            heading: image.heading,
            timestamp: image.timestamp,
            image: image.image,
            roi: Some(bbox),
            model_id: image.model_id.clone(),
        };
        let confirm_outcome = self.confirmation.detect(store, &confirm_spec, check_shifts, fetch_diff).await?;

        match confirm_outcome.promoted {
            Some((confirmed_bbox, confirmed_score, _)) => {
                let tightened = bbox.intersect(&confirmed_bbox).unwrap_or(bbox);
                Ok(PolicyOutcome {
                        promoted: Some((tightened, confirmed_score.max(score), adj_score)),
                        scores_to_record: main_outcome.scores_to_record,
                })
            }
            None => Ok(PolicyOutcome { promoted: None, scores_to_record: main_outcome.scores_to_record }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, Camera, Detection, IgnoredView, Probable, Score, WeatherObservation};

    struct NoopStore;

    #[async_trait]
    impl Store for NoopStore {
        async fn active_cameras(&self) -> Result<Vec<Camera>> { Ok(vec![]) }
        async fn camera(&self, _id: &str) -> Result<Option<Camera>> { Ok(None) }
        async fn upsert_camera(&self, _camera: &Camera) -> Result<()> { Ok(()) }
        async fn increment_counter(&self, _g: &str) -> Result<u64> { Ok(0) }
        async fn insert_archive_image(&self, _i: &crate::model::ArchiveImage) -> Result<()> { Ok(()) }
        async fn mark_image_processed(&self, _c: &str, _h: f64, _t: EpochSecs) -> Result<()> { Ok(()) }
        async fn unprocessed_images(&self, _c: &str) -> Result<Vec<crate::model::ArchiveImage>> { Ok(vec![]) }
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

    #[tokio::test]
    async fn detect_always_promotes_full_frame() {
        let img = DynamicImage::new_rgb8(100, 100);
        let spec = ImageSpec { camera_id: "cam".into(), heading: 0.0, timestamp: EpochSecs(0), image: &img, roi: None, model_id: "m".into() };
        let outcome = DetectAlways.detect(&NoopStore, &spec, false, None).await.unwrap();
        assert!(outcome.promoted.is_some());
    }

    #[tokio::test]
    async fn detect_never_never_promotes() {
        let img = DynamicImage::new_rgb8(100, 100);
        let spec = ImageSpec { camera_id: "cam".into(), heading: 0.0, timestamp: EpochSecs(0), image: &img, roi: None, model_id: "m".into() };
        let outcome = DetectNever.detect(&NoopStore, &spec, false, None).await.unwrap();
        assert!(outcome.promoted.is_none());
    }

    #[tokio::test]
    async fn detect_multi_rejects_when_confirmation_rejects() {
        let composite = DetectMulti { main: Box::new(DetectAlways), confirmation: Box::new(DetectNever) };
        let img = DynamicImage::new_rgb8(100, 100);
        let spec = ImageSpec { camera_id: "cam".into(), heading: 0.0, timestamp: EpochSecs(0), image: &img, roi: None, model_id: "m".into() };
        let outcome = composite.detect(&NoopStore, &spec, false, None).await.unwrap();
        assert!(outcome.promoted.is_none());
    }

    #[tokio::test]
    async fn detect_multi_tightens_bbox_when_both_confirm() {
        let composite = DetectMulti { main: Box::new(DetectAlways), confirmation: Box::new(DetectAlways) };
        let img = DynamicImage::new_rgb8(100, 100);
        let spec = ImageSpec { camera_id: "cam".into(), heading: 0.0, timestamp: EpochSecs(0), image: &img, roi: None, model_id: "m".into() };
        let outcome = composite.detect(&NoopStore, &spec, false, None).await.unwrap();
        assert!(outcome.promoted.is_some());
    }
}
