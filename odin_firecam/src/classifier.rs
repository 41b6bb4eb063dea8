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

//! tile classification. The classifier itself is the out-of-scope external
//! collaborator: this module owns the 299x299/~15%-overlap tiling geometry and a
//! narrow `TileClassifier` trait, grounded on the tiled-raster conventions of
//! `odin_image::tile_data`, generalized from TIFF raster tiles to a batch of classifier
//! input rects.

use crate::errors::{classifier_error, Result};
use crate::model::BBox;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub const TILE_SIZE: u32 = 299;
pub const TILE_OVERLAP_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSegment {
    pub bbox: BBox,
    pub score: f64,
}

/// sorted descending by score.
#[async_trait]
pub trait TileClassifier: Send + Sync {
    async fn classify(&self, image: &DynamicImage, roi: Option<BBox>) -> Result<Vec<ScoredSegment>>;
}

/// tile `roi` (or the full image if `None`) into `TILE_SIZE`-square rects overlapping by
/// `TILE_OVERLAP_FRACTION`, clipped to the image/ROI bounds. The last tile in each row/column
/// is pulled back flush against the boundary rather than padded, so every tile stays full
/// size.
pub fn tile_rects(img_width: u32, img_height: u32, roi: Option<BBox>) -> Vec<BBox> {
    let region = roi.unwrap_or(BBox { min_x: 0, min_y: 0, max_x: img_width, max_y: img_height });
    let stride = (TILE_SIZE as f64 * (1.0 - TILE_OVERLAP_FRACTION)).round().max(1.0) as u32;

    let mut rects = Vec::new();
    let mut y = region.min_y;
    loop {
        let y1 = (y + TILE_SIZE).min(region.max_y);
        let y0 = if y1 == region.max_y && y1 >= TILE_SIZE { y1 - TILE_SIZE.min(y1) } else { y };
        let mut x = region.min_x;
        loop {
            let x1 = (x + TILE_SIZE).min(region.max_x);
            let x0 = if x1 == region.max_x && x1 >= TILE_SIZE { x1 - TILE_SIZE.min(x1) } else { x };
            if x1 > x0 && y1 > y0 {
                rects.push(BBox { min_x: x0, min_y: y0, max_x: x1, max_y: y1 });
            }
            if x1 >= region.max_x { break; }
            x += stride;
        }
        if y1 >= region.max_y { break; }
        y += stride;
    }
    rects
}

/// no-op classifier for wiring/tests: always returns an empty segment list.
pub struct NullClassifier;

#[async_trait]
impl TileClassifier for NullClassifier {
    async fn classify(&self, _image: &DynamicImage, _roi: Option<BBox>) -> Result<Vec<ScoredSegment>> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    tiles: &'a [BBox],
}

#[derive(Deserialize)]
struct InferenceResponseEntry {
    bbox: BBox,
    score: f64,
}

/// POSTs the tile batch to a configured inference endpoint and parses a JSON array of
/// `(bbox, score)` - a narrow interface onto the classifier, not the model itself.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpClassifier { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl TileClassifier for HttpClassifier {
    async fn classify(&self, image: &DynamicImage, roi: Option<BBox>) -> Result<Vec<ScoredSegment>> {
        let tiles = tile_rects(image.width(), image.height(), roi);
        if tiles.is_empty() { return Ok(Vec::new()); }

        let response = self.client.post(&self.endpoint)
        .json(&InferenceRequest { tiles: &tiles })
        .send().await
        .map_err(|e| classifier_error(e))?;

        let entries: Vec<InferenceResponseEntry> = response.json().await.map_err(|e| classifier_error(e))?;
        let mut segments: Vec<ScoredSegment> = entries.into_iter()
        .map(|e| ScoredSegment { bbox: e.bbox, score: e.score })
        .collect();
        segments.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiling_covers_full_roi_without_gaps() {
        let roi = BBox { min_x: 0, min_y: 0, max_x: 1000, max_y: 600 };
        let rects = tile_rects(1000, 600, Some(roi));
        assert!(!rects.is_empty());
        for r in &rects {
            assert_eq!(r.max_x - r.min_x, TILE_SIZE.min(roi.max_x - roi.min_x));
        }
        let max_x_reached = rects.iter().map(|r| r.max_x).max().unwrap();
        let max_y_reached = rects.iter().map(|r| r.max_y).max().unwrap();
        assert_eq!(max_x_reached, roi.max_x);
        assert_eq!(max_y_reached, roi.max_y);
    }

    #[tokio::test]
    async fn null_classifier_returns_empty() {
        let classifier = NullClassifier;
        let img = DynamicImage::new_rgb8(10, 10);
        let segments = classifier.classify(&img, None).await.unwrap();
        assert!(segments.is_empty());
    }
}
