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

//! alert composition: crop, PTZ alignment, box/watermark annotation, video
//! sequencing, map rendering, blob upload and weather scoring. Box drawing uses
//! `imageproc::drawing::draw_hollow_rect_mut`, the same helper `odin_image::draw_tile_grid`
//! draws with; subprocess invocation of `ffmpeg` follows `odin_sentinel::signal_cmd`'s
//! `tokio::process::Command` spawn/wait-status convention for shelling out to an external
//! executable.

use crate::blob::BlobStore;
use crate::errors::{op_failed, Result};
use crate::model::{BBox, EpochSecs, Polygon};
use crate::weather::{feature_vector, FeatureVector, WeatherProvider, WeatherScorer};
use ab_glyph::Font;
use image::{DynamicImage, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use rustfft::{num_complex::Complex32, FftPlanner};
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const CROP_WIDTH: u32 = 800;
pub const CROP_HEIGHT: u32 = 600;
pub const PTZ_MAX_DX: i32 = 20;
pub const PTZ_MAX_DY: i32 = 10;
pub const VIDEO_FPS: u32 = 25;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const ORANGE: Rgba<u8> = Rgba([255, 165, 0, 255]);

/// a single archive frame participating in the sequence, tagged by its role relative to the
/// triggering frame so the right box color and crop-alignment offset get applied.
pub struct SequenceFrame {
    pub image: DynamicImage,
    pub timestamp: EpochSecs,
    pub role: FrameRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Prior,
    Trigger,
    After,
}

impl FrameRole {
    fn box_color(self) -> Rgba<u8> {
        match self {
            FrameRole::Prior => YELLOW,
            FrameRole::Trigger => RED,
            FrameRole::After => ORANGE,
        }
    }
}

/// centers an 800x600 window on `bbox`, clipped to stay inside the source image.
pub fn crop_roi(img: &DynamicImage, bbox: &BBox) -> DynamicImage {
    let cx = bbox.center_x();
    let cy = (bbox.min_y as f64 + bbox.max_y as f64) / 2.0;

    let w = CROP_WIDTH.min(img.width());
    let h = CROP_HEIGHT.min(img.height());

    let x0 = (cx - w as f64 / 2.0).round().max(0.0).min((img.width() - w) as f64) as u32;
    let y0 = (cy - h as f64 / 2.0).round().max(0.0).min((img.height() - h) as f64) as u32;

    img.crop_imm(x0, y0, w, h)
}

/// translation-only phase correlation, returning `(dx, dy)` in pixels such that shifting
/// `frame` by `(dx, dy)` best aligns it to `reference`. Images must be the same size (the
/// caller crops both to the same window first). Returns `None` if the correlation peak is
/// outside the `±(PTZ_MAX_DX, PTZ_MAX_DY)` envelope.
pub fn phase_correlation_shift(reference: &DynamicImage, frame: &DynamicImage) -> Option<(i32, i32)> {
    let w = reference.width().min(frame.width()) as usize;
    let h = reference.height().min(frame.height()) as usize;
    if w == 0 || h == 0 { return None; }

    let a = to_complex_grid(reference, w, h);
    let b = to_complex_grid(frame, w, h);

    let fa = fft2d(a, w, h, false);
    let fb = fft2d(b, w, h, false);

    // cross-power spectrum: conj(A) * B / |conj(A) * B|
    let mut cross: Vec<Complex32> = fa.iter().zip(fb.iter()).map(|(&x, &y)| {
            let prod = x.conj() * y;
            let mag = prod.norm();
            if mag > 1e-12 { prod / mag } else { Complex32::new(0.0, 0.0) }
    }).collect();

    let correlation = fft2d(std::mem::take(&mut cross), w, h, true);

    let mut best_idx = 0usize;
    let mut best_val = f32::MIN;
    for (i, c) in correlation.iter().enumerate() {
        if c.re > best_val { best_val = c.re; best_idx = i; }
    }

    let py = (best_idx / w) as i32;
    let px = (best_idx % w) as i32;

    // wrap into [-w/2, w/2) / [-h/2, h/2) so a peak near the origin in either direction reads
    // as a small signed shift rather than a shift near the full frame width/height.
    let dx = if px > w as i32 / 2 { px - w as i32 } else { px };
    let dy = if py > h as i32 / 2 { py - h as i32 } else { py };

    if dx.abs() > PTZ_MAX_DX || dy.abs() > PTZ_MAX_DY { None } else { Some((dx, dy)) }
}

fn to_complex_grid(img: &DynamicImage, w: usize, h: usize) -> Vec<Complex32> {
    let gray = img.to_luma8();
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let p = gray.get_pixel(x as u32, y as u32).0[0] as f32;
            out.push(Complex32::new(p, 0.0));
        }
    }
    out
}

/// separable row/column 2D FFT (forward or inverse) built out of 1D `rustfft` plans - rustfft
/// itself only transforms 1D sequences.
fn fft2d(mut data: Vec<Complex32>, width: usize, height: usize, inverse: bool) -> Vec<Complex32> {
    let mut planner = FftPlanner::new();
    let row_fft = if inverse { planner.plan_fft_inverse(width) } else { planner.plan_fft_forward(width) };
    let col_fft = if inverse { planner.plan_fft_inverse(height) } else { planner.plan_fft_forward(height) };

    for row in data.chunks_mut(width) {
        row_fft.process(row);
    }

    let mut columns: Vec<Complex32> = vec![Complex32::new(0.0, 0.0); width * height];
    for x in 0..width {
        let mut col: Vec<Complex32> = (0..height).map(|y| data[y * width + x]).collect();
        col_fft.process(&mut col);
        for (y, v) in col.into_iter().enumerate() { columns[y * width + x] = v; }
    }
    columns
}

/// draws a hollow box colored per the frame's role, plus a timestamp watermark top-left and a
/// product watermark bottom-left.
pub fn annotate_frame(img: &mut DynamicImage, bbox: &BBox, role: FrameRole, timestamp: EpochSecs) {
    let color = role.box_color();
    let rect = Rect::at(bbox.min_x as i32, bbox.min_y as i32)
    .of_size(bbox.width().max(1), bbox.height().max(1));

    match img {
        DynamicImage::ImageRgba8(buf) => draw_hollow_rect_mut(buf, rect, color),
        _ => {
            let mut rgba = img.to_rgba8();
            draw_hollow_rect_mut(&mut rgba, rect, color);
            *img = DynamicImage::ImageRgba8(rgba);
        }
    }
    watermark(img, &timestamp.to_string(), true);
    watermark(img, "odin_firecam", false);
}

const WATERMARK_PT_SIZE: f32 = 14.0;

/// draws `text` top-left or bottom-left (timestamp watermark top-left, product watermark
/// bottom-left). Uses the same `load_default_font`/`draw_text_mut` pairing
/// `odin_image::draw_tile_grid` uses; a missing font asset on disk (no packaged
/// `ODIN_ROOT/data/odin_image/DejaVuSansMono.ttf`, e.g. in a bare test environment) degrades
/// to a no-op rather than failing the whole candidate, since a watermark is cosmetic.
fn watermark(img: &mut DynamicImage, text: &str, top_left: bool) {
    let font = match odin_image::load_default_font() {
        Ok(f) => f,
        Err(_) => return,
    };
    let scale = match font.pt_to_px_scale(WATERMARK_PT_SIZE) {
        Some(s) => s,
        None => return,
    };
    let h = img.height() as i32;
    let (x, y) = if top_left { (4, 4) } else { (4, h - scale.y as i32 - 4) };

    let mut rgba = img.to_rgba8();
    imageproc::drawing::draw_text_mut(&mut rgba, Rgba([255, 255, 255, 255]), x, y, scale, &font, text);
    *img = DynamicImage::ImageRgba8(rgba);
}

/// encodes `frames` (already annotated, one second of dwell each, final frame repeated once)
/// into a 25fps MP4 via an `ffmpeg` subprocess, following the same spawn/wait-status pattern
/// `odin_sentinel::signal_cmd::SignalCmdAlarmMessenger` uses to shell out to `signal-cli`.
pub async fn encode_video(frame_paths: &[PathBuf], out_path: &Path) -> Result<()> {
    if frame_paths.is_empty() { return Err(op_failed("no frames to encode")); }

    let list_path = out_path.with_extension("concat.txt");
    let mut list_contents = String::new();
    for p in frame_paths {
        list_contents.push_str(&format!("file '{}'\nduration 1\n", p.display()));
    }
    if let Some(last) = frame_paths.last() {
        list_contents.push_str(&format!("file '{}'\n", last.display()));
    }
    tokio::fs::write(&list_path, list_contents).await?;

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
    .arg("-f").arg("concat")
    .arg("-safe").arg("0")
    .arg("-i").arg(&list_path)
    .arg("-r").arg(VIDEO_FPS.to_string())
    .arg("-pix_fmt").arg("yuv420p")
    .arg(out_path);

    match cmd.spawn() {
        Ok(mut child) => match child.wait().await {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(op_failed(format!("ffmpeg exited with {}", status))),
            Err(e) => Err(op_failed(e)),
        },
        Err(e) => Err(op_failed(e)),
    }
}

/// renders the camera's base map with every source polygon at 20% red alpha and, if more than
/// one source contributed, the confirmed polygon at 30% blue alpha, cropped centered on the
/// confirmed polygon's centroid.
pub fn render_map(base_map: &DynamicImage, source_polygons: &[Polygon], confirmed: &Polygon, to_pixel: impl Fn(f64, f64) -> (i32, i32)) -> DynamicImage {
    use geo::Centroid;

    let mut map = base_map.to_rgba8();
    for poly in source_polygons {
        draw_polygon_alpha(&mut map, poly, &to_pixel, Rgba([255, 0, 0, 51])); // 20% of 255 ~ 51
    }
    if source_polygons.len() > 1 {
        draw_polygon_alpha(&mut map, confirmed, &to_pixel, Rgba([0, 0, 255, 77])); // 30% of 255 ~ 77
    }

    let mut out = DynamicImage::ImageRgba8(map);
    if let Some(centroid) = confirmed.centroid() {
        let (cx, cy) = to_pixel(centroid.x(), centroid.y());
        let bbox = BBox {
            min_x: cx.max(0) as u32, min_y: cy.max(0) as u32,
            max_x: (cx.max(0) as u32) + 1, max_y: (cy.max(0) as u32) + 1,
        };
        out = crop_roi(&out, &bbox);
    }
    out
}

fn draw_polygon_alpha(img: &mut image::RgbaImage, poly: &Polygon, to_pixel: &impl Fn(f64, f64) -> (i32, i32), color: Rgba<u8>) {
    let points: Vec<(i32, i32)> = poly.exterior().coords().map(|c| to_pixel(c.x, c.y)).collect();
    for w in points.windows(2) {
        draw_alpha_line(img, w[0], w[1], color);
    }
}

fn draw_alpha_line(img: &mut image::RgbaImage, from: (i32, i32), to: (i32, i32), color: Rgba<u8>) {
    imageproc::drawing::draw_line_segment_mut(img, (from.0 as f32, from.1 as f32), (to.0 as f32, to.1 as f32), color);
}

pub struct ComposedArtifacts {
    pub video_uri: String,
    pub annotated_image_uri: String,
    pub map_uri: String,
    pub weather_score: f64,
}

/// input to a single Alert Composer invocation - already-classified QUALIFIED candidate data
/// plus the sequence of frames the pipeline assembled (up to four prior + trigger + one after).
pub struct ComposeRequest<'a> {
    pub camera_id: &'a str,
    pub timestamp: EpochSecs,
    pub bbox: BBox,
    pub full_res_frame: &'a DynamicImage,
    pub sequence: Vec<SequenceFrame>,
    pub is_ptz: bool,
    pub base_map: &'a DynamicImage,
    pub source_polygons: &'a [Polygon],
    pub confirmed_polygon: &'a Polygon,
    pub img_score: f64,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub camera_lat: f64,
    pub camera_lon: f64,
    pub to_pixel: Box<dyn Fn(f64, f64) -> (i32, i32) + Send + Sync + 'a>,
}

/// crops, aligns, annotates, and sequences a video, renders the full-res
/// annotated still, renders the map, uploads all three artifacts, then scores weather. The
/// Detection/Alert insert is the pipeline's responsibility since it owns the Store
/// transaction boundary.
pub struct AlertComposer {
    pub blob: Box<dyn BlobStore>,
    pub weather_provider: Box<dyn WeatherProvider>,
    pub weather_scorer: Box<dyn WeatherScorer>,
}

impl AlertComposer {
    pub fn new(blob: Box<dyn BlobStore>, weather_provider: Box<dyn WeatherProvider>, weather_scorer: Box<dyn WeatherScorer>) -> Self {
        AlertComposer { blob, weather_provider, weather_scorer }
    }

    pub async fn compose(&self, req: ComposeRequest<'_>, work_dir: &Path) -> Result<ComposedArtifacts> {
        tokio::fs::create_dir_all(work_dir).await?;

        let trigger_crop = crop_roi(req.full_res_frame, &req.bbox);
        let mut frame_paths = Vec::with_capacity(req.sequence.len());

        for (i, frame) in req.sequence.iter().enumerate() {
            let mut crop = crop_roi(&frame.image, &req.bbox);
            if req.is_ptz && frame.role != FrameRole::Trigger {
                match phase_correlation_shift(&trigger_crop, &crop) {
                    Some((dx, dy)) => {
                        crop = shift_image(&crop, dx, dy);
                    }
                    None => continue, // correlation did not converge - drop this frame from the sequence
                }
            }
            annotate_frame(&mut crop, &req.bbox, frame.role, frame.timestamp);

            let path = work_dir.join(format!("seq_{:02}.jpg", i));
            crop.save(&path)?;
            frame_paths.push(path);
        }

        let video_path = work_dir.join("alert.mp4");
        encode_video(&frame_paths, &video_path).await?;

        let mut annotated = req.full_res_frame.clone();
        annotate_frame(&mut annotated, &req.bbox, FrameRole::Trigger, req.timestamp);
        let annotated_path = work_dir.join("annotated.jpg");
        annotated.save(&annotated_path)?;

        let map = render_map(req.base_map, req.source_polygons, req.confirmed_polygon, &*req.to_pixel);
        let map_path = work_dir.join("map.jpg");
        map.save(&map_path)?;

        let dest_prefix = format!("{}/{}", req.camera_id, req.timestamp.datetime().format("%Y-%m-%d"));
        let video_uri = self.blob.copy_file(&video_path, &dest_prefix).await?;
        let annotated_image_uri = self.blob.copy_file(&annotated_path, &dest_prefix).await?;
        let map_uri = self.blob.copy_file(&map_path, &dest_prefix).await?;

        let weather_score = self.score_weather(&req).await;

        Ok(ComposedArtifacts { video_uri, annotated_image_uri, map_uri, weather_score })
    }

    /// step 8: a weather-fetch failure short-circuits to a pass-through `1.0` rather than
    /// aborting the whole candidate.
    async fn score_weather(&self, req: &ComposeRequest<'_>) -> f64 {
        let centroid_obs = self.weather_provider.observation_at(req.centroid_lat, req.centroid_lon, req.timestamp).await;
        let camera_obs = self.weather_provider.observation_at(req.camera_lat, req.camera_lon, req.timestamp).await;

        match (centroid_obs, camera_obs) {
            (Ok(centroid), Ok(_camera)) => {
                let fv: FeatureVector = feature_vector(req.img_score, req.source_polygons.len(), &centroid);
                self.weather_scorer.score(&fv)
            }
            _ => 1.0,
        }
    }
}

fn shift_image(img: &DynamicImage, dx: i32, dy: i32) -> DynamicImage {
    let w = img.width() as i32;
    let h = img.height() as i32;
    let x0 = dx.max(0).min(w);
    let y0 = dy.max(0).min(h);
    let crop_w = (w - dx.abs()).max(1) as u32;
    let crop_h = (h - dy.abs()).max(1) as u32;
    img.crop_imm(x0 as u32, y0 as u32, crop_w.min(img.width()), crop_h.min(img.height()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_roi_centers_on_bbox_and_clamps_to_image() {
        let img = DynamicImage::new_rgb8(1000, 700);
        let bbox = BBox { min_x: 10, min_y: 10, max_x: 50, max_y: 50 };
        let cropped = crop_roi(&img, &bbox);
        assert_eq!(cropped.width(), CROP_WIDTH);
        assert_eq!(cropped.height(), CROP_HEIGHT);
    }

    #[test]
    fn phase_correlation_identity_shift_is_zero() {
        let mut img = image::RgbImage::new(64, 64);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = ((x * 7 + y * 13) % 256) as u8;
            *p = image::Rgb([v, v, v]);
        }
        let dynamic = DynamicImage::ImageRgb8(img);
        let (dx, dy) = phase_correlation_shift(&dynamic, &dynamic).unwrap();
        assert_eq!((dx, dy), (0, 0));
    }

    #[test]
    fn frame_role_box_colors_match_spec() {
        assert_eq!(FrameRole::Prior.box_color(), YELLOW);
        assert_eq!(FrameRole::Trigger.box_color(), RED);
        assert_eq!(FrameRole::After.box_color(), ORANGE);
    }
}
