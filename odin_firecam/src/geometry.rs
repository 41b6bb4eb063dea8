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

//! viewshed geometry. Built on `geo::Polygon<f64>` and the angle/coordinate value
//! types from `odin_common::angle`/`odin_common::geo`, following the same "wrap 3rd party
//! geo types with our own value semantics" convention odin_common itself uses.

use crate::model::{BBox, IgnoredView, Polygon};
use geo::{BooleanOps, Coord, LineString};
use odin_common::angle::{normalize_180, normalize_360};

/// ~40 statute miles, expressed as the 0.6deg-of-latitude leg length used throughout the
/// camera-network literature this spec is grounded on.
pub const VIEWSHED_LEG_DEGREES: f64 = 0.6;

/// an angular interval `[start,start+width)` expressed in a rotated frame so wrap-around
/// at 360deg never has to be special cased by callers - the frame is rotated so the interval
/// of interest starts at 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularInterval {
    pub center: f64,
    pub width: f64,
}

impl AngularInterval {
    pub fn new(center: f64, width: f64) -> Self {
        AngularInterval { center: normalize_360(center), width }
    }

    fn start(&self) -> f64 { normalize_360(self.center - self.width / 2.0) }

    /// does this interval overlap `other`, considering wrap-around at 360deg?
    /// we rotate both intervals into a frame where `self` starts at 0, which turns the
    /// wrap-around case into an ordinary 1D interval overlap test.
    pub fn overlaps(&self, other: &AngularInterval) -> bool {
        let rot = self.start();
        let a_start = 0.0;
        let a_end = self.width;
        let b_start = normalize_360(other.start() - rot);
        let b_end = b_start + other.width;

        // `other`'s rotated interval may itself wrap past 360 - split and test both pieces
        if b_end <= 360.0 {
            intervals_overlap(a_start, a_end, b_start, b_end)
        } else {
            intervals_overlap(a_start, a_end, b_start, 360.0)
            || intervals_overlap(a_start, a_end, 0.0, b_end - 360.0)
        }
    }
}

fn intervals_overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> bool { a0 < b1 && b0 < a1 }

/// `heading = (centralHeading + ((minX+maxX)/2)/imgWidth*fov - fov/2) mod 360`
/// `angularWidth = ceil((maxX-minX)/imgWidth*fov + 10deg)` (the +10deg absorbs alignment error)
pub fn heading_range(central_heading: f64, fov: f64, bbox: &BBox, img_width: u32) -> AngularInterval {
    let w = img_width as f64;
    let center_px = bbox.center_x();
    let heading = normalize_360(central_heading + (center_px / w) * fov - fov / 2.0);
    let angular_width = ((bbox.width() as f64 / w) * fov + 10.0).ceil();
    AngularInterval::new(heading, angular_width)
}

/// isoceles triangle with apex at the camera, legs extending `VIEWSHED_LEG_DEGREES` of
/// latitude (~40mi), symmetric about `interval.center` by `interval.width/2`.
pub fn viewshed_triangle(camera_lat: f64, camera_lon: f64, interval: &AngularInterval) -> Polygon {
    let half = interval.width / 2.0;
    let left_heading = normalize_360(interval.center - half);
    let right_heading = normalize_360(interval.center + half);

    let apex = Coord { x: camera_lon, y: camera_lat };
    let left = destination_point(camera_lat, camera_lon, left_heading, VIEWSHED_LEG_DEGREES);
    let right = destination_point(camera_lat, camera_lon, right_heading, VIEWSHED_LEG_DEGREES);

    Polygon::new(LineString::new(vec![apex, left, right, apex]), vec![])
}

/// flat-earth destination point approximation in degrees, sufficient at the ~40mi viewshed
/// scale and consistent with the rest of this module staying in plain degrees rather than
/// ECEF round-trips.
fn destination_point(lat: f64, lon: f64, heading_deg: f64, dist_deg: f64) -> Coord<f64> {
    let heading = heading_deg.to_radians();
    let dlat = dist_deg * heading.cos();
    let dlon = dist_deg * heading.sin() / lat.to_radians().cos().max(1e-6);
    Coord { x: normalize_180(lon + dlon), y: lat + dlat }
}

/// a zero-area (point) intersection counts as no intersection.
fn nonzero_intersection(a: &Polygon, b: &Polygon) -> Option<Polygon> {
    let mp = a.intersection(b);
    let mut best: Option<Polygon> = None;
    let mut best_area = 0.0f64;
    for p in mp.0 {
        let area = p.unsigned_area();
        if area > 1e-12 && area > best_area {
            best_area = area;
            best = Some(p);
        }
    }
    best
}

/// clip the candidate triangle against the fixed coastline polygon; `None` if the
/// intersection is empty or degenerate.
pub fn intersect_land(triangle: &Polygon, coastline: &Polygon) -> Option<Polygon> {
    nonzero_intersection(triangle, coastline)
}

/// a detection still considered "recent" relative to `now`.
pub struct RecentDetection<'a> {
    pub polygon: &'a Polygon,
    pub timestamp_secs: i64,
}

pub const RECENT_DETECTION_WINDOW_SECS: i64 = 15 * 60;

/// intersect `triangle` with every detection whose timestamp is within the last 15 minutes;
/// if more than one matches, their source polygons accumulate.
pub fn intersect_recent_detections<'a>(
    triangle: &Polygon,
    now_secs: i64,
    recent: impl IntoIterator<Item = RecentDetection<'a>>,
) -> Option<(Polygon, Vec<Polygon>)> {
    let mut result: Option<Polygon> = None;
    let mut sources: Vec<Polygon> = Vec::new();

    for det in recent {
        if now_secs - det.timestamp_secs > RECENT_DETECTION_WINDOW_SECS { continue; }
        let base = result.as_ref().unwrap_or(triangle);
        if let Some(intersection) = nonzero_intersection(base, det.polygon) {
            if sources.is_empty() { sources.push(triangle.clone()); }
            sources.push(det.polygon.clone());
            result = Some(intersection);
        }
    }

    result.map(|polygon| (polygon, sources))
}

/// an ignored view matches iff its angular interval overlaps the candidate's (care with
/// wrap-around at 360deg, handled by `AngularInterval::overlaps`). Returns the matching view
/// so the caller can increment its `countIgnored`.
pub fn ignored_sector<'a>(
    views: &'a [IgnoredView],
    camera_id: &str,
    candidate: &AngularInterval,
) -> Option<&'a IgnoredView> {
    views.iter().find(|v| {
            v.camera_id == camera_id
            && AngularInterval::new(v.heading_center, v.angular_width).overlaps(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_range_matches_scenario_3() {
        // camera a-n-mobo-c: heading 0deg, fov 110deg, width 3072; segment minX=1400,maxX=1700
        let bbox = BBox { min_x: 1400, min_y: 0, max_x: 1700, max_y: 100 };
        let interval = heading_range(0.0, 110.0, &bbox, 3072);
        assert!((interval.center - 5.0).abs() < 1.0, "heading was {}", interval.center);
        assert!((interval.width - 21.0).abs() < 1.0, "width was {}", interval.width);
    }

    #[test]
    fn ignored_sector_suppresses_overlapping_candidate() {
        let views = vec![IgnoredView {
                camera_id: "a-n-mobo-c".into(),
                heading_center: 10.0,
                angular_width: 30.0,
                count_ignored: 0,
                update_timestamp: crate::model::EpochSecs(0),
        }];
        let candidate = AngularInterval::new(5.0, 21.0);
        let hit = ignored_sector(&views, "a-n-mobo-c", &candidate);
        assert!(hit.is_some());
    }

    #[test]
    fn angular_interval_wraparound() {
        let a = AngularInterval::new(355.0, 20.0); // 345..365 i.e. 345..360, 0..5
        let b = AngularInterval::new(2.0, 4.0); // 0..4
        assert!(a.overlaps(&b));
    }

    #[test]
    fn heading_range_round_trip() {
        let interval = AngularInterval::new(123.0, 40.0);
        let start = interval.start();
        let round_tripped = AngularInterval::new(start + interval.width / 2.0, interval.width);
        assert!((round_tripped.center - interval.center).abs() < 1e-9);
        assert!((round_tripped.width - interval.width).abs() < 1e-9);
    }
}
