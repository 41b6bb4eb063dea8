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

//! the fixed coastline polygon viewshed triangles get clipped against. Embedded directly
//! via `include_bytes!` rather than routed through `odin_build`'s asset-manifest/build-script
//! machinery: it's a single small, version-controlled fixture, not a per-deployment resource
//! that needs encryption or conditional embedding.

use crate::errors::Result;
use crate::model::Polygon;
use geo::{Coord, LineString};

const COASTLINE_RON: &[u8] = include_bytes!("../assets/coastline.ron");

/// the land polygon used as the fixed operand of `geometry::intersect_land`.
pub fn coastline() -> Result<Polygon> {
    let coords: Vec<(f64, f64)> = ron::de::from_bytes(COASTLINE_RON)?;
    let line = LineString::new(coords.into_iter().map(|(x, y)| Coord { x, y }).collect());
    Ok(Polygon::new(line, vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_coastline_parses_into_a_closed_ring() {
        let land = coastline().unwrap();
        let coords: Vec<_> = land.exterior().coords().collect();
        assert!(coords.len() > 3);
        assert_eq!(coords.first(), coords.last());
    }
}
