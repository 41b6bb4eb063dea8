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

//! a wildfire detection pipeline: fixed and PTZ camera feeds are tile-classified, filtered
//! against each camera's own historical scores, qualified by viewshed geometry and weather,
//! and composed into annotated alerts delivered to downstream consumers. See `firecam.ron` /
//! `firecam_store.ron` / `firecam_weather.ron` / `firecam_notify.ron` under `local/config/`
//! for the runtime configuration this crate's two binaries (`firecam_detector`,
//! `firecam_replay`) load at startup.

pub mod model;
pub mod errors;
pub mod config;
pub mod logging;

pub mod store;
pub mod image_source;
pub mod classifier;
pub mod historical_filter;
pub mod geometry;
pub mod policy;
pub mod weather;
pub mod composer;
pub mod notify;
pub mod orchestrator;
pub mod blob;
pub mod pipeline;
pub mod scheduler;
pub mod fleet;

pub mod assets;
