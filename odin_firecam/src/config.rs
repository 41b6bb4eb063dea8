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

//! config lookup. Reimplements the `config_local`-feature lookup
//! convention of `odin_config::config_from_local_file` directly: `«local-root»/config/«id».ron`,
//! where `local-root` is `$ODIN_LOCAL` or `./local` if unset. We don't depend on `odin_config`
//! itself here - the copy of that crate retrieved into this workspace has a `lib.rs` that
//! references `mod errors;`/`pub mod prelude;` with no corresponding source files, so it can't
//! build. Everything else about the convention (RON, same env var, same `config/<id>.ron`
//! layout) is preserved so the on-disk templates under `local/config/` stay interchangeable
//! with what any other `odin_*` binary expects.

use crate::errors::{config_error, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs::File;
use std::io::Read as _;
use std::path::Path;

fn local_dir() -> String {
    match std::env::var("ODIN_LOCAL") {
        Ok(local_root) => {
            if local_root.ends_with(std::path::MAIN_SEPARATOR) {
                if let Ok(cwd) = std::env::current_dir() {
                    if let Some(dir) = cwd.file_name() {
                        return format!("{local_root}{}", dir.to_string_lossy());
                    }
                }
            }
            local_root
        }
        _ => "./local".to_string(),
    }
}

/// loads and deserializes `«local-root»/config/«id».ron`.
pub fn config_for<C>(id: &str) -> Result<C>
where
C: for<'a> Deserialize<'a>,
{
    let pathname = format!("{}/config/{}.ron", local_dir(), id);
    let path: &Path = Path::new(&pathname);
    if !path.is_file() {
        return Err(config_error(format!("config file not found: {}", pathname)));
    }

    let mut file = File::open(path)?;
    let mut data = Vec::with_capacity(file.metadata().map(|m| m.len() as usize).unwrap_or(0));
    file.read_to_end(&mut data)?;
    Ok(ron::de::from_bytes(&data)?)
}

/// the fleet: cameras, diurnal window, retention/dedup constants an operator may want to tune.
#[derive(Debug, Clone, Deserialize)]
pub struct FirecamConfig {
    pub cameras: Vec<CameraConfig>,
    /// timezone `detect_start_hour`/`detect_end_hour` and the daily post-work day key are
    /// resolved in, e.g. `"America/Los_Angeles"` - the fleet's cameras are all in one region,
    /// so one timezone covers the whole roster.
    pub timezone: Tz,
    /// local hour [0,24) the fleet switches from `archive` to `detect` mode.
    pub detect_start_hour: u32,
    /// local hour [0,24) the fleet switches from `detect` back towards `archive`/`inactive`.
    pub detect_end_hour: u32,
    pub num_workers: usize,
    pub heartbeat_path: Option<String>,
    /// inference endpoint `HttpClassifier` posts tile batches to.
    pub classifier_endpoint: String,
    /// the fleet group name resized via `GroupOrchestrator`.
    pub orchestrator_base_url: Option<String>,
    pub model_id: String,
    pub blob: BlobConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub url: String,
    pub camera_type: String,
    pub heading: Option<f64>,
    pub fov: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub dormant: bool,
    pub is_prototype: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub endpoint: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub webhook_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub public_base_url: Option<String>,
    pub local_root: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_a_config_error() {
        let dir = std::env::temp_dir().join(format!("odin_firecam_config_test_{}", std::process::id()));
        unsafe { std::env::set_var("ODIN_LOCAL", dir.to_string_lossy().to_string()) };
        let result: Result<StoreConfig> = config_for("does_not_exist");
        assert!(result.is_err());
        unsafe { std::env::remove_var("ODIN_LOCAL") };
    }

    #[test]
    fn local_dir_falls_back_to_dot_local_when_unset() {
        unsafe { std::env::remove_var("ODIN_LOCAL") };
        assert_eq!(local_dir(), "./local");
    }
}
