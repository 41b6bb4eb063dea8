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

//! worker-group resizing. The Fleet Controller is the only caller;
//! this module owns the trait plus the rate-limit/idempotence wrapper so that policy lives in
//! one place instead of being re-checked at every `fleet.rs` call site.

use crate::errors::Result;
use crate::model::EpochSecs;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

#[async_trait]
pub trait GroupOrchestrator: Send + Sync {
    async fn get_group(&self, name: &str) -> Result<u32>;
    async fn resize(&self, name: &str, size: u32) -> Result<()>;
}

pub const RESIZE_RATE_LIMIT_SECS: i64 = 5 * 60;

/// wraps a `GroupOrchestrator` so `maybe_resize` is rate-limited to once per
/// `RESIZE_RATE_LIMIT_SECS` and a no-op when the target already matches the current size.
pub struct ThrottledOrchestrator<O: GroupOrchestrator> {
    inner: O,
    last_call: std::sync::Mutex<HashMap<String, EpochSecs>>,
}

impl<O: GroupOrchestrator> ThrottledOrchestrator<O> {
    pub fn new(inner: O) -> Self {
        ThrottledOrchestrator { inner, last_call: std::sync::Mutex::new(HashMap::new()) }
    }

    /// resizes `name` to `target` unless a call for `name` happened within the rate-limit
    /// window or the orchestrator already reports `target` as the current size.
    pub async fn maybe_resize(&self, name: &str, target: u32, now: EpochSecs) -> Result<bool> {
        {
            let last_call = self.last_call.lock().unwrap();
            if let Some(last) = last_call.get(name) {
                if now.minus(*last) < RESIZE_RATE_LIMIT_SECS {
                    return Ok(false);
                }
            }
        }

        let current = self.inner.get_group(name).await?;
        if current == target {
            return Ok(false);
        }

        self.inner.resize(name, target).await?;
        self.last_call.lock().unwrap().insert(name.to_string(), now);
        info!(group = name, from = current, to = target, "resized worker group");
        Ok(true)
    }
}

/// HTTP-backed orchestrator client - the default "external interface" consumer.
pub struct HttpOrchestrator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrchestrator {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpOrchestrator { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl GroupOrchestrator for HttpOrchestrator {
    async fn get_group(&self, name: &str) -> Result<u32> {
        let resp = self.client.get(format!("{}/groups/{}", self.base_url, name)).send().await?;
        Ok(resp.json().await?)
    }

    async fn resize(&self, name: &str, size: u32) -> Result<()> {
        self.client.post(format!("{}/groups/{}/resize", self.base_url, name))
        .json(&size)
        .send().await?;
        Ok(())
    }
}

/// in-memory test/replay double.
pub struct LoggingOrchestrator {
    sizes: std::sync::Mutex<HashMap<String, u32>>,
}

impl LoggingOrchestrator {
    pub fn new() -> Self { LoggingOrchestrator { sizes: std::sync::Mutex::new(HashMap::new()) } }
}

impl Default for LoggingOrchestrator {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl GroupOrchestrator for LoggingOrchestrator {
    async fn get_group(&self, name: &str) -> Result<u32> {
        Ok(*self.sizes.lock().unwrap().get(name).unwrap_or(&0))
    }

    async fn resize(&self, name: &str, size: u32) -> Result<()> {
        self.sizes.lock().unwrap().insert(name.to_string(), size);
        Ok(())
    }
}

/// the binaries pick a concrete `GroupOrchestrator` at startup depending on whether
/// `orchestrator_base_url` is configured; `FleetController` is generic over `O`, so this one
/// enum lets `main()` build a single concrete type regardless of which branch it took.
pub enum ConfiguredOrchestrator {
    Http(HttpOrchestrator),
    Logging(LoggingOrchestrator),
}

#[async_trait]
impl GroupOrchestrator for ConfiguredOrchestrator {
    async fn get_group(&self, name: &str) -> Result<u32> {
        match self {
            ConfiguredOrchestrator::Http(o) => o.get_group(name).await,
            ConfiguredOrchestrator::Logging(o) => o.get_group(name).await,
        }
    }

    async fn resize(&self, name: &str, size: u32) -> Result<()> {
        match self {
            ConfiguredOrchestrator::Http(o) => o.resize(name, size).await,
            ConfiguredOrchestrator::Logging(o) => o.resize(name, size).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idempotent_when_target_matches_current() {
        let orch = ThrottledOrchestrator::new(LoggingOrchestrator::new());
        let now = EpochSecs(0);
        assert!(!orch.maybe_resize("detect", 0, now).await.unwrap());
    }

    #[tokio::test]
    async fn rate_limited_within_window() {
        let orch = ThrottledOrchestrator::new(LoggingOrchestrator::new());
        let t0 = EpochSecs(0);
        assert!(orch.maybe_resize("detect", 4, t0).await.unwrap());

        let t1 = t0.plus_secs(60);
        assert!(!orch.maybe_resize("detect", 8, t1).await.unwrap());

        let t2 = t0.plus_secs(RESIZE_RATE_LIMIT_SECS + 1);
        assert!(orch.maybe_resize("detect", 8, t2).await.unwrap());
    }
}
