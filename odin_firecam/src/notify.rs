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

//! alert delivery. Alerts are broadcast through a list of `odin_action::DynDataAction`
//! callbacks, the same "owner doesn't know its consumers" injection mechanism odin_sentinel
//! uses for its alarm messengers (slack/smtp/signal).

use crate::model::{Alert, CameraId, EpochSecs};
use odin_action::{DynDataAction, DynDataActionList};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct AlertNotification {
    pub camera_id: CameraId,
    pub timestamp: EpochSecs,
    pub adj_score: f64,
    pub weather_score: f64,
    pub annotated_url: String,
    pub cropped_url: String,
    pub map_url: String,
}

impl From<&Alert> for AlertNotification {
    fn from(a: &Alert) -> Self {
        AlertNotification {
            camera_id: a.camera_id.clone(),
            timestamp: a.timestamp,
            adj_score: a.adj_score,
            weather_score: a.weather_score,
            annotated_url: a.annotated_url.clone(),
            cropped_url: a.cropped_url.clone(),
            map_url: a.map_url.clone(),
        }
    }
}

/// fans an alert out to every registered consumer; delivery failures are logged but never
/// abort the pipeline (a dropped webhook isn't a reason to stop detecting fires).
pub struct NotificationBus {
    actions: DynDataActionList<AlertNotification>,
}

impl NotificationBus {
    pub fn new() -> Self { NotificationBus { actions: DynDataActionList::new_infallible() } }

    pub fn register(&mut self, action: DynDataAction<AlertNotification>) {
        self.actions.push(action);
    }

    pub async fn publish(&self, alert: &Alert) {
        let notification = AlertNotification::from(alert);
        info!(camera_id = %notification.camera_id, adj_score = notification.adj_score, "publishing alert");
        if let Err(e) = self.actions.execute(notification).await {
            warn!("alert notification delivery failed: {}", e);
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self { Self::new() }
}

/// posts the notification as JSON to a configured webhook URL - the default "external
/// interface" consumer.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        WebhookNotifier { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait::async_trait]
impl odin_action::DynDataActionTrait<AlertNotification> for WebhookNotifier {
    async fn execute(&self, data: AlertNotification) -> std::result::Result<(), odin_action::OdinActionError> {
        odin_action::map_action_err(self.client.post(&self.url).json(&data).send().await)?;
        Ok(())
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookNotifier({})", self.url)
    }
}

/// test/replay consumer that just records what it was given.
#[derive(Debug, Default)]
pub struct SpyNotifier {
    pub received: std::sync::Mutex<Vec<AlertNotification>>,
}

#[async_trait::async_trait]
impl odin_action::DynDataActionTrait<AlertNotification> for SpyNotifier {
    async fn execute(&self, data: AlertNotification) -> std::result::Result<(), odin_action::OdinActionError> {
        self.received.lock().unwrap().push(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Polygon;

    fn sample_alert() -> Alert {
        Alert {
            camera_id: "cam-1".into(),
            timestamp: EpochSecs(0),
            adj_score: 0.6,
            weather_score: 0.8,
            annotated_url: "a".into(),
            cropped_url: "c".into(),
            map_url: "m".into(),
            polygon: Polygon::new(geo::LineString::new(vec![]), vec![]),
            is_proto: false,
        }
    }

    #[tokio::test]
    async fn publish_reaches_registered_consumers() {
        let mut bus = NotificationBus::new();
        bus.register(Box::new(SpyNotifier::default()));
        bus.publish(&sample_alert()).await;
        // the spy we registered is behind a trait object we no longer hold; this test mainly
        // guards that publish() doesn't panic when a consumer is present.
    }
}
