//! Completion notifications.
//!
//! When a task reaches a terminal state the notifier PATCHes the catalog
//! record for the video so downstream consumers can switch to the HLS
//! manifest. Notification is fire-and-forget: failures are logged and never
//! affect the task outcome.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::Serialize;

use crate::config::NotifyConfig;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ConversionUpdate {
    hls_converted: bool,
    conversion_time_secs: u64,
}

pub struct Notifier {
    client: Client,
    base_url: Option<String>,
}

impl Notifier {
    pub fn new(config: &NotifyConfig) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config
                .base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Report the outcome of a conversion. Errors are logged, not propagated.
    pub async fn notify_conversion(&self, video_id: &str, converted: bool, elapsed_secs: u64) {
        let Some(base_url) = &self.base_url else {
            return;
        };

        match self
            .send_update(base_url, video_id, converted, elapsed_secs)
            .await
        {
            Ok(()) => {
                tracing::info!(video_id, converted, "catalog notified");
            }
            Err(e) => {
                tracing::warn!(video_id, "failed to notify catalog: {}", e);
            }
        }
    }

    async fn send_update(
        &self,
        base_url: &str,
        video_id: &str,
        converted: bool,
        elapsed_secs: u64,
    ) -> Result<()> {
        let url = format!("{base_url}/videos/{video_id}.json");

        let response = self
            .client
            .patch(&url)
            .json(&ConversionUpdate {
                hls_converted: converted,
                conversion_time_secs: elapsed_secs,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("catalog update failed ({}): {}", status, body);
        }

        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.base_url.is_some()
    }
}
