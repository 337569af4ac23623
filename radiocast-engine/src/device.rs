//! Remote audio device control
//!
//! The engine never renders audio. It only asks the device to change volume
//! or stop, and every duck is paired with a restore by the caller.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Set output volume (0-100)
    async fn set_volume(&self, percent: u8) -> Result<()>;

    /// Stop whatever the device is playing, optionally fading out first
    async fn stop_playback(&self, fade_out: Option<Duration>) -> Result<()>;
}

/// Device used when no bridge is configured; commands are only logged
#[derive(Debug, Default, Clone)]
pub struct LoggingDevice;

#[async_trait]
impl DeviceControl for LoggingDevice {
    async fn set_volume(&self, percent: u8) -> Result<()> {
        debug!(percent, "device volume (no bridge configured)");
        Ok(())
    }

    async fn stop_playback(&self, fade_out: Option<Duration>) -> Result<()> {
        debug!(fade_ms = fade_out.map(|d| d.as_millis() as u64), "device stop (no bridge configured)");
        Ok(())
    }
}

#[derive(Serialize)]
struct VolumeCommand {
    percent: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopCommand {
    fade_ms: u64,
}

/// HTTP bridge to the player device
///
/// - `POST {base}/volume` `{"percent": 40}`
/// - `POST {base}/stop` `{"fadeMs": 1200}`
pub struct HttpDeviceBridge {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceBridge {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Device(e.to_string()))?;

        info!("Device bridge at {}", base_url);
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Device(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Device(format!("{} returned {}: {}", url, status, text)));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceControl for HttpDeviceBridge {
    async fn set_volume(&self, percent: u8) -> Result<()> {
        debug!(percent, "setting device volume");
        self.post("volume", &VolumeCommand { percent: percent.min(100) }).await
    }

    async fn stop_playback(&self, fade_out: Option<Duration>) -> Result<()> {
        let fade_ms = fade_out.map(|d| d.as_millis() as u64).unwrap_or(0);
        debug!(fade_ms, "stopping device playback");
        self.post("stop", &StopCommand { fade_ms }).await
    }
}
