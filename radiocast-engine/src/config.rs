//! Configuration for the radiocast engine
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (`--port`, `--catalog`)
//! 2. Environment variables (`RADIOCAST_PORT`, `RADIOCAST_CATALOG`, `RADIOCAST_CONFIG`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! The TOML file is read once at startup. Runtime code only sees the derived
//! [`EngineSettings`].

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON catalog file with ranked items
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub narration: NarrationConfig,

    #[serde(default)]
    pub device: DeviceConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            catalog_path: None,
            logging: LoggingConfig::default(),
            timing: TimingConfig::default(),
            volume: VolumeConfig::default(),
            narration: NarrationConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Sequencing time bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a cancelled sequence may take to unwind before it is aborted
    pub cancel_grace_ms: u64,
    pub catalog_timeout_secs: u64,
    /// Unset: wait for the renderer indefinitely
    pub narration_timeout_secs: Option<u64>,
    /// Unset: wait for the renderer indefinitely
    pub track_timeout_secs: Option<u64>,
    pub heartbeat_ms: u64,
    /// Pause between consecutive items of a continuous run
    pub item_gap_ms: u64,
    /// Fade applied when the device is stopped on skip or pause
    pub stop_fade_ms: u64,
    /// Track duration assumed when the catalog has none
    pub track_fallback_secs: u64,
    pub track_max_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cancel_grace_ms: 150,
            catalog_timeout_secs: 30,
            narration_timeout_secs: None,
            track_timeout_secs: None,
            heartbeat_ms: 250,
            item_gap_ms: 400,
            stop_fade_ms: 1200,
            track_fallback_secs: 180,
            track_max_secs: 900,
        }
    }
}

/// Device volume levels (0-100)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub main_percent: u8,
    /// Level the track is ducked to while narration plays over it
    pub duck_percent: u8,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            main_percent: 100,
            duck_percent: 40,
        }
    }
}

/// Narration asset lookup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Object storage base URL; assets resolve to public object URLs
    pub public_base_url: Option<String>,
    /// Local directory laid out as `<root>/<bucket>/<key>`
    pub local_root: Option<PathBuf>,
    pub default_language: String,
    /// Track played under the intro in "before" mode
    pub bed_track_id: Option<String>,
    pub buckets: LanguageBuckets,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            public_base_url: None,
            local_root: None,
            default_language: "en".to_string(),
            bed_track_id: None,
            buckets: LanguageBuckets::default(),
        }
    }
}

/// Storage bucket per narration language
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LanguageBuckets {
    pub en: String,
    pub es: String,
    pub pt_br: String,
}

impl Default for LanguageBuckets {
    fn default() -> Self {
        Self {
            en: "audio-en".to_string(),
            es: "audio-es".to_string(),
            pt_br: "audio-ptbr".to_string(),
        }
    }
}

/// Remote audio device bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Unset: device commands are only logged
    pub bridge_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bridge_url: None,
            request_timeout_ms: 2000,
        }
    }
}

fn default_port() -> u16 {
    5750
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.volume.main_percent > 100 {
            return Err(Error::Config(format!(
                "volume.main_percent must be 0-100, got {}",
                self.volume.main_percent
            )));
        }
        if self.volume.duck_percent > self.volume.main_percent {
            return Err(Error::Config(format!(
                "volume.duck_percent ({}) exceeds volume.main_percent ({})",
                self.volume.duck_percent, self.volume.main_percent
            )));
        }
        if self.timing.heartbeat_ms == 0 {
            return Err(Error::Config("timing.heartbeat_ms must be positive".to_string()));
        }
        if self.timing.catalog_timeout_secs == 0 {
            return Err(Error::Config(
                "timing.catalog_timeout_secs must be positive".to_string(),
            ));
        }
        if self.timing.track_fallback_secs > self.timing.track_max_secs {
            return Err(Error::Config(
                "timing.track_fallback_secs exceeds timing.track_max_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Runtime settings derived from this file
    pub fn engine_settings(&self) -> EngineSettings {
        let t = &self.timing;
        EngineSettings {
            cancel_grace: Duration::from_millis(t.cancel_grace_ms),
            catalog_timeout: Duration::from_secs(t.catalog_timeout_secs),
            narration_timeout: t.narration_timeout_secs.map(Duration::from_secs),
            track_timeout: t.track_timeout_secs.map(Duration::from_secs),
            heartbeat: Duration::from_millis(t.heartbeat_ms),
            item_gap: Duration::from_millis(t.item_gap_ms),
            stop_fade: Duration::from_millis(t.stop_fade_ms),
            track_fallback: Duration::from_secs(t.track_fallback_secs),
            track_max: Duration::from_secs(t.track_max_secs),
            main_volume: self.volume.main_percent,
            duck_volume: self.volume.duck_percent,
            default_language: self.narration.default_language.clone(),
            bed_track_id: self.narration.bed_track_id.clone(),
            buckets: self.narration.buckets.clone(),
        }
    }
}

/// Settings consumed by the sequencing engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cancel_grace: Duration,
    pub catalog_timeout: Duration,
    pub narration_timeout: Option<Duration>,
    pub track_timeout: Option<Duration>,
    pub heartbeat: Duration,
    pub item_gap: Duration,
    pub stop_fade: Duration,
    pub track_fallback: Duration,
    pub track_max: Duration,
    pub main_volume: u8,
    pub duck_volume: u8,
    pub default_language: String,
    pub bed_track_id: Option<String>,
    pub buckets: LanguageBuckets,
}

impl Default for EngineSettings {
    fn default() -> Self {
        TomlConfig::default().engine_settings()
    }
}
