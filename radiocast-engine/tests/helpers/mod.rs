//! Shared fixtures for radiocast-engine integration tests
//!
//! - `sample_catalog()`: two decade/genre charts and one collection
//! - `RecordingDevice`: remembers every device command
//! - `SlowCatalog`: blocks longer than any test timeout
//! - `ScriptedRenderer`: answers every armed wait like a well-behaved renderer

#![allow(dead_code)]

use radiocast_common::events::{EventBus, OrderPolicy, PlaybackPhase, RadioEvent, VoiceStyle};
use radiocast_engine::assets::PublicUrlResolver;
use radiocast_engine::catalog::{CatalogItem, CatalogScope, CatalogSource, RankRange, StaticCatalog};
use radiocast_engine::config::EngineSettings;
use radiocast_engine::device::DeviceControl;
use radiocast_engine::playback::{PhaseFlags, SequenceRequest};
use radiocast_engine::state::PlaybackStatus;
use radiocast_engine::RadioEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub fn item(rank: u32) -> CatalogItem {
    CatalogItem {
        rank,
        track_name: format!("Track {}", rank),
        artist_name: format!("Artist {}", rank),
        spotify_track_id: Some(format!("track{:02}", rank)),
        spotify_artist_id: Some(format!("artist{:02}", rank)),
        duration_ms: Some(180_000),
    }
}

pub fn sample_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_decade_genre("1990s", "rock", (1..=5).map(item).collect())
        .with_decade_genre("1980s", "pop", (1..=3).map(item).collect())
        .with_collection("road-trip", (1..=4).map(item).collect())
}

/// Settings tuned so sequences run in milliseconds
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        cancel_grace: Duration::from_millis(200),
        catalog_timeout: Duration::from_millis(500),
        heartbeat: Duration::from_millis(20),
        item_gap: Duration::from_millis(5),
        stop_fade: Duration::from_millis(10),
        ..EngineSettings::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Volume(u8),
    Stop,
}

#[derive(Default)]
pub struct RecordingDevice {
    commands: Mutex<Vec<DeviceCommand>>,
}

impl RecordingDevice {
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::Volume(v) => Some(v),
                DeviceCommand::Stop => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DeviceControl for RecordingDevice {
    async fn set_volume(&self, percent: u8) -> radiocast_engine::Result<()> {
        self.commands.lock().unwrap().push(DeviceCommand::Volume(percent));
        Ok(())
    }

    async fn stop_playback(&self, _fade_out: Option<Duration>) -> radiocast_engine::Result<()> {
        self.commands.lock().unwrap().push(DeviceCommand::Stop);
        Ok(())
    }
}

/// Catalog whose every fetch blocks for `delay`
pub struct SlowCatalog {
    pub delay: Duration,
}

impl CatalogSource for SlowCatalog {
    fn fetch_ordered_items(
        &self,
        scope: &CatalogScope,
        range: RankRange,
    ) -> radiocast_engine::Result<Vec<CatalogItem>> {
        std::thread::sleep(self.delay);
        sample_catalog().fetch_ordered_items(scope, range)
    }
}

pub struct TestEngine {
    pub engine: Arc<RadioEngine>,
    pub device: Arc<RecordingDevice>,
}

pub fn build_engine_with(catalog: Arc<dyn CatalogSource>, settings: EngineSettings) -> TestEngine {
    let device = Arc::new(RecordingDevice::default());
    let engine = Arc::new(RadioEngine::new(
        settings,
        catalog,
        Arc::new(PublicUrlResolver::new("https://cdn.test")),
        Arc::clone(&device) as Arc<dyn DeviceControl>,
        Arc::new(EventBus::new(4096)),
    ));
    TestEngine { engine, device }
}

pub fn build_engine() -> TestEngine {
    build_engine_with(Arc::new(sample_catalog()), fast_settings())
}

pub fn rock_request(start: u32, end: u32) -> SequenceRequest {
    SequenceRequest {
        scope: CatalogScope::DecadeGenre {
            decade: "1990s".to_string(),
            genre: Some("rock".to_string()),
        },
        range: RankRange::new(start, end).unwrap(),
        order: OrderPolicy::Ascending,
        voice_style: VoiceStyle::Before,
        flags: PhaseFlags::default(),
        language: None,
        continuous: false,
    }
}

/// Answers every armed narration and track wait it sees in the status
pub struct ScriptedRenderer {
    handle: JoinHandle<()>,
    answered: Arc<Mutex<Vec<(PlaybackPhase, Uuid)>>>,
}

impl ScriptedRenderer {
    pub fn spawn(engine: Arc<RadioEngine>) -> Self {
        let answered = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&answered);
        let handle = tokio::spawn(async move {
            let mut last: Option<Uuid> = None;
            loop {
                let status = engine.status();
                if let Some(wait_id) = status.context.wait_id() {
                    if last != Some(wait_id) {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        let delivered = if status.phase == PlaybackPhase::Track {
                            engine.track_finished(Some(wait_id))
                        } else {
                            engine.narration_finished(Some(wait_id))
                        };
                        if matches!(delivered, radiocast_engine::playback::signals::Delivery::Delivered { .. }) {
                            log.lock().unwrap().push((status.phase, wait_id));
                            last = Some(wait_id);
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });
        Self { handle, answered }
    }

    pub fn answered(&self) -> Vec<(PlaybackPhase, Uuid)> {
        self.answered.lock().unwrap().clone()
    }
}

impl Drop for ScriptedRenderer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll until `predicate` holds or `limit` elapses
pub async fn wait_for_status<F>(engine: &RadioEngine, limit: Duration, predicate: F) -> PlaybackStatus
where
    F: Fn(&PlaybackStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let status = engine.status();
        if predicate(&status) || tokio::time::Instant::now() >= deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Receive events until `stop` matches one (inclusive) or `limit` elapses
pub async fn collect_events_until<F>(
    rx: &mut broadcast::Receiver<RadioEvent>,
    limit: Duration,
    stop: F,
) -> Vec<RadioEvent>
where
    F: Fn(&RadioEvent) -> bool,
{
    let mut events = Vec::new();
    let _ = tokio::time::timeout(limit, async {
        while let Ok(event) = rx.recv().await {
            let done = stop(&event);
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    events
}

pub fn phases(events: &[RadioEvent]) -> Vec<PlaybackPhase> {
    events
        .iter()
        .filter_map(|event| match event {
            RadioEvent::PhaseChanged { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}
