//! Sequencing and phase publishing
//!
//! A sequence is one spawned task driving catalog items through
//! `loading → prelude → [intro] → [detail] → [artist] → [track]`.
//! [`single`] publishes one item and returns, [`continuous`] loops through the
//! whole ordered range. [`supervisor`] keeps at most one of them alive.

pub mod context;
pub mod continuous;
pub mod item;
pub mod narration;
pub mod navigation;
pub mod ordering;
pub mod signals;
pub mod single;
pub mod supervisor;

use crate::assets::NarrationResolver;
use crate::catalog::{CatalogItem, CatalogScope, CatalogSource, RankRange};
use crate::config::EngineSettings;
use crate::device::DeviceControl;
use crate::error::{Error, Result};
use crate::state::{PhaseUpdate, PlaybackStatusStore};
use radiocast_common::events::{EventBus, OrderPolicy, VoiceStyle};
use serde::{Deserialize, Serialize};
use signals::{wait_while_paused, CompletionRegistry, SkipSignal};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Collaborators and shared state every runner works against
#[derive(Clone)]
pub struct PlaybackServices {
    pub status: Arc<PlaybackStatusStore>,
    pub skip: Arc<SkipSignal>,
    pub completions: Arc<CompletionRegistry>,
    pub catalog: Arc<dyn CatalogSource>,
    pub resolver: Arc<dyn NarrationResolver>,
    pub device: Arc<dyn DeviceControl>,
    pub events: Arc<EventBus>,
    pub settings: Arc<EngineSettings>,
}

impl PlaybackServices {
    /// Volume change that is logged instead of failing the sequence
    pub(crate) async fn set_volume_best_effort(&self, percent: u8) {
        if let Err(e) = self.device.set_volume(percent).await {
            warn!("Failed to set device volume to {}: {}", percent, e);
        }
    }

    pub(crate) async fn stop_device_best_effort(&self) {
        if let Err(e) = self.device.stop_playback(Some(self.settings.stop_fade)).await {
            warn!("Failed to stop device playback: {}", e);
        }
    }
}

/// Which phases of an item are played
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PhaseFlags {
    pub play_intro: bool,
    pub play_detail: bool,
    pub play_artist: bool,
    pub play_track: bool,
}

impl Default for PhaseFlags {
    fn default() -> Self {
        Self {
            play_intro: true,
            play_detail: true,
            play_artist: true,
            play_track: true,
        }
    }
}

/// Everything needed to launch a sequence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRequest {
    pub scope: CatalogScope,
    pub range: RankRange,
    #[serde(default)]
    pub order: OrderPolicy,
    #[serde(default)]
    pub voice_style: VoiceStyle,
    #[serde(default)]
    pub flags: PhaseFlags,
    #[serde(default)]
    pub language: Option<String>,
    /// Loop through the whole range instead of publishing one item
    #[serde(default)]
    pub continuous: bool,
}

impl SequenceRequest {
    pub fn validate(&self) -> Result<()> {
        self.range.validate()?;
        match &self.scope {
            CatalogScope::DecadeGenre { decade, .. } if decade.trim().is_empty() => {
                Err(Error::BadRequest("decade must not be empty".to_string()))
            }
            CatalogScope::Collection { slug } if slug.trim().is_empty() => {
                Err(Error::BadRequest("collection slug must not be empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Reported by a runner once its catalog fetch settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchReport {
    Started { sequence_id: Uuid, ranks: Vec<u32> },
    Empty { sequence_id: Uuid },
    Error { sequence_id: Uuid, message: String },
}

impl LaunchReport {
    pub fn sequence_id(&self) -> Uuid {
        match self {
            LaunchReport::Started { sequence_id, .. }
            | LaunchReport::Empty { sequence_id }
            | LaunchReport::Error { sequence_id, .. } => *sequence_id,
        }
    }
}

/// One-time launch report sender
pub struct Launch(Option<oneshot::Sender<LaunchReport>>);

impl Launch {
    pub fn new(tx: oneshot::Sender<LaunchReport>) -> Self {
        Self(Some(tx))
    }

    pub fn detached() -> Self {
        Self(None)
    }

    pub fn report(&mut self, report: LaunchReport) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(report);
        }
    }
}

/// Identity and cancellation token of one spawned sequence
#[derive(Debug, Clone)]
pub struct SequenceRun {
    pub id: Uuid,
    pub cancel: CancellationToken,
}

impl SequenceRun {
    pub fn new(id: Uuid, cancel: CancellationToken) -> Self {
        Self { id, cancel }
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Phase boundary: idle while paused, then re-check cancellation
    pub async fn pause_point(&self, services: &PlaybackServices) -> Result<()> {
        let mut paused = services.status.paused_watch();
        wait_while_paused(&mut paused, &self.cancel).await?;
        self.check_cancelled()
    }
}

/// Fetch candidate items on the blocking pool, bounded by the catalog timeout
pub(crate) async fn fetch_items(
    services: &PlaybackServices,
    run: &SequenceRun,
    scope: &CatalogScope,
    range: RankRange,
) -> Result<Vec<CatalogItem>> {
    let catalog = Arc::clone(&services.catalog);
    let query_scope = scope.clone();
    let limit = services.settings.catalog_timeout;
    let task = tokio::task::spawn_blocking(move || catalog.fetch_ordered_items(&query_scope, range));

    let items = tokio::select! {
        biased;
        _ = run.cancel.cancelled() => return Err(Error::Cancelled),
        fetched = tokio::time::timeout(limit, task) => match fetched {
            Err(_) => return Err(Error::DataSourceTimeout(limit)),
            Ok(Err(join)) => return Err(Error::Catalog(format!("catalog task failed: {}", join))),
            Ok(Ok(result)) => result?,
        },
    };

    debug!(scope = %scope, count = items.len(), "Fetched catalog items");
    Ok(items)
}

/// Runner teardown: `is_playing=false`, `stopped=true`, phase untouched
pub(crate) fn release_flags(services: &PlaybackServices) {
    services
        .status
        .update_phase(PhaseUpdate::keep().playing(false).stopped(true));
}
