//! Radio engine facade
//!
//! Owns the playback services and the sequence supervisor, and exposes the
//! command surface the HTTP layer (or an embedding application) drives:
//! launching sequences, manual navigation, transport controls and renderer
//! callbacks.

use crate::assets::NarrationResolver;
use crate::catalog::CatalogSource;
use crate::config::EngineSettings;
use crate::device::DeviceControl;
use crate::error::{Error, Result};
use crate::playback::continuous::run_continuous;
use crate::playback::navigation::{Direction, NavigationCursor};
use crate::playback::signals::{Completion, CompletionKind, CompletionRegistry, Delivery, SkipSignal};
use crate::playback::single::run_single_rank;
use crate::playback::supervisor::SequenceSupervisor;
use crate::playback::{Launch, LaunchReport, PlaybackServices, SequenceRequest, SequenceRun};
use crate::state::{PhaseUpdate, PlaybackStatus, PlaybackStatusStore, Terminal};
use radiocast_common::events::{EventBus, PlaybackPhase, RadioEvent};
use radiocast_common::time::now;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extra time allowed beyond the catalog timeout for a launch to report
const LAUNCH_REPORT_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceStatus {
    Playing,
    Done,
    Error,
}

/// Result of a manual next/prev request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceReport {
    pub status: AdvanceStatus,
    pub from: Option<u32>,
    pub to: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct RadioEngine {
    services: PlaybackServices,
    supervisor: SequenceSupervisor,
    cursor: Mutex<Option<NavigationCursor>>,
}

impl RadioEngine {
    pub fn new(
        settings: EngineSettings,
        catalog: Arc<dyn CatalogSource>,
        resolver: Arc<dyn NarrationResolver>,
        device: Arc<dyn DeviceControl>,
        events: Arc<EventBus>,
    ) -> Self {
        let services = PlaybackServices {
            status: Arc::new(PlaybackStatusStore::new(Arc::clone(&events))),
            skip: Arc::new(SkipSignal::new()),
            completions: Arc::new(CompletionRegistry::new()),
            catalog,
            resolver,
            device,
            events,
            settings: Arc::new(settings),
        };
        Self {
            supervisor: SequenceSupervisor::new(services.clone()),
            services,
            cursor: Mutex::new(None),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.services.status.snapshot()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RadioEvent> {
        self.services.events.subscribe()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.services.settings
    }

    pub async fn is_sequence_active(&self) -> bool {
        self.supervisor.is_active().await
    }

    /// Launch a sequence and wait until its catalog load settled
    ///
    /// Any running sequence is cancelled first. Single-rank launches record
    /// the navigation cursor used by [`RadioEngine::advance`], unless a later
    /// launch already superseded this one.
    pub async fn start_sequence(&self, request: SequenceRequest) -> Result<LaunchReport> {
        request.validate()?;
        let report = self.launch(request.clone()).await?;

        let mut cursor = self.cursor.lock().await;
        if self.supervisor.launched_id().await != Some(report.sequence_id()) {
            debug!(sequence_id = %report.sequence_id(), "Launch superseded, keeping navigation cursor");
            return Ok(report);
        }
        *cursor = match (&report, request.continuous) {
            (LaunchReport::Started { ranks, .. }, false) => NavigationCursor::new(request, ranks.clone()),
            _ => None,
        };
        Ok(report)
    }

    /// Move the navigation cursor and play exactly that rank
    pub async fn advance(&self, direction: Direction) -> Result<AdvanceReport> {
        let mut guard = self.cursor.lock().await;
        let Some(cursor) = guard.as_mut() else {
            return Err(Error::InvalidState("no single-rank sequence to navigate".to_string()));
        };

        let from = cursor.current_rank();
        let Some(to) = cursor.peek(direction) else {
            debug!(?direction, from, "Navigation reached the end of the range");
            return Ok(AdvanceReport {
                status: AdvanceStatus::Done,
                from: Some(from),
                to: None,
                message: None,
            });
        };

        info!(?direction, from, to, "Advancing");
        let report = self.launch(cursor.request_for(to)).await?;
        Ok(match report {
            LaunchReport::Started { .. } => {
                cursor.step(direction);
                AdvanceReport {
                    status: AdvanceStatus::Playing,
                    from: Some(from),
                    to: Some(to),
                    message: None,
                }
            }
            LaunchReport::Empty { .. } => AdvanceReport {
                status: AdvanceStatus::Error,
                from: Some(from),
                to: Some(to),
                message: Some(format!("rank {} is no longer in the catalog", to)),
            },
            LaunchReport::Error { message, .. } => AdvanceReport {
                status: AdvanceStatus::Error,
                from: Some(from),
                to: Some(to),
                message: Some(message),
            },
        })
    }

    async fn launch(&self, request: SequenceRequest) -> Result<LaunchReport> {
        let sequence_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let services = self.services.clone();
        let continuous = request.continuous;

        self.supervisor
            .start_new_sequence(sequence_id, request.scope.mode(), continuous, move |token| {
                let run = SequenceRun::new(sequence_id, token);
                let launch = Launch::new(tx);
                async move {
                    if continuous {
                        run_continuous(services, run, request, launch).await
                    } else {
                        run_single_rank(services, run, request, launch).await
                    }
                }
            })
            .await;

        let limit = self.services.settings.catalog_timeout + LAUNCH_REPORT_SLACK;
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(_)) => Ok(LaunchReport::Error {
                sequence_id,
                message: "sequence was cancelled before it finished loading".to_string(),
            }),
            Err(_) => Err(Error::DataSourceTimeout(limit)),
        }
    }

    /// Whether something is audible or about to be
    ///
    /// A single-rank task exits once its track is published, so the status
    /// decides as well as the task handle.
    async fn is_live(&self) -> bool {
        let status = self.services.status.snapshot();
        status.is_playing
            || !matches!(status.phase, PlaybackPhase::Idle | PlaybackPhase::Ended)
            || self.supervisor.is_active().await
    }

    /// Pause the live sequence; with nothing live only the flag flips
    pub async fn pause(&self) {
        if self.is_live().await {
            self.services
                .status
                .update_phase(PhaseUpdate::keep().paused(true).playing(false));
            self.services.stop_device_best_effort().await;
            info!("Playback paused");
        } else {
            self.services.status.update_phase(PhaseUpdate::keep().paused(true));
        }
    }

    pub async fn resume(&self) {
        if self.is_live().await {
            self.services
                .status
                .update_phase(PhaseUpdate::keep().paused(false).playing(true));
            info!("Playback resumed");
        } else {
            self.services.status.update_phase(PhaseUpdate::keep().paused(false));
        }
    }

    /// Cancel whatever is running and return to idle; safe to repeat
    pub async fn stop(&self) {
        self.supervisor.request_cancel().await;
        self.services.skip.take();
        self.services.status.mark_stopped(Terminal::Idle);
        self.services.stop_device_best_effort().await;
        info!("Playback stopped");
    }

    /// Abandon the current narration or track phase
    pub fn skip(&self) {
        self.services.skip.signal();
        self.services
            .events
            .emit_lossy(RadioEvent::SkipSignaled { timestamp: now() });
    }

    pub fn narration_finished(&self, wait_id: Option<Uuid>) -> Delivery {
        self.deliver(CompletionKind::Narration, wait_id, Completion::Finished)
    }

    pub fn track_finished(&self, wait_id: Option<Uuid>) -> Delivery {
        self.deliver(CompletionKind::Track, wait_id, Completion::Finished)
    }

    pub fn track_failed(&self, wait_id: Option<Uuid>, reason: String) -> Delivery {
        self.deliver(CompletionKind::Track, wait_id, Completion::Failed(reason))
    }

    fn deliver(&self, kind: CompletionKind, wait_id: Option<Uuid>, completion: Completion) -> Delivery {
        let delivery = self.services.completions.complete(kind, wait_id, completion);
        if let Delivery::Stale { reason } = &delivery {
            warn!(%kind, "Discarding stale completion: {}", reason);
            self.services.events.emit_lossy(RadioEvent::CompletionDiscarded {
                kind: kind.to_string(),
                reason: reason.clone(),
                timestamp: now(),
            });
        }
        delivery
    }

    /// Renderer-reported progress for the current phase
    pub fn report_progress(&self, elapsed_seconds: f64, duration_seconds: f64) -> Result<()> {
        if !elapsed_seconds.is_finite() || !duration_seconds.is_finite() {
            return Err(Error::BadRequest("progress must be finite".to_string()));
        }
        if elapsed_seconds < 0.0 || duration_seconds < 0.0 {
            return Err(Error::BadRequest("progress must not be negative".to_string()));
        }
        self.services
            .status
            .update_phase(PhaseUpdate::keep().progress(elapsed_seconds, duration_seconds));
        Ok(())
    }
}
