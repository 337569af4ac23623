//! Single-flight sequence supervisor
//!
//! `start_new_sequence` is the only way to launch a runner. Under one lock it
//! cancels whatever is running, joins it (bounded by the cancel grace, then
//! aborting), restores the device volume, and only then spawns the new task.
//! At most one runner ever mutates the playback status.

use super::{release_flags, PlaybackServices};
use crate::error::{Error, Result};
use crate::state::PhaseUpdate;
use radiocast_common::events::{PlaybackMode, RadioEvent, SequenceOutcome};
use radiocast_common::time::now;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct ActiveSequence {
    id: Uuid,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SequenceSupervisor {
    services: PlaybackServices,
    active: Mutex<Option<ActiveSequence>>,
}

impl SequenceSupervisor {
    pub fn new(services: PlaybackServices) -> Self {
        Self {
            services,
            active: Mutex::new(None),
        }
    }

    /// Cancel any running sequence, then spawn `make(token)` as the new one
    pub async fn start_new_sequence<F, Fut>(
        &self,
        id: Uuid,
        mode: PlaybackMode,
        continuous: bool,
        make: F,
    ) where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<SequenceOutcome>> + Send + 'static,
    {
        let mut slot = self.active.lock().await;
        self.cancel_locked(&mut slot).await;

        let token = CancellationToken::new();
        let sequence = make(token.clone());
        self.services.events.emit_lossy(RadioEvent::SequenceStarted {
            sequence_id: id,
            mode,
            continuous,
            timestamp: now(),
        });
        let handle = tokio::spawn(guarded(id, sequence, self.services.clone()));

        *slot = Some(ActiveSequence { id, token, handle });
    }

    /// Cancel the running sequence, if any
    ///
    /// Idempotent: with nothing running it only restores the device volume.
    pub async fn request_cancel(&self) {
        let mut slot = self.active.lock().await;
        self.cancel_locked(&mut slot).await;
    }

    /// Whether a sequence task is still running
    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| !active.handle.is_finished())
            .unwrap_or(false)
    }

    /// Id of the most recent launch, even if its task already returned
    ///
    /// Cleared by `request_cancel`.
    pub async fn launched_id(&self) -> Option<Uuid> {
        self.active.lock().await.as_ref().map(|active| active.id)
    }

    async fn cancel_locked(&self, slot: &mut Option<ActiveSequence>) {
        let status = &self.services.status;
        let previous = slot.take();

        status.update_phase(PhaseUpdate::keep().cancel_requested(true));
        self.services.events.emit_lossy(RadioEvent::CancelRequested {
            sequence_id: previous.as_ref().map(|active| active.id),
            timestamp: now(),
        });

        if let Some(ActiveSequence { id, token, mut handle }) = previous {
            token.cancel();
            let grace = self.services.settings.cancel_grace;
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(_) => debug!(sequence_id = %id, "Previous sequence unwound"),
                Err(_) => {
                    warn!(sequence_id = %id, ?grace, "Sequence did not unwind in time, aborting");
                    handle.abort();
                    let _ = handle.await;
                    release_flags(&self.services);
                    self.services.events.emit_lossy(RadioEvent::SequenceEnded {
                        sequence_id: id,
                        outcome: SequenceOutcome::Cancelled,
                        timestamp: now(),
                    });
                }
            }
        }

        self.services
            .set_volume_best_effort(self.services.settings.main_volume)
            .await;
        status.update_phase(PhaseUpdate::keep().cancel_requested(false));
    }
}

/// Runs one sequence and logs how it ended
async fn guarded<Fut>(id: Uuid, sequence: Fut, services: PlaybackServices)
where
    Fut: Future<Output = Result<SequenceOutcome>>,
{
    info!(sequence_id = %id, "Sequence START");
    let outcome = match sequence.await {
        Ok(outcome) => outcome,
        Err(Error::Cancelled) => SequenceOutcome::Cancelled,
        Err(e) => {
            error!(sequence_id = %id, "Sequence aborted: {}", e);
            SequenceOutcome::Failed
        }
    };
    match outcome {
        SequenceOutcome::Cancelled => info!(sequence_id = %id, "Sequence CANCELLED"),
        other => info!(sequence_id = %id, outcome = %other, "Sequence END"),
    }
    services.events.emit_lossy(RadioEvent::SequenceEnded {
        sequence_id: id,
        outcome,
        timestamp: now(),
    });
}
