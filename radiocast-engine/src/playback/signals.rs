//! Skip signal and renderer completion channels
//!
//! Skip is a single auto-resetting flag: whoever observes it clears it, and
//! every phase clears a leftover skip before it starts waiting.
//!
//! Completions are per wait. Each narration or track wait arms a fresh
//! oneshot channel identified by a `wait_id`; a callback that finds no armed
//! waiter (or names another `wait_id`) is stale and discarded.

use radiocast_common::events::PlaybackPhase;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// "Abandon the current narration or track phase"
#[derive(Debug, Default)]
pub struct SkipSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl SkipSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Check and clear
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Drop a skip raised before the current phase began
    pub fn clear_stale(&self) -> bool {
        let stale = self.take();
        if stale {
            debug!("Cleared stale skip signal");
        }
        stale
    }

    /// Resolve once a skip is raised, consuming it
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking so a signal between the check and the await is not lost
            notified.as_mut().enable();
            if self.take() {
                return;
            }
            notified.await;
        }
    }
}

/// Which renderer callback a waiter listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionKind {
    Narration,
    Track,
}

impl std::fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionKind::Narration => write!(f, "narration"),
            CompletionKind::Track => write!(f, "track"),
        }
    }
}

/// Renderer report for one wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Failed(String),
}

/// Result of delivering a renderer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered { wait_id: Uuid },
    Stale { reason: String },
}

struct ArmedWait {
    wait_id: Uuid,
    sequence_id: Uuid,
    phase: PlaybackPhase,
    tx: oneshot::Sender<Completion>,
}

/// Armed completion waits, at most one per kind
#[derive(Default)]
pub struct CompletionRegistry {
    slots: Mutex<HashMap<CompletionKind, ArmedWait>>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CompletionKind, ArmedWait>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a fresh wait, replacing any earlier wait of the same kind
    pub fn arm(
        self: &Arc<Self>,
        kind: CompletionKind,
        sequence_id: Uuid,
        phase: PlaybackPhase,
    ) -> CompletionWaiter {
        let (tx, rx) = oneshot::channel();
        let wait_id = Uuid::new_v4();
        let replaced = self.slots().insert(
            kind,
            ArmedWait {
                wait_id,
                sequence_id,
                phase,
                tx,
            },
        );
        if let Some(old) = replaced {
            debug!(%kind, old_wait = %old.wait_id, "Replaced armed completion wait");
        }
        debug!(%kind, %wait_id, %sequence_id, %phase, "Armed completion wait");

        CompletionWaiter {
            kind,
            wait_id,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Deliver a renderer callback to the armed waiter of `kind`
    ///
    /// When `wait_id` is given it must match the armed wait.
    pub fn complete(
        &self,
        kind: CompletionKind,
        wait_id: Option<Uuid>,
        completion: Completion,
    ) -> Delivery {
        let armed = {
            let mut slots = self.slots();
            match slots.get(&kind) {
                None => {
                    return Delivery::Stale {
                        reason: format!("no {} wait armed", kind),
                    }
                }
                Some(armed) => {
                    if let Some(requested) = wait_id {
                        if requested != armed.wait_id {
                            return Delivery::Stale {
                                reason: format!(
                                    "{} callback for wait {} but wait {} is armed",
                                    kind, requested, armed.wait_id
                                ),
                            };
                        }
                    }
                }
            }
            match slots.remove(&kind) {
                Some(armed) => armed,
                None => {
                    return Delivery::Stale {
                        reason: format!("no {} wait armed", kind),
                    }
                }
            }
        };

        let wait_id = armed.wait_id;
        debug!(
            %kind,
            %wait_id,
            sequence_id = %armed.sequence_id,
            phase = %armed.phase,
            ?completion,
            "Delivering completion"
        );
        match armed.tx.send(completion) {
            Ok(()) => Delivery::Delivered { wait_id },
            Err(_) => Delivery::Stale {
                reason: format!("{} waiter {} already gone", kind, wait_id),
            },
        }
    }

    /// Currently armed wait of `kind`
    pub fn armed(&self, kind: CompletionKind) -> Option<Uuid> {
        self.slots().get(&kind).map(|armed| armed.wait_id)
    }

    fn disarm(&self, kind: CompletionKind, wait_id: Uuid) {
        let mut slots = self.slots();
        if slots.get(&kind).map(|armed| armed.wait_id) == Some(wait_id) {
            slots.remove(&kind);
        }
    }
}

/// One armed wait; dropping it disarms the slot
pub struct CompletionWaiter {
    kind: CompletionKind,
    wait_id: Uuid,
    rx: oneshot::Receiver<Completion>,
    registry: Arc<CompletionRegistry>,
}

impl CompletionWaiter {
    pub fn wait_id(&self) -> Uuid {
        self.wait_id
    }

    pub fn kind(&self) -> CompletionKind {
        self.kind
    }

    /// Completion if one already arrived
    pub fn try_take(&mut self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    pub(crate) async fn recv(&mut self) -> Option<Completion> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for CompletionWaiter {
    fn drop(&mut self) {
        self.registry.disarm(self.kind, self.wait_id);
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The primary waiter completed
    Completed(Completion),
    /// The secondary waiter completed first
    SecondaryCompleted(Completion),
    Skipped,
    TimedOut,
    /// The wait was replaced before any callback arrived
    Abandoned,
}

/// Wait for a renderer callback, skip, cancellation or timeout
///
/// Cancellation wins over everything else and is returned as
/// `Err(Error::Cancelled)`.
pub async fn await_completion(
    primary: &mut CompletionWaiter,
    secondary: Option<&mut CompletionWaiter>,
    skip: &SkipSignal,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<WaitOutcome> {
    let secondary_done = async move {
        match secondary {
            Some(waiter) => waiter.recv().await,
            None => std::future::pending().await,
        }
    };
    let deadline = optional_sleep(timeout);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        done = primary.recv() => Ok(match done {
            Some(completion) => WaitOutcome::Completed(completion),
            None => WaitOutcome::Abandoned,
        }),
        done = secondary_done => Ok(match done {
            Some(completion) => WaitOutcome::SecondaryCompleted(completion),
            None => WaitOutcome::Abandoned,
        }),
        _ = skip.wait() => Ok(WaitOutcome::Skipped),
        _ = deadline => Ok(WaitOutcome::TimedOut),
    }
}

pub(crate) fn optional_sleep(duration: Option<Duration>) -> impl Future<Output = ()> {
    async move {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    }
}

/// Idle while paused, without giving up the sequence slot
pub async fn wait_while_paused(
    paused: &mut watch::Receiver<bool>,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !*paused.borrow_and_update() {
            return Ok(());
        }
        debug!("Sequence paused, waiting for resume");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            changed = paused.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Sleep that ends early on cancellation
pub async fn cancellable_sleep(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<CompletionRegistry> {
        Arc::new(CompletionRegistry::new())
    }

    #[tokio::test]
    async fn skip_wait_consumes_signal() {
        let skip = Arc::new(SkipSignal::new());
        let waiter = {
            let skip = Arc::clone(&skip);
            tokio::spawn(async move { skip.wait().await })
        };
        tokio::task::yield_now().await;
        skip.signal();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!skip.is_set());
    }

    #[test]
    fn clear_stale_reports_leftover() {
        let skip = SkipSignal::new();
        assert!(!skip.clear_stale());
        skip.signal();
        assert!(skip.clear_stale());
        assert!(!skip.is_set());
    }

    #[tokio::test]
    async fn completion_reaches_armed_waiter() {
        let registry = registry();
        let mut waiter = registry.arm(CompletionKind::Narration, Uuid::new_v4(), PlaybackPhase::Intro);
        let wait_id = waiter.wait_id();

        let delivery = registry.complete(CompletionKind::Narration, Some(wait_id), Completion::Finished);
        assert_eq!(delivery, Delivery::Delivered { wait_id });
        assert_eq!(waiter.try_take(), Some(Completion::Finished));
    }

    #[test]
    fn completion_without_waiter_is_stale() {
        let registry = registry();
        let delivery = registry.complete(CompletionKind::Track, None, Completion::Finished);
        assert!(matches!(delivery, Delivery::Stale { .. }));
    }

    #[test]
    fn mismatched_wait_id_is_stale_and_keeps_waiter_armed() {
        let registry = registry();
        let waiter = registry.arm(CompletionKind::Track, Uuid::new_v4(), PlaybackPhase::Track);

        let delivery = registry.complete(CompletionKind::Track, Some(Uuid::new_v4()), Completion::Finished);
        assert!(matches!(delivery, Delivery::Stale { .. }));
        assert_eq!(registry.armed(CompletionKind::Track), Some(waiter.wait_id()));
    }

    #[test]
    fn dropping_waiter_disarms() {
        let registry = registry();
        let waiter = registry.arm(CompletionKind::Narration, Uuid::new_v4(), PlaybackPhase::Detail);
        drop(waiter);
        assert_eq!(registry.armed(CompletionKind::Narration), None);
        assert!(matches!(
            registry.complete(CompletionKind::Narration, None, Completion::Finished),
            Delivery::Stale { .. }
        ));
    }

    #[test]
    fn rearming_does_not_let_old_waiter_disarm_new_one() {
        let registry = registry();
        let old = registry.arm(CompletionKind::Narration, Uuid::new_v4(), PlaybackPhase::Intro);
        let new = registry.arm(CompletionKind::Narration, Uuid::new_v4(), PlaybackPhase::Detail);
        drop(old);
        assert_eq!(registry.armed(CompletionKind::Narration), Some(new.wait_id()));
    }

    #[tokio::test]
    async fn await_completion_prefers_cancellation() {
        let registry = registry();
        let mut waiter = registry.arm(CompletionKind::Track, Uuid::new_v4(), PlaybackPhase::Track);
        let skip = SkipSignal::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        skip.signal();

        let result = await_completion(&mut waiter, None, &skip, &cancel, None).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn await_completion_times_out() {
        let registry = registry();
        let mut waiter = registry.arm(CompletionKind::Narration, Uuid::new_v4(), PlaybackPhase::Intro);
        let outcome = await_completion(
            &mut waiter,
            None,
            &SkipSignal::new(),
            &CancellationToken::new(),
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn await_completion_reports_secondary() {
        let registry = registry();
        let seq = Uuid::new_v4();
        let mut narration = registry.arm(CompletionKind::Narration, seq, PlaybackPhase::Intro);
        let mut track = registry.arm(CompletionKind::Track, seq, PlaybackPhase::Track);
        registry.complete(CompletionKind::Track, None, Completion::Finished);

        let outcome = await_completion(
            &mut narration,
            Some(&mut track),
            &SkipSignal::new(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::SecondaryCompleted(Completion::Finished));
    }

    #[tokio::test]
    async fn pause_wait_returns_on_resume() {
        let (tx, mut rx) = watch::channel(true);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(async move { wait_while_paused(&mut rx, &cancel).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        tx.send_replace(false);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn pause_wait_observes_cancellation() {
        let (_tx, mut rx) = watch::channel(true);
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let task = tokio::spawn(async move { wait_while_paused(&mut rx, &child).await });
        cancel.cancel();
        assert!(matches!(task.await.unwrap(), Err(Error::Cancelled)));
    }
}
