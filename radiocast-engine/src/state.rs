//! Shared playback state
//!
//! One `PlaybackStatus` record behind one coarse lock. `mark_playing`,
//! `update_phase` and `mark_stopped` are the only mutators; everyone else
//! reads a snapshot. Every write is brief and synchronous, and the lock is
//! never held across an await.

use crate::playback::context::PhaseContext;
use chrono::{DateTime, Utc};
use radiocast_common::events::{EventBus, PlaybackMode, PlaybackPhase, RadioEvent};
use radiocast_common::time::{completion_fraction, now, seconds_to_millis};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

/// Snapshot of the active phase
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub phase: PlaybackPhase,
    pub is_playing: bool,
    pub is_paused: bool,
    pub stopped: bool,
    pub cancel_requested: bool,
    pub mode: PlaybackMode,
    pub language: String,
    pub sequence_id: Option<Uuid>,
    pub current_rank: Option<u32>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    /// Completion fraction (0.0-1.0)
    pub percent_complete: f64,
    pub context: PhaseContext,
    /// Incremented on every phase publish
    pub phase_seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            is_playing: false,
            is_paused: false,
            stopped: false,
            cancel_requested: false,
            mode: PlaybackMode::default(),
            language: "en".to_string(),
            sequence_id: None,
            current_rank: None,
            track_name: None,
            artist_name: None,
            elapsed_seconds: 0.0,
            duration_seconds: 0.0,
            percent_complete: 0.0,
            context: PhaseContext::None,
            phase_seq: 0,
            updated_at: now(),
        }
    }
}

impl PlaybackStatus {
    pub fn elapsed_ms(&self) -> u64 {
        seconds_to_millis(self.elapsed_seconds)
    }

    pub fn duration_ms(&self) -> u64 {
        seconds_to_millis(self.duration_seconds)
    }
}

/// Terminal phase written by `mark_stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Idle,
    Ended,
}

/// Item fields published with a phase
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFields {
    pub rank: u32,
    pub track_name: String,
    pub artist_name: String,
}

/// Fields applied atomically by `update_phase`
///
/// Unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct PhaseUpdate {
    phase: Option<PlaybackPhase>,
    is_playing: Option<bool>,
    is_paused: Option<bool>,
    stopped: Option<bool>,
    cancel_requested: Option<bool>,
    item: Option<ItemFields>,
    context: Option<PhaseContext>,
    progress: Option<(f64, f64)>,
    expected_seq: Option<u64>,
}

impl PhaseUpdate {
    /// Publish a new phase
    pub fn to(phase: PlaybackPhase) -> Self {
        Self {
            phase: Some(phase),
            ..Default::default()
        }
    }

    /// Keep the current phase, change only the given fields
    pub fn keep() -> Self {
        Self::default()
    }

    pub fn playing(mut self, value: bool) -> Self {
        self.is_playing = Some(value);
        self
    }

    pub fn paused(mut self, value: bool) -> Self {
        self.is_paused = Some(value);
        self
    }

    pub fn stopped(mut self, value: bool) -> Self {
        self.stopped = Some(value);
        self
    }

    pub fn cancel_requested(mut self, value: bool) -> Self {
        self.cancel_requested = Some(value);
        self
    }

    pub fn item(mut self, rank: u32, track_name: &str, artist_name: &str) -> Self {
        self.item = Some(ItemFields {
            rank,
            track_name: track_name.to_string(),
            artist_name: artist_name.to_string(),
        });
        self
    }

    pub fn context(mut self, context: PhaseContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn progress(mut self, elapsed_seconds: f64, duration_seconds: f64) -> Self {
        self.progress = Some((elapsed_seconds, duration_seconds));
        self
    }

    /// Apply only while `phase_seq` still equals `seq`
    pub fn if_phase_seq(mut self, seq: u64) -> Self {
        self.expected_seq = Some(seq);
        self
    }
}

/// Owner of the single `PlaybackStatus`
pub struct PlaybackStatusStore {
    inner: Mutex<PlaybackStatus>,
    paused_tx: watch::Sender<bool>,
    events: Arc<EventBus>,
}

impl PlaybackStatusStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        let (paused_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(PlaybackStatus::default()),
            paused_tx,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> PlaybackStatus {
        self.lock().clone()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused_tx.borrow()
    }

    /// Receiver that changes whenever `is_paused` flips
    pub fn paused_watch(&self) -> watch::Receiver<bool> {
        self.paused_tx.subscribe()
    }

    /// Start of a sequence: clear terminal flags and enter `loading`
    pub fn mark_playing(
        &self,
        sequence_id: Uuid,
        mode: PlaybackMode,
        language: &str,
        context: PhaseContext,
    ) -> u64 {
        let seq = {
            let mut status = self.lock();
            status.phase = PlaybackPhase::Loading;
            status.is_playing = true;
            status.is_paused = false;
            status.stopped = false;
            status.cancel_requested = false;
            status.mode = mode;
            status.language = language.to_string();
            status.sequence_id = Some(sequence_id);
            status.current_rank = None;
            status.track_name = None;
            status.artist_name = None;
            status.elapsed_seconds = 0.0;
            status.duration_seconds = 0.0;
            status.percent_complete = 0.0;
            status.context = context;
            status.phase_seq += 1;
            status.updated_at = now();
            status.phase_seq
        };

        self.paused_tx.send_replace(false);
        self.events.emit_lossy(RadioEvent::PhaseChanged {
            sequence_id: Some(sequence_id),
            phase: PlaybackPhase::Loading,
            rank: None,
            timestamp: now(),
        });
        self.events.emit_lossy(RadioEvent::PlaybackStateChanged {
            is_playing: true,
            is_paused: false,
            timestamp: now(),
        });
        seq
    }

    /// Apply `update` atomically
    ///
    /// Returns the resulting `phase_seq`, or `None` when the update was
    /// guarded by `if_phase_seq` and a newer phase has been published since.
    pub fn update_phase(&self, update: PhaseUpdate) -> Option<u64> {
        let mut phase_event = None;
        let mut progress_event = None;
        let mut state_event = None;

        let seq = {
            let mut status = self.lock();
            if let Some(expected) = update.expected_seq {
                if status.phase_seq != expected {
                    return None;
                }
            }

            let flags_before = (status.is_playing, status.is_paused);

            if let Some(phase) = update.phase {
                status.phase = phase;
                status.phase_seq += 1;
                status.elapsed_seconds = 0.0;
                status.duration_seconds = 0.0;
                status.percent_complete = 0.0;
                phase_event = Some(phase);
            }
            if let Some(value) = update.is_playing {
                status.is_playing = value;
            }
            if let Some(value) = update.is_paused {
                status.is_paused = value;
            }
            if let Some(value) = update.stopped {
                status.stopped = value;
            }
            if let Some(value) = update.cancel_requested {
                status.cancel_requested = value;
            }
            if let Some(item) = update.item {
                status.current_rank = Some(item.rank);
                status.track_name = Some(item.track_name);
                status.artist_name = Some(item.artist_name);
            }
            if let Some(context) = update.context {
                status.context = context;
            }
            if let Some((elapsed, duration)) = update.progress {
                let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
                let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
                // elapsed never moves backwards within one phase publish
                status.elapsed_seconds = status.elapsed_seconds.max(elapsed);
                status.duration_seconds = duration;
                status.percent_complete =
                    completion_fraction(status.elapsed_seconds, status.duration_seconds);
                progress_event = Some((
                    status.elapsed_ms(),
                    status.duration_ms(),
                    status.percent_complete,
                ));
            }

            if flags_before != (status.is_playing, status.is_paused) {
                state_event = Some((status.is_playing, status.is_paused));
            }

            status.updated_at = now();
            if let Some(phase) = phase_event {
                self.emit_phase(&status, phase);
            }
            status.phase_seq
        };

        if let Some(paused) = update.is_paused {
            self.paused_tx.send_if_modified(|current| {
                let changed = *current != paused;
                *current = paused;
                changed
            });
        }
        if let Some((elapsed_ms, duration_ms, progress)) = progress_event {
            self.events.emit_lossy(RadioEvent::PlaybackProgress {
                elapsed_ms,
                duration_ms,
                progress,
                timestamp: now(),
            });
        }
        if let Some((is_playing, is_paused)) = state_event {
            self.events.emit_lossy(RadioEvent::PlaybackStateChanged {
                is_playing,
                is_paused,
                timestamp: now(),
            });
        }
        Some(seq)
    }

    // Emitted under the lock so subscribers see phase changes in publish order.
    fn emit_phase(&self, status: &PlaybackStatus, phase: PlaybackPhase) {
        self.events.emit_lossy(RadioEvent::PhaseChanged {
            sequence_id: status.sequence_id,
            phase,
            rank: status.current_rank,
            timestamp: now(),
        });
    }

    /// End of a sequence: zero progress and enter `idle` or `ended`
    pub fn mark_stopped(&self, terminal: Terminal) {
        let phase = match terminal {
            Terminal::Idle => PlaybackPhase::Idle,
            Terminal::Ended => PlaybackPhase::Ended,
        };

        let state_changed = {
            let mut status = self.lock();
            let changed = status.is_playing || status.is_paused;
            status.phase = phase;
            status.phase_seq += 1;
            status.is_playing = false;
            status.is_paused = false;
            status.stopped = true;
            status.elapsed_seconds = 0.0;
            status.duration_seconds = 0.0;
            status.percent_complete = 0.0;
            status.context = PhaseContext::None;
            status.updated_at = now();
            self.emit_phase(&status, phase);
            changed
        };

        self.paused_tx.send_if_modified(|current| {
            let changed = *current;
            *current = false;
            changed
        });
        if state_changed {
            self.events.emit_lossy(RadioEvent::PlaybackStateChanged {
                is_playing: false,
                is_paused: false,
                timestamp: now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PlaybackStatusStore {
        PlaybackStatusStore::new(Arc::new(EventBus::new(64)))
    }

    #[test]
    fn starts_idle() {
        let status = store().snapshot();
        assert_eq!(status.phase, PlaybackPhase::Idle);
        assert!(!status.is_playing);
        assert_eq!(status.percent_complete, 0.0);
    }

    #[test]
    fn mark_playing_resets_terminal_flags() {
        let store = store();
        store.update_phase(PhaseUpdate::keep().stopped(true).cancel_requested(true).paused(true));

        store.mark_playing(Uuid::new_v4(), PlaybackMode::Collection, "es", PhaseContext::None);
        let status = store.snapshot();
        assert_eq!(status.phase, PlaybackPhase::Loading);
        assert!(status.is_playing);
        assert!(!status.stopped);
        assert!(!status.cancel_requested);
        assert!(!status.is_paused);
        assert!(!store.is_paused());
        assert_eq!(status.mode, PlaybackMode::Collection);
        assert_eq!(status.language, "es");
    }

    #[test]
    fn progress_is_monotonic_and_reaches_one_at_duration() {
        let store = store();
        store.update_phase(PhaseUpdate::to(PlaybackPhase::Track));

        let duration = 10.0;
        let mut last = 0.0;
        for elapsed in [0.0, 2.5, 2.0, 7.5, 9.99, 5.0] {
            store.update_phase(PhaseUpdate::keep().progress(elapsed, duration));
            let percent = store.snapshot().percent_complete;
            assert!(percent >= last, "{} < {}", percent, last);
            assert!(percent < 1.0);
            last = percent;
        }

        store.update_phase(PhaseUpdate::keep().progress(10.0, duration));
        assert_eq!(store.snapshot().percent_complete, 1.0);
        store.update_phase(PhaseUpdate::keep().progress(12.0, duration));
        assert_eq!(store.snapshot().percent_complete, 1.0);
    }

    #[test]
    fn new_phase_resets_progress() {
        let store = store();
        store.update_phase(PhaseUpdate::to(PlaybackPhase::Intro).progress(3.0, 6.0));
        assert_eq!(store.snapshot().percent_complete, 0.5);

        store.update_phase(PhaseUpdate::to(PlaybackPhase::Detail));
        let status = store.snapshot();
        assert_eq!(status.elapsed_seconds, 0.0);
        assert_eq!(status.percent_complete, 0.0);
    }

    #[test]
    fn zero_duration_reports_zero_percent() {
        let store = store();
        store.update_phase(PhaseUpdate::to(PlaybackPhase::Track).progress(5.0, 0.0));
        assert_eq!(store.snapshot().percent_complete, 0.0);
    }

    #[test]
    fn guarded_update_ignored_after_newer_phase() {
        let store = store();
        let seq = store.update_phase(PhaseUpdate::to(PlaybackPhase::Track)).unwrap();
        store.update_phase(PhaseUpdate::to(PlaybackPhase::TrackFinished));

        let applied = store.update_phase(PhaseUpdate::keep().progress(4.0, 8.0).if_phase_seq(seq));
        assert!(applied.is_none());
        assert_eq!(store.snapshot().elapsed_seconds, 0.0);
    }

    #[test]
    fn mark_stopped_zeroes_progress() {
        let store = store();
        store.mark_playing(Uuid::new_v4(), PlaybackMode::DecadeGenre, "en", PhaseContext::None);
        store.update_phase(PhaseUpdate::to(PlaybackPhase::Track).progress(30.0, 60.0));

        store.mark_stopped(Terminal::Ended);
        let status = store.snapshot();
        assert_eq!(status.phase, PlaybackPhase::Ended);
        assert!(!status.is_playing);
        assert!(status.stopped);
        assert_eq!(status.elapsed_seconds, 0.0);
        assert_eq!(status.duration_seconds, 0.0);
        assert_eq!(status.percent_complete, 0.0);
        assert_eq!(status.context, PhaseContext::None);
    }

    #[tokio::test]
    async fn pause_watch_follows_flag() {
        let store = store();
        let mut rx = store.paused_watch();
        assert!(!*rx.borrow_and_update());

        store.update_phase(PhaseUpdate::keep().paused(true));
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(store.snapshot().is_paused);
    }

    #[tokio::test]
    async fn phase_changes_are_broadcast() {
        let events = Arc::new(EventBus::new(16));
        let mut rx = events.subscribe();
        let store = PlaybackStatusStore::new(events);

        store.update_phase(PhaseUpdate::to(PlaybackPhase::Prelude).item(4, "T", "A"));
        match rx.recv().await.unwrap() {
            RadioEvent::PhaseChanged { phase, rank, .. } => {
                assert_eq!(phase, PlaybackPhase::Prelude);
                assert_eq!(rank, Some(4));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
