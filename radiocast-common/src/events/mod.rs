//! Event types for the radiocast event system
//!
//! Provides shared event definitions and the `EventBus` used to fan them out
//! to SSE clients and in-process observers.

mod playback_types;

pub use playback_types::{OrderPolicy, PlaybackMode, PlaybackPhase, SequenceOutcome, VoiceStyle};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Radiocast event types
///
/// Events are broadcast via `EventBus` and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RadioEvent {
    /// A new sequence runner was spawned
    SequenceStarted {
        sequence_id: Uuid,
        mode: PlaybackMode,
        /// Continuous runner (true) or single-rank publisher (false)
        continuous: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The published phase changed
    ///
    /// Triggers:
    /// - SSE: renderer picks up the new phase context
    PhaseChanged {
        sequence_id: Option<Uuid>,
        phase: PlaybackPhase,
        rank: Option<u32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress within the current phase
    PlaybackProgress {
        elapsed_ms: u64,
        duration_ms: u64,
        /// Completion fraction (0.0-1.0)
        progress: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playing/paused flags changed
    PlaybackStateChanged {
        is_playing: bool,
        is_paused: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cancellation of the active sequence was requested
    CancelRequested {
        sequence_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A sequence runner reached a terminal state
    SequenceEnded {
        sequence_id: Uuid,
        outcome: SequenceOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Skip was requested for the current phase
    SkipSignaled {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A completion callback arrived with no matching waiter
    CompletionDiscarded {
        kind: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RadioEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RadioEvent::SequenceStarted { .. } => "SequenceStarted",
            RadioEvent::PhaseChanged { .. } => "PhaseChanged",
            RadioEvent::PlaybackProgress { .. } => "PlaybackProgress",
            RadioEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            RadioEvent::CancelRequested { .. } => "CancelRequested",
            RadioEvent::SequenceEnded { .. } => "SequenceEnded",
            RadioEvent::SkipSignaled { .. } => "SkipSignaled",
            RadioEvent::CompletionDiscarded { .. } => "CompletionDiscarded",
        }
    }
}

/// Broadcast fan-out for `RadioEvent`
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// publishers.
pub struct EventBus {
    tx: broadcast::Sender<RadioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use radiocast_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RadioEvent,
    ) -> Result<usize, broadcast::error::SendError<RadioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RadioEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = RadioEvent::PhaseChanged {
            sequence_id: None,
            phase: PlaybackPhase::Intro,
            rank: Some(3),
            timestamp: chrono::Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(json["phase"], "intro");
        assert_eq!(json["rank"], 3);
        assert_eq!(event.event_type(), "PhaseChanged");
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(RadioEvent::SkipSignaled {
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "SkipSignaled");
    }

    #[test]
    fn emit_without_subscribers_errors_but_lossy_does_not() {
        let bus = EventBus::new(4);
        let event = RadioEvent::SkipSignaled {
            timestamp: chrono::Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
    }
}
