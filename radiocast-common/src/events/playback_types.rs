//! Playback-related type definitions
//!
//! Vocabulary shared by the engine, its HTTP surface and event consumers.

use serde::{Deserialize, Serialize};

/// Phase of the active playback sequence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// No sequence has run, or the last one was stopped
    #[default]
    Idle,
    /// Candidate items are being fetched
    Loading,
    /// Item metadata published ahead of narration
    Prelude,
    /// Intro narration clip
    Intro,
    /// Track detail narration clip
    Detail,
    /// Artist narration clip
    Artist,
    /// Music track
    Track,
    /// Track reported finished, next item pending
    TrackFinished,
    /// Sequence ran to completion
    Ended,
}

impl PlaybackPhase {
    /// Position within one item's canonical order
    /// `[loading, prelude, intro, detail, artist, track]`
    pub fn item_order(&self) -> Option<usize> {
        match self {
            PlaybackPhase::Loading => Some(0),
            PlaybackPhase::Prelude => Some(1),
            PlaybackPhase::Intro => Some(2),
            PlaybackPhase::Detail => Some(3),
            PlaybackPhase::Artist => Some(4),
            PlaybackPhase::Track => Some(5),
            _ => None,
        }
    }

    pub fn is_narration(&self) -> bool {
        matches!(
            self,
            PlaybackPhase::Intro | PlaybackPhase::Detail | PlaybackPhase::Artist
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackPhase::Idle | PlaybackPhase::Ended)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackPhase::Idle => "idle",
            PlaybackPhase::Loading => "loading",
            PlaybackPhase::Prelude => "prelude",
            PlaybackPhase::Intro => "intro",
            PlaybackPhase::Detail => "detail",
            PlaybackPhase::Artist => "artist",
            PlaybackPhase::Track => "track",
            PlaybackPhase::TrackFinished => "track_finished",
            PlaybackPhase::Ended => "ended",
        }
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where narration sits relative to the track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStyle {
    /// Narration fully precedes the track
    #[default]
    Before,
    /// Narration is layered over the already playing track
    Over,
}

impl std::fmt::Display for VoiceStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceStyle::Before => write!(f, "before"),
            VoiceStyle::Over => write!(f, "over"),
        }
    }
}

/// Ordering applied to a fetched rank range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPolicy {
    #[default]
    #[serde(alias = "count_up", alias = "asc")]
    Ascending,
    #[serde(alias = "count_down", alias = "desc")]
    Descending,
    Random,
}

/// Kind of catalog scope a sequence plays from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    DecadeGenre,
    Collection,
}

/// How a sequence runner finished
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOutcome {
    /// Single-rank run published its item and returned
    Published,
    /// Continuous run exhausted its list
    Complete,
    /// No catalog rows matched
    Empty,
    /// Superseded or stopped
    Cancelled,
    /// Aborted on an error
    Failed,
}

impl std::fmt::Display for SequenceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SequenceOutcome::Published => "published",
            SequenceOutcome::Complete => "complete",
            SequenceOutcome::Empty => "empty",
            SequenceOutcome::Cancelled => "cancelled",
            SequenceOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}
