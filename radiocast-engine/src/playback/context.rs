//! Per-phase publish data
//!
//! Each phase carries its own context variant so the renderer knows exactly
//! which fields are present: narration phases have an audio URL, the track
//! phase has a streaming id.

use crate::catalog::{CatalogScope, RankRange};
use radiocast_common::events::{OrderPolicy, VoiceStyle};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseContext {
    #[default]
    None,
    Loading(LoadingContext),
    Prelude(PreludeContext),
    Narration(NarrationContext),
    Track(TrackContext),
    TrackFinished(TrackFinishedContext),
}

impl PhaseContext {
    pub fn audio_url(&self) -> Option<&str> {
        match self {
            PhaseContext::Narration(ctx) => Some(&ctx.audio_url),
            _ => None,
        }
    }

    /// Streaming id the renderer should be playing in this phase
    pub fn spotify_track_id(&self) -> Option<&str> {
        match self {
            PhaseContext::Track(ctx) => Some(&ctx.spotify_track_id),
            PhaseContext::Narration(ctx) => ctx
                .underlay_track_id
                .as_deref()
                .or(ctx.bed_track_id.as_deref()),
            PhaseContext::Prelude(ctx) => ctx.spotify_track_id.as_deref(),
            _ => None,
        }
    }

    /// Completion waiter the renderer should name in its callback
    pub fn wait_id(&self) -> Option<Uuid> {
        match self {
            PhaseContext::Narration(ctx) => ctx.wait_id,
            PhaseContext::Track(ctx) => ctx.wait_id,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadingContext {
    pub scope: CatalogScope,
    pub range: RankRange,
    pub order: OrderPolicy,
    pub continuous: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreludeContext {
    pub rank: u32,
    pub track_name: String,
    pub artist_name: String,
    pub voice_style: VoiceStyle,
    pub spotify_track_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NarrationContext {
    pub bucket: String,
    pub key: String,
    pub audio_url: String,
    pub voice_style: VoiceStyle,
    pub wait_id: Option<Uuid>,
    /// Bed music under a "before" intro
    pub bed_track_id: Option<String>,
    /// Track already playing under an "over" narration
    pub underlay_track_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackContext {
    pub spotify_track_id: String,
    pub wait_id: Option<Uuid>,
    /// Started earlier as an "over" underlay
    pub already_playing: bool,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackFinishedContext {
    pub spotify_track_id: Option<String>,
    pub skipped: bool,
}
