//! Playback of one catalog item
//!
//! Shared by both runners: prelude, the enabled narration phases, then the
//! track phase. "over" mode ducks the device for the narration window and
//! always restores it, including when the window ends in an error or a
//! cancellation.

use super::context::{PhaseContext, PreludeContext, TrackContext, TrackFinishedContext};
use super::narration::{
    log_narration_outcome, publish_narration_phase, publish_resolved, resolve_narration,
    NarrationPhase,
};
use super::signals::{
    await_completion, optional_sleep, Completion, CompletionKind, CompletionWaiter, WaitOutcome,
};
use super::{PlaybackServices, SequenceRequest, SequenceRun};
use crate::assets::{bucket_for_language, canonical_language};
use crate::catalog::CatalogItem;
use crate::config::EngineSettings;
use crate::error::{Error, Result};
use crate::state::PhaseUpdate;
use radiocast_common::events::{PlaybackPhase, VoiceStyle};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A published track phase
pub struct TrackPlayback {
    pub track_id: String,
    /// Armed when the caller waits for the track
    pub waiter: Option<CompletionWaiter>,
    pub duration: Duration,
    pub phase_seq: u64,
}

pub enum ItemOutcome {
    TrackPublished(TrackPlayback),
    /// Track disabled or the item has no streaming id
    NoTrack,
    /// "over" mode: the underlay track ended while narration was playing
    TrackEndedDuringNarration { track_id: String },
}

/// How a track wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEnd {
    Finished,
    Skipped,
    TimedOut,
}

/// Language actually used for narration of `request`
pub fn narration_language(request: &SequenceRequest, settings: &EngineSettings) -> &'static str {
    canonical_language(
        request
            .language
            .as_deref()
            .unwrap_or(&settings.default_language),
    )
}

/// Track length used for progress, from the catalog or the fallback, capped
pub fn track_duration(item: &CatalogItem, settings: &EngineSettings) -> Duration {
    let duration = item
        .duration_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(settings.track_fallback);
    duration.min(settings.track_max)
}

/// Publish prelude, narration and track phases for `item`
///
/// With `await_track` the returned track phase carries an armed waiter.
pub async fn play_item(
    services: &PlaybackServices,
    run: &SequenceRun,
    request: &SequenceRequest,
    item: &CatalogItem,
    await_track: bool,
) -> Result<ItemOutcome> {
    run.pause_point(services).await?;

    let language = narration_language(request, &services.settings);
    let bucket = bucket_for_language(&services.settings.buckets, language).to_string();
    let track_id = item
        .spotify_track_id
        .clone()
        .filter(|id| !id.is_empty() && request.flags.play_track);

    info!(
        sequence_id = %run.id,
        rank = item.rank,
        track = %item.track_name,
        artist = %item.artist_name,
        "Playing item"
    );
    services.status.update_phase(
        PhaseUpdate::to(PlaybackPhase::Prelude)
            .item(item.rank, &item.track_name, &item.artist_name)
            .context(PhaseContext::Prelude(PreludeContext {
                rank: item.rank,
                track_name: item.track_name.clone(),
                artist_name: item.artist_name.clone(),
                voice_style: request.voice_style,
                spotify_track_id: item.spotify_track_id.clone(),
            })),
    );

    let flags = request.flags;
    let narration_phases: Vec<PlaybackPhase> = [
        (PlaybackPhase::Intro, flags.play_intro),
        (PlaybackPhase::Detail, flags.play_detail),
        (PlaybackPhase::Artist, flags.play_artist),
    ]
    .into_iter()
    .filter_map(|(phase, enabled)| enabled.then_some(phase))
    .collect();

    match request.voice_style {
        VoiceStyle::Before => {
            for phase in narration_phases {
                publish_narration_phase(
                    services,
                    run,
                    phase,
                    &request.scope,
                    item,
                    &bucket,
                    VoiceStyle::Before,
                )
                .await?;
            }
            match track_id {
                Some(id) => {
                    publish_track(services, run, item, id, None, false, await_track).await
                }
                None => Ok(ItemOutcome::NoTrack),
            }
        }
        VoiceStyle::Over => {
            let mut track_waiter = track_id.as_ref().map(|_| {
                services
                    .completions
                    .arm(CompletionKind::Track, run.id, PlaybackPhase::Track)
            });

            let mut ducked = false;
            let narrated = narrate_over(
                services,
                run,
                request,
                item,
                &bucket,
                &narration_phases,
                track_id.as_deref(),
                &mut track_waiter,
                &mut ducked,
            )
            .await;
            if ducked {
                services
                    .set_volume_best_effort(services.settings.main_volume)
                    .await;
            }
            let track_ended = narrated?;

            match track_id {
                Some(id) if track_ended => Ok(ItemOutcome::TrackEndedDuringNarration { track_id: id }),
                Some(id) => {
                    publish_track(services, run, item, id, track_waiter, ducked, await_track).await
                }
                None => Ok(ItemOutcome::NoTrack),
            }
        }
    }
}

/// "over" narration window; returns true when the underlay track ended first
#[allow(clippy::too_many_arguments)]
async fn narrate_over(
    services: &PlaybackServices,
    run: &SequenceRun,
    request: &SequenceRequest,
    item: &CatalogItem,
    bucket: &str,
    phases: &[PlaybackPhase],
    underlay_track_id: Option<&str>,
    track_waiter: &mut Option<CompletionWaiter>,
    ducked: &mut bool,
) -> Result<bool> {
    let clips: Vec<_> = phases
        .iter()
        .filter_map(|phase| resolve_narration(services, *phase, &request.scope, item, bucket))
        .collect();
    if clips.is_empty() {
        return Ok(false);
    }

    run.pause_point(services).await?;
    debug!(duck = services.settings.duck_volume, "Ducking device for narration");
    services
        .set_volume_best_effort(services.settings.duck_volume)
        .await;
    *ducked = true;

    for clip in clips {
        let phase = clip.phase;
        let NarrationPhase::Published(mut waiter) =
            publish_resolved(services, run, clip, VoiceStyle::Over, underlay_track_id).await?
        else {
            continue;
        };

        let outcome = await_completion(
            &mut waiter,
            track_waiter.as_mut(),
            &services.skip,
            &run.cancel,
            services.settings.narration_timeout,
        )
        .await?;
        log_narration_outcome(phase, &outcome);

        match outcome {
            WaitOutcome::SecondaryCompleted(Completion::Finished) => return Ok(true),
            WaitOutcome::SecondaryCompleted(Completion::Failed(reason)) => {
                return Err(Error::RenderFailure(reason))
            }
            _ => {}
        }
    }
    Ok(false)
}

async fn publish_track(
    services: &PlaybackServices,
    run: &SequenceRun,
    item: &CatalogItem,
    track_id: String,
    armed: Option<CompletionWaiter>,
    already_playing: bool,
    await_track: bool,
) -> Result<ItemOutcome> {
    run.pause_point(services).await?;
    services.skip.clear_stale();

    let waiter = match (await_track, armed) {
        (true, Some(waiter)) => Some(waiter),
        (true, None) => Some(services.completions.arm(
            CompletionKind::Track,
            run.id,
            PlaybackPhase::Track,
        )),
        (false, _) => None,
    };
    let duration = track_duration(item, &services.settings);

    let phase_seq = services
        .status
        .update_phase(
            PhaseUpdate::to(PlaybackPhase::Track)
                .context(PhaseContext::Track(TrackContext {
                    spotify_track_id: track_id.clone(),
                    wait_id: waiter.as_ref().map(CompletionWaiter::wait_id),
                    already_playing,
                    duration_ms: Some(duration.as_millis() as u64),
                }))
                .progress(0.0, duration.as_secs_f64()),
        )
        .unwrap_or_default();
    debug!(sequence_id = %run.id, track_id = %track_id, "Published track phase");

    Ok(ItemOutcome::TrackPublished(TrackPlayback {
        track_id,
        waiter,
        duration,
        phase_seq,
    }))
}

/// Elapsed time that only advances while not paused
struct TrackClock {
    elapsed: Duration,
    last: Instant,
}

impl TrackClock {
    fn start() -> Self {
        Self {
            elapsed: Duration::ZERO,
            last: Instant::now(),
        }
    }

    fn tick(&mut self, paused: bool) -> Duration {
        let now = Instant::now();
        if !paused {
            self.elapsed += now.saturating_duration_since(self.last);
        }
        self.last = now;
        self.elapsed
    }
}

/// Wait for the renderer to finish the published track
///
/// Publishes heartbeat progress meanwhile. A renderer failure surfaces as
/// [`Error::RenderFailure`].
pub async fn await_track(
    services: &PlaybackServices,
    run: &SequenceRun,
    playback: &mut TrackPlayback,
) -> Result<TrackEnd> {
    let Some(waiter) = playback.waiter.as_mut() else {
        return Ok(TrackEnd::Finished);
    };

    let mut ticker = tokio::time::interval(services.settings.heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut clock = TrackClock::start();
    let deadline = optional_sleep(services.settings.track_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = run.cancel.cancelled() => return Err(Error::Cancelled),
            done = waiter.recv() => {
                return match done {
                    Some(Completion::Finished) | None => Ok(TrackEnd::Finished),
                    Some(Completion::Failed(reason)) => Err(Error::RenderFailure(reason)),
                };
            }
            _ = services.skip.wait() => {
                info!(track_id = %playback.track_id, "Track skipped");
                services.stop_device_best_effort().await;
                return Ok(TrackEnd::Skipped);
            }
            _ = &mut deadline => {
                warn!(track_id = %playback.track_id, "No track completion before timeout, moving on");
                return Ok(TrackEnd::TimedOut);
            }
            _ = ticker.tick() => {
                let elapsed = clock.tick(services.status.is_paused());
                services.status.update_phase(
                    PhaseUpdate::keep()
                        .progress(elapsed.as_secs_f64(), playback.duration.as_secs_f64())
                        .if_phase_seq(playback.phase_seq),
                );
            }
        }
    }
}

/// Publish `track_finished` after a track wait
pub fn publish_track_finished(services: &PlaybackServices, track_id: Option<String>, skipped: bool) {
    services.status.update_phase(
        PhaseUpdate::to(PlaybackPhase::TrackFinished).context(PhaseContext::TrackFinished(
            TrackFinishedContext {
                spotify_track_id: track_id,
                skipped,
            },
        )),
    );
}
