//! Continuous sequence runner
//!
//! Walks the whole ordered range, waiting for each track to finish before the
//! next item. Ends as `complete` (list exhausted), `cancelled` (propagated as
//! `Error::Cancelled`) or `failed`. Each ending releases the playing flags
//! exactly once.

use super::context::{LoadingContext, PhaseContext};
use super::item::{await_track, narration_language, play_item, publish_track_finished, ItemOutcome, TrackEnd};
use super::ordering::order_items;
use super::signals::cancellable_sleep;
use super::{fetch_items, release_flags, Launch, LaunchReport, PlaybackServices, SequenceRequest, SequenceRun};
use crate::catalog::CatalogItem;
use crate::error::{Error, Result};
use crate::state::Terminal;
use radiocast_common::events::SequenceOutcome;
use tracing::{debug, error, info, warn};

pub async fn run_continuous(
    services: PlaybackServices,
    run: SequenceRun,
    request: SequenceRequest,
    mut launch: Launch,
) -> Result<SequenceOutcome> {
    let language = narration_language(&request, &services.settings);
    services.status.mark_playing(
        run.id,
        request.scope.mode(),
        language,
        PhaseContext::Loading(LoadingContext {
            scope: request.scope.clone(),
            range: request.range,
            order: request.order,
            continuous: true,
        }),
    );

    let fetched = fetch_items(&services, &run, &request.scope, request.range).await;
    let items = match fetched {
        Ok(items) => order_items(items, request.order),
        Err(e) => {
            if !e.is_cancelled() {
                launch.report(LaunchReport::Error {
                    sequence_id: run.id,
                    message: e.to_string(),
                });
            }
            return finish(&services, &run, Err(e));
        }
    };

    if items.is_empty() {
        info!(sequence_id = %run.id, scope = %request.scope, "No catalog items in range");
        release_flags(&services);
        launch.report(LaunchReport::Empty { sequence_id: run.id });
        return Ok(SequenceOutcome::Empty);
    }

    launch.report(LaunchReport::Started {
        sequence_id: run.id,
        ranks: items.iter().map(|item| item.rank).collect(),
    });

    let played = play_all(&services, &run, &request, &items).await;
    finish(&services, &run, played)
}

fn finish(
    services: &PlaybackServices,
    run: &SequenceRun,
    result: Result<()>,
) -> Result<SequenceOutcome> {
    match result {
        Ok(()) => {
            info!(sequence_id = %run.id, "Sequence complete");
            services.status.mark_stopped(Terminal::Ended);
            Ok(SequenceOutcome::Complete)
        }
        Err(Error::Cancelled) => {
            release_flags(services);
            Err(Error::Cancelled)
        }
        Err(e) => {
            error!(sequence_id = %run.id, "Continuous sequence failed: {}", e);
            release_flags(services);
            Ok(SequenceOutcome::Failed)
        }
    }
}

async fn play_all(
    services: &PlaybackServices,
    run: &SequenceRun,
    request: &SequenceRequest,
    items: &[CatalogItem],
) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            cancellable_sleep(services.settings.item_gap, &run.cancel).await?;
        }
        run.pause_point(services).await?;

        match play_item(services, run, request, item, true).await {
            Ok(ItemOutcome::TrackPublished(mut playback)) => {
                match await_track(services, run, &mut playback).await {
                    Ok(end) => {
                        debug!(rank = item.rank, ?end, "Track wait ended");
                        publish_track_finished(
                            services,
                            Some(playback.track_id.clone()),
                            end == TrackEnd::Skipped,
                        );
                    }
                    Err(Error::RenderFailure(reason)) => {
                        warn!(rank = item.rank, "Renderer failed track, skipping item: {}", reason);
                        publish_track_finished(services, Some(playback.track_id.clone()), true);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(ItemOutcome::TrackEndedDuringNarration { track_id }) => {
                publish_track_finished(services, Some(track_id), false);
            }
            Ok(ItemOutcome::NoTrack) => {
                debug!(rank = item.rank, "No track to play for item");
            }
            Err(Error::RenderFailure(reason)) => {
                warn!(rank = item.rank, "Renderer failed item, skipping: {}", reason);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
