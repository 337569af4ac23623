//! Single-rank sequence runner
//!
//! Publishes the head item of the ordered range and returns without waiting
//! for the track. Moving to another item is a new launch (see
//! [`super::navigation`]).

use super::context::{LoadingContext, PhaseContext};
use super::item::{narration_language, play_item, ItemOutcome};
use super::ordering::order_items;
use super::{fetch_items, release_flags, Launch, LaunchReport, PlaybackServices, SequenceRequest, SequenceRun};
use crate::error::{Error, Result};
use crate::state::Terminal;
use radiocast_common::events::SequenceOutcome;
use tracing::{error, info};

pub async fn run_single_rank(
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
            continuous: false,
        }),
    );

    let items = match fetch_items(&services, &run, &request.scope, request.range).await {
        Ok(items) => items,
        Err(Error::Cancelled) => {
            release_flags(&services);
            return Err(Error::Cancelled);
        }
        Err(e) => {
            error!(sequence_id = %run.id, "Catalog fetch failed: {}", e);
            launch.report(LaunchReport::Error {
                sequence_id: run.id,
                message: e.to_string(),
            });
            release_flags(&services);
            return Ok(SequenceOutcome::Failed);
        }
    };

    let ordered = order_items(items, request.order);
    let Some(head) = ordered.first().cloned() else {
        info!(sequence_id = %run.id, scope = %request.scope, "No catalog items in range");
        release_flags(&services);
        launch.report(LaunchReport::Empty { sequence_id: run.id });
        return Ok(SequenceOutcome::Empty);
    };

    launch.report(LaunchReport::Started {
        sequence_id: run.id,
        ranks: ordered.iter().map(|item| item.rank).collect(),
    });

    match play_item(&services, &run, &request, &head, false).await {
        Ok(ItemOutcome::TrackPublished(_)) => Ok(SequenceOutcome::Published),
        Ok(ItemOutcome::NoTrack) | Ok(ItemOutcome::TrackEndedDuringNarration { .. }) => {
            services.status.mark_stopped(Terminal::Ended);
            Ok(SequenceOutcome::Published)
        }
        Err(Error::Cancelled) => {
            release_flags(&services);
            Err(Error::Cancelled)
        }
        Err(e) => {
            error!(sequence_id = %run.id, rank = head.rank, "Single-rank sequence failed: {}", e);
            release_flags(&services);
            Ok(SequenceOutcome::Failed)
        }
    }
}
