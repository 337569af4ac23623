//! Narration phase publisher
//!
//! Publishes one narration phase (intro, detail or artist). In "before" mode
//! the call returns once the renderer reports the clip finished, the phase is
//! skipped, or the optional timeout expires. In "over" mode it returns right
//! after publishing, handing the armed waiter back so the caller can pace.
//!
//! A clip that cannot be resolved is skipped without publishing anything.

use super::context::{NarrationContext, PhaseContext};
use super::signals::{await_completion, Completion, CompletionKind, CompletionWaiter, WaitOutcome};
use super::{PlaybackServices, SequenceRun};
use crate::assets::narration_key;
use crate::catalog::{CatalogItem, CatalogScope};
use crate::error::{Error, Result};
use crate::state::PhaseUpdate;
use radiocast_common::events::{PlaybackPhase, VoiceStyle};
use tracing::{debug, info, warn};

/// A narration clip ready to publish
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNarration {
    pub phase: PlaybackPhase,
    pub bucket: String,
    pub key: String,
    pub audio_url: String,
}

/// Result of one narration phase
pub enum NarrationPhase {
    /// No asset; nothing was published
    Skipped,
    /// "before" mode wait ended
    Finished,
    /// "over" mode publish; completion is still pending
    Published(CompletionWaiter),
}

/// Derive and resolve the clip for `phase` of `item`
///
/// `None` when no key can be derived or the resolver has no such asset.
pub fn resolve_narration(
    services: &PlaybackServices,
    phase: PlaybackPhase,
    scope: &CatalogScope,
    item: &CatalogItem,
    bucket: &str,
) -> Option<ResolvedNarration> {
    let Some(key) = narration_key(phase, scope, item) else {
        debug!(%phase, rank = item.rank, "No narration key derivable, skipping phase");
        return None;
    };

    match services.resolver.resolve_audio_ref(bucket, &key) {
        Ok(audio_url) => Some(ResolvedNarration {
            phase,
            bucket: bucket.to_string(),
            key,
            audio_url,
        }),
        Err(Error::AssetMissing { bucket, key }) => {
            warn!(%phase, rank = item.rank, "Narration asset missing ({}/{}), skipping phase", bucket, key);
            None
        }
        Err(e) => {
            warn!(%phase, rank = item.rank, "Narration lookup failed, skipping phase: {}", e);
            None
        }
    }
}

/// Resolve and publish one narration phase
pub async fn publish_narration_phase(
    services: &PlaybackServices,
    run: &SequenceRun,
    phase: PlaybackPhase,
    scope: &CatalogScope,
    item: &CatalogItem,
    bucket: &str,
    voice_style: VoiceStyle,
) -> Result<NarrationPhase> {
    match resolve_narration(services, phase, scope, item, bucket) {
        Some(resolved) => publish_resolved(services, run, resolved, voice_style, None).await,
        None => Ok(NarrationPhase::Skipped),
    }
}

/// Publish an already resolved clip
pub async fn publish_resolved(
    services: &PlaybackServices,
    run: &SequenceRun,
    resolved: ResolvedNarration,
    voice_style: VoiceStyle,
    underlay_track_id: Option<&str>,
) -> Result<NarrationPhase> {
    run.pause_point(services).await?;
    services.skip.clear_stale();

    let phase = resolved.phase;
    let bed_track_id = match (phase, voice_style) {
        (PlaybackPhase::Intro, VoiceStyle::Before) => services.settings.bed_track_id.clone(),
        _ => None,
    };

    let mut waiter = services
        .completions
        .arm(CompletionKind::Narration, run.id, phase);

    services.status.update_phase(
        PhaseUpdate::to(phase).context(PhaseContext::Narration(NarrationContext {
            bucket: resolved.bucket,
            key: resolved.key,
            audio_url: resolved.audio_url,
            voice_style,
            wait_id: Some(waiter.wait_id()),
            bed_track_id: bed_track_id.clone(),
            underlay_track_id: underlay_track_id.map(str::to_string),
        })),
    );
    debug!(%phase, %voice_style, sequence_id = %run.id, "Published narration phase");

    if voice_style == VoiceStyle::Over {
        return Ok(NarrationPhase::Published(waiter));
    }

    let outcome = await_completion(
        &mut waiter,
        None,
        &services.skip,
        &run.cancel,
        services.settings.narration_timeout,
    )
    .await?;
    log_narration_outcome(phase, &outcome);

    if bed_track_id.is_some() {
        services.stop_device_best_effort().await;
    }
    Ok(NarrationPhase::Finished)
}

pub(crate) fn log_narration_outcome(phase: PlaybackPhase, outcome: &WaitOutcome) {
    match outcome {
        WaitOutcome::Completed(Completion::Finished) => debug!(%phase, "Narration finished"),
        WaitOutcome::Completed(Completion::Failed(reason)) => {
            warn!(%phase, "Renderer failed narration clip, continuing: {}", reason)
        }
        WaitOutcome::Skipped => info!(%phase, "Narration skipped"),
        WaitOutcome::TimedOut => warn!(%phase, "No narration completion before timeout, continuing"),
        WaitOutcome::Abandoned => debug!(%phase, "Narration wait replaced"),
        WaitOutcome::SecondaryCompleted(_) => debug!(%phase, "Track ended during narration"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{LocalDirResolver, PublicUrlResolver};
    use crate::catalog::StaticCatalog;
    use crate::config::EngineSettings;
    use crate::device::LoggingDevice;
    use crate::playback::signals::{CompletionRegistry, Delivery, SkipSignal};
    use crate::state::PlaybackStatusStore;
    use radiocast_common::events::EventBus;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn services(resolver: Arc<dyn crate::assets::NarrationResolver>) -> PlaybackServices {
        let events = Arc::new(EventBus::new(64));
        PlaybackServices {
            status: Arc::new(PlaybackStatusStore::new(Arc::clone(&events))),
            skip: Arc::new(SkipSignal::new()),
            completions: Arc::new(CompletionRegistry::new()),
            catalog: Arc::new(StaticCatalog::new()),
            resolver,
            device: Arc::new(LoggingDevice),
            events,
            settings: Arc::new(EngineSettings::default()),
        }
    }

    fn item() -> CatalogItem {
        CatalogItem {
            rank: 1,
            track_name: "Track".to_string(),
            artist_name: "Artist".to_string(),
            spotify_track_id: Some("trk".to_string()),
            spotify_artist_id: None,
            duration_ms: None,
        }
    }

    fn scope() -> CatalogScope {
        CatalogScope::DecadeGenre {
            decade: "1990s".to_string(),
            genre: Some("pop".to_string()),
        }
    }

    fn run() -> SequenceRun {
        SequenceRun::new(Uuid::new_v4(), CancellationToken::new())
    }

    #[tokio::test]
    async fn missing_asset_skips_without_publishing() {
        let dir = tempfile::tempdir().unwrap();
        let svc = services(Arc::new(LocalDirResolver::new(dir.path())));

        let result = publish_narration_phase(
            &svc,
            &run(),
            PlaybackPhase::Intro,
            &scope(),
            &item(),
            "audio-en",
            VoiceStyle::Before,
        )
        .await
        .unwrap();

        assert!(matches!(result, NarrationPhase::Skipped));
        assert_eq!(svc.status.snapshot().phase, PlaybackPhase::Idle);
        assert_eq!(svc.completions.armed(CompletionKind::Narration), None);
    }

    #[tokio::test]
    async fn underivable_key_skips() {
        let svc = services(Arc::new(PublicUrlResolver::new("https://cdn")));
        let result = publish_narration_phase(
            &svc,
            &run(),
            PlaybackPhase::Artist,
            &scope(),
            &item(),
            "audio-en",
            VoiceStyle::Before,
        )
        .await
        .unwrap();
        assert!(matches!(result, NarrationPhase::Skipped));
    }

    #[tokio::test]
    async fn before_mode_blocks_until_narration_finished() {
        let svc = services(Arc::new(PublicUrlResolver::new("https://cdn")));
        let run = run();

        let task = {
            let svc = svc.clone();
            let run = run.clone();
            tokio::spawn(async move {
                publish_narration_phase(
                    &svc,
                    &run,
                    PlaybackPhase::Detail,
                    &scope(),
                    &item(),
                    "audio-en",
                    VoiceStyle::Before,
                )
                .await
            })
        };

        // wait for the publish
        let mut wait_id = None;
        for _ in 0..100 {
            if let Some(id) = svc.status.snapshot().context.wait_id() {
                wait_id = Some(id);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let wait_id = wait_id.expect("narration phase published");
        let status = svc.status.snapshot();
        assert_eq!(status.phase, PlaybackPhase::Detail);
        assert_eq!(
            status.context.audio_url(),
            Some("https://cdn/storage/v1/object/public/audio-en/detail/trk.mp3")
        );
        assert!(!task.is_finished());

        let delivery = svc
            .completions
            .complete(CompletionKind::Narration, Some(wait_id), Completion::Finished);
        assert_eq!(delivery, Delivery::Delivered { wait_id });

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(result, NarrationPhase::Finished));
    }

    #[tokio::test]
    async fn over_mode_returns_immediately_with_waiter() {
        let svc = services(Arc::new(PublicUrlResolver::new("https://cdn")));
        let result = publish_narration_phase(
            &svc,
            &run(),
            PlaybackPhase::Intro,
            &scope(),
            &item(),
            "audio-en",
            VoiceStyle::Over,
        )
        .await
        .unwrap();

        match result {
            NarrationPhase::Published(waiter) => {
                assert_eq!(svc.completions.armed(CompletionKind::Narration), Some(waiter.wait_id()));
            }
            _ => panic!("expected published narration"),
        }
        assert_eq!(svc.status.snapshot().phase, PlaybackPhase::Intro);
    }

    #[tokio::test]
    async fn stale_skip_is_cleared_not_applied() {
        let svc = services(Arc::new(PublicUrlResolver::new("https://cdn")));
        let run = run();
        svc.skip.signal();

        let task = {
            let svc = svc.clone();
            let run = run.clone();
            tokio::spawn(async move {
                publish_narration_phase(
                    &svc,
                    &run,
                    PlaybackPhase::Intro,
                    &scope(),
                    &item(),
                    "audio-en",
                    VoiceStyle::Before,
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished(), "stale skip must not end the phase");
        assert!(!svc.skip.is_set());

        svc.completions
            .complete(CompletionKind::Narration, None, Completion::Finished);
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(result, NarrationPhase::Finished));
    }

    #[tokio::test]
    async fn cancellation_unwinds_before_mode_wait() {
        let svc = services(Arc::new(PublicUrlResolver::new("https://cdn")));
        let run = run();
        let cancel = run.cancel.clone();

        let task = {
            let svc = svc.clone();
            tokio::spawn(async move {
                publish_narration_phase(
                    &svc,
                    &run,
                    PlaybackPhase::Intro,
                    &scope(),
                    &item(),
                    "audio-en",
                    VoiceStyle::Before,
                )
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
