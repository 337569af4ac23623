//! HTTP request handlers

use crate::api::server::AppContext;
use crate::engine::AdvanceReport;
use crate::error::Error;
use crate::playback::navigation::Direction;
use crate::playback::signals::Delivery;
use crate::playback::{LaunchReport, SequenceRequest};
use crate::state::PlaybackStatus;
use axum::{extract::State, http::StatusCode, Json};
use radiocast_common::events::PlaybackPhase;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    status: String,
}

type ApiError = (StatusCode, Json<StatusResponse>);

/// What a renderer needs to act on the current phase
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererStatus {
    phase: PlaybackPhase,
    audio_url: Option<String>,
    spotify_track_id: Option<String>,
    wait_id: Option<Uuid>,
    elapsed_ms: u64,
    duration_ms: u64,
    progress: f64,
    is_paused: bool,
    stopped: bool,
    phase_seq: u64,
}

impl From<&PlaybackStatus> for RendererStatus {
    fn from(status: &PlaybackStatus) -> Self {
        Self {
            phase: status.phase,
            audio_url: status.context.audio_url().map(str::to_string),
            spotify_track_id: status.context.spotify_track_id().map(str::to_string),
            wait_id: status.context.wait_id(),
            elapsed_ms: status.elapsed_ms(),
            duration_ms: status.duration_ms(),
            progress: status.percent_complete,
            is_paused: status.is_paused,
            stopped: status.stopped,
            phase_seq: status.phase_seq,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStartResponse {
    status: String,
    sequence_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    ranks: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<LaunchReport> for SequenceStartResponse {
    fn from(report: LaunchReport) -> Self {
        match report {
            LaunchReport::Started { sequence_id, ranks } => Self {
                status: "started".to_string(),
                sequence_id,
                ranks: Some(ranks),
                message: None,
            },
            LaunchReport::Empty { sequence_id } => Self {
                status: "empty".to_string(),
                sequence_id,
                ranks: None,
                message: None,
            },
            LaunchReport::Error { sequence_id, message } => Self {
                status: "error".to_string(),
                sequence_id,
                ranks: None,
                message: Some(message),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    direction: Direction,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    #[serde(default)]
    wait_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFailedRequest {
    #[serde(default)]
    wait_id: Option<Uuid>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    elapsed_seconds: f64,
    duration_seconds: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<Delivery> for CallbackResponse {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Delivered { wait_id } => Self {
                status: "delivered".to_string(),
                wait_id: Some(wait_id),
                reason: None,
            },
            Delivery::Stale { reason } => Self {
                status: "stale".to_string(),
                wait_id: None,
                reason: Some(reason),
            },
        }
    }
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

fn api_error(e: Error) -> ApiError {
    let code = match &e {
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::DataSourceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health and Status
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "radiocast-engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /playback/status - renderer polling view
pub async fn get_renderer_status(State(ctx): State<AppContext>) -> Json<RendererStatus> {
    Json(RendererStatus::from(&ctx.engine.status()))
}

/// GET /playback/state - full status snapshot
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlaybackStatus> {
    Json(ctx.engine.status())
}

// ============================================================================
// Commands
// ============================================================================

/// POST /playback/sequence - launch a sequence
///
/// Answers once the catalog load settled: `started`, `empty` or `error`.
pub async fn start_sequence(
    State(ctx): State<AppContext>,
    Json(request): Json<SequenceRequest>,
) -> Result<Json<SequenceStartResponse>, ApiError> {
    info!(scope = %request.scope, continuous = request.continuous, "Sequence requested");
    let report = ctx.engine.start_sequence(request).await.map_err(api_error)?;
    Ok(Json(report.into()))
}

/// POST /playback/advance - manual next/prev
pub async fn advance(
    State(ctx): State<AppContext>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<AdvanceReport>, ApiError> {
    let report = ctx.engine.advance(request.direction).await.map_err(api_error)?;
    Ok(Json(report))
}

pub async fn pause(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.engine.pause().await;
    ok()
}

pub async fn resume(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.engine.resume().await;
    ok()
}

pub async fn stop(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.engine.stop().await;
    ok()
}

pub async fn skip(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.engine.skip();
    ok()
}

// ============================================================================
// Renderer Callbacks
// ============================================================================

/// POST /playback/callbacks/narration-finished
///
/// The body is optional; without a `waitId` the armed wait is completed.
pub async fn narration_finished(
    State(ctx): State<AppContext>,
    body: Option<Json<CallbackRequest>>,
) -> Json<CallbackResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Json(ctx.engine.narration_finished(request.wait_id).into())
}

/// POST /playback/callbacks/track-finished
pub async fn track_finished(
    State(ctx): State<AppContext>,
    body: Option<Json<CallbackRequest>>,
) -> Json<CallbackResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Json(ctx.engine.track_finished(request.wait_id).into())
}

/// POST /playback/callbacks/track-failed
pub async fn track_failed(
    State(ctx): State<AppContext>,
    body: Option<Json<TrackFailedRequest>>,
) -> Json<CallbackResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let reason = request
        .reason
        .unwrap_or_else(|| "renderer reported failure".to_string());
    Json(ctx.engine.track_failed(request.wait_id, reason).into())
}

/// POST /playback/callbacks/progress
pub async fn report_progress(
    State(ctx): State<AppContext>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine
        .report_progress(request.elapsed_seconds, request.duration_seconds)
        .map_err(api_error)?;
    Ok(ok())
}
