//! Server-Sent Events endpoint

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - SSE stream of `RadioEvent`s
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    radiocast_common::sse::event_sse_stream("radiocast-engine", ctx.engine.subscribe_events())
}
