//! Server-Sent Events (SSE) utilities
//!
//! Turns an `EventBus` subscription into an axum SSE response.

use crate::events::RadioEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Stream broadcast events to one SSE client
///
/// Sends a `ConnectionStatus` event first, then each `RadioEvent` as JSON with
/// the SSE `event:` field set to its type. Lagged receivers skip the lost
/// events and keep streaming; the stream ends when the bus is dropped.
pub fn event_sse_stream(
    service_name: &'static str,
    mut rx: broadcast::Receiver<RadioEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        debug!("Broadcasting SSE event: {}", event.event_type());
                        yield Ok(Event::default().event(event.event_type()).data(json));
                    }
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
