//! Server-Sent Events status stream
//!
//! Every status broadcast is one `current-song` event whose data is the
//! snapshot JSON, the same payload `GET /api/current-song` returns.

use crate::api::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// SSE event name for status snapshots
pub const CURRENT_SONG_EVENT: &str = "current-song";

/// GET /api/events - SSE status stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let rx = state
        .player
        .subscribe_status()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    debug!("New SSE client connected");

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(snapshot) => match Event::default().event(CURRENT_SONG_EVENT).json_data(&snapshot) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    warn!("Failed to serialize status: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged receiver: skip the missed snapshots
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
