//! HTTP control API for the player
//!
//! - `GET  /health`              liveness
//! - `GET  /api/available-files` playable file ids
//! - `PUT  /api/current-song`    play / reposition / stop
//! - `GET  /api/current-song`    last broadcast status
//! - `GET  /api/events`          status broadcasts as Server-Sent Events

pub mod handlers;
pub mod sse;

use crate::controller::PlayerHandle;
use axum::{
    routing::get,
    Router,
};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Player service client
    pub player: PlayerHandle,
    /// Audio files root directory
    pub wav_dir: PathBuf,
    /// Static player identity
    pub player_uuid: String,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/available-files", get(handlers::available_files))
        .route(
            "/api/current-song",
            get(handlers::get_current_song).put(handlers::put_current_song),
        )
        .route("/api/events", get(sse::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
