//! HTTP request handlers
//!
//! `PUT /api/current-song` accepts `{"file_id": "...", "start_offset_ms": N}`.
//! A missing or empty `file_id` means stop. The JSON body is validated by
//! hand so malformed requests get a plain-text description of what is wrong.

use crate::api::AppState;
use crate::controller::RequestOutcome;
use crate::files;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use wavplayer_common::StatusSnapshot;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

/// Reply to a play / stop request
#[derive(Debug, Serialize)]
pub struct CurrentSongResponse {
    operation_desc: String,
    uuid: String,
    #[serde(skip_serializing_if = "is_zero")]
    play_seq_id: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Validated body of `PUT /api/current-song`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSongRequest {
    pub file_id: String,
    pub start_offset_ms: i64,
}

impl CurrentSongRequest {
    /// Parse and validate a request body.
    ///
    /// Returns the plain-text reason on failure.
    pub fn parse(body: &str) -> Result<Self, String> {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| format!("http request content is not a json string. error msg: '{}'", e))?;
        let object = json
            .as_object()
            .ok_or_else(|| "http request content is not a json object".to_string())?;

        let file_id = match object.get("file_id") {
            None => String::new(),
            Some(Value::String(file_id)) => file_id.clone(),
            Some(other) => {
                return Err(format!(
                    "cannot find valid value for 'file_id' in request json. expected a string, got: {}",
                    other
                ));
            }
        };

        let start_offset_ms = match object.get("start_offset_ms") {
            None => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                format!(
                    "cannot find valid value for 'start_offset_ms' in request json. expected an integer, got: {}",
                    value
                )
            })?,
        };

        Ok(Self {
            file_id,
            start_offset_ms,
        })
    }
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "wavplayer-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// File Endpoints
// ============================================================================

/// GET /api/available-files - Playable file ids, sorted
pub async fn available_files(State(state): State<AppState>) -> Response {
    let wav_dir = state.wav_dir.clone();
    match tokio::task::spawn_blocking(move || files::list_available_files(&wav_dir)).await {
        Ok(Ok(file_ids)) => Json(file_ids).into_response(),
        Ok(Err(e)) => {
            error!("Failed to list audio files: {}", e);
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!("File listing task failed: {}", e);
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Current Song Endpoints
// ============================================================================

/// PUT /api/current-song - Play, reposition or stop
pub async fn put_current_song(State(state): State<AppState>, body: String) -> Response {
    info!("http received put request for current-song: {}", body);

    let request = match CurrentSongRequest::parse(&body) {
        Ok(request) => request,
        Err(reason) => {
            error!("http request failed. returning error string: {}", reason);
            return plain_text(StatusCode::BAD_REQUEST, reason);
        }
    };

    let outcome = if request.file_id.is_empty() {
        state.player.stop_play_request().await
    } else {
        state
            .player
            .new_song_request(request.file_id, request.start_offset_ms)
            .await
    };

    let RequestOutcome {
        success,
        message,
        play_seq_id,
    } = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Player service unavailable: {}", e);
            return plain_text(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
        }
    };

    let response = CurrentSongResponse {
        operation_desc: message,
        uuid: state.player_uuid.clone(),
        play_seq_id,
    };

    if success {
        info!("http request succeeded: {}", response.operation_desc);
        (StatusCode::OK, Json(response)).into_response()
    } else {
        error!("http request failed: {}", response.operation_desc);
        (StatusCode::BAD_REQUEST, Json(response)).into_response()
    }
}

/// GET /api/current-song - Last broadcast status snapshot
pub async fn get_current_song(State(state): State<AppState>) -> Response {
    match state.player.current_status().await {
        Ok(Some(snapshot)) => Json::<StatusSnapshot>(snapshot).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => plain_text(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}
