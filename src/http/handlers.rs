use super::identity::UserId;
use super::state::AppState;
use crate::config::HttpConfig;
use crate::error::{ApiError, FlagResponse, RecordingError};
use crate::recording::RecordingDownload;
use crate::session::SessionSnapshot;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;
use tracing::info;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub environment: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub active_sessions_count: usize,
    pub stream_url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /start-recording
/// Start recording the live stream, replacing any recording in progress
pub async fn start_recording(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<StartRecordingResponse>, ApiError> {
    info!("Starting recording for user: {}", user_id);

    let session = state.sessions.get_or_create(user_id.as_str()).await;
    let started = state
        .recorder
        .start(&session)
        .await
        .map_err(ApiError::StartRecording)?;

    Ok(Json(StartRecordingResponse {
        message: "Recording started successfully".to_string(),
        filename: started.filename,
    }))
}

/// POST /stop-recording
/// Stop recording and send the MP3 back; the file is deleted once sent
pub async fn stop_recording(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<RecordingDownload, ApiError> {
    info!("Stopping recording for user: {}", user_id);

    let session = state
        .sessions
        .get(user_id.as_str())
        .await
        .ok_or(ApiError::StopRecording(RecordingError::NoActiveRecording))?;

    let finished = state
        .recorder
        .stop(&session)
        .await
        .map_err(ApiError::StopRecording)?;

    RecordingDownload::open(finished)
        .await
        .map_err(ApiError::StopRecording)
}

/// POST /stream/start-stream
/// Raise the listening flag (idempotent)
pub async fn start_stream(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Json<FlagResponse> {
    info!("Starting stream for user: {}", user_id);

    let session = state.sessions.get_or_create(user_id.as_str()).await;
    let message = if session.start_stream().await {
        "Stream started successfully."
    } else {
        "Stream already active."
    };

    Json(FlagResponse {
        success: true,
        message: message.to_string(),
    })
}

/// POST /stop-stream
/// Lower the listening flag
pub async fn stop_stream(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<FlagResponse>, ApiError> {
    info!("Stopping stream for user: {}", user_id);

    let stopped = match state.sessions.get(user_id.as_str()).await {
        Some(session) => session.stop_stream().await,
        None => false,
    };

    if !stopped {
        info!("No active stream session found for user {}", user_id);
        return Err(ApiError::StreamNotActive);
    }

    Ok(Json(FlagResponse {
        success: true,
        message: "Stream stopped successfully.".to_string(),
    }))
}

/// GET /status
/// Report the caller's session and the server's public stream URL
pub async fn status(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    headers: HeaderMap,
) -> Json<StatusResponse> {
    let session = match state.sessions.get(user_id.as_str()).await {
        Some(session) => session.snapshot(),
        None => SessionSnapshot::default(),
    };

    Json(StatusResponse {
        status: "running".to_string(),
        environment: state.config.service.environment.as_str().to_string(),
        user_id: user_id.0,
        session,
        active_sessions_count: state.sessions.len().await,
        stream_url: public_stream_url(&headers, &state.config.service.http),
    })
}

/// GET /stream (and legacy GET /proxyStream)
/// Relay the upstream live audio
pub async fn proxy_stream(State(state): State<AppState>) -> Response {
    match state.proxy.open().await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// GET /
pub async fn root() -> impl IntoResponse {
    (StatusCode::OK, "Server is working!")
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `/stream` as seen by the client, honouring a TLS-terminating proxy
fn public_stream_url(headers: &HeaderMap, http: &HttpConfig) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}:{}", http.bind, http.port));

    format!("{}://{}/stream", scheme, host)
}
