//! Error types that cross the HTTP boundary.
//!
//! Everything below the endpoint layer reports failures through these types;
//! handlers convert them into status codes and a message body and never let
//! them propagate further.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("no active recording")]
    NoActiveRecording,

    #[error("failed to launch transcoder: {0}")]
    StartFailed(String),

    #[error("Recording file not found")]
    FileMissing,

    #[error("Recording file is empty")]
    FileEmpty,

    #[error("recording i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordingError {
    /// Invalid-state errors are the caller's fault; everything else is ours.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, RecordingError::NoActiveRecording)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to start recording")]
    StartRecording(#[source] RecordingError),

    #[error("Failed to stop recording")]
    StopRecording(#[source] RecordingError),

    #[error("No active stream session found.")]
    StreamNotActive,

    #[error("Failed to fetch and stream audio: {0}")]
    Upstream(String),
}

/// JSON body for recording failures
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
}

/// JSON body shared by the stream flag endpoints
#[derive(Debug, Serialize)]
pub struct FlagResponse {
    pub success: bool,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::StartRecording(e) | ApiError::StopRecording(e) if e.is_invalid_state() => {
                StatusCode::BAD_REQUEST
            }
            ApiError::StreamNotActive => StatusCode::BAD_REQUEST,
            ApiError::StartRecording(_) | ApiError::StopRecording(_) | ApiError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match std::error::Error::source(&self) {
                Some(source) => error!("{}: {}", self, source),
                None => error!("{}", self),
            }
        }

        let message = self.to_string();
        match self {
            ApiError::StartRecording(source) | ApiError::StopRecording(source)
                if source.is_invalid_state() =>
            {
                (
                    status,
                    Json(ErrorResponse {
                        message: "No active recording session found".to_string(),
                        error: source.to_string(),
                    }),
                )
                    .into_response()
            }
            ApiError::StartRecording(source) | ApiError::StopRecording(source) => (
                status,
                Json(ErrorResponse {
                    message,
                    error: source.to_string(),
                }),
            )
                .into_response(),
            ApiError::StreamNotActive => (
                status,
                Json(FlagResponse {
                    success: false,
                    message,
                }),
            )
                .into_response(),
            ApiError::Upstream(_) => (status, message).into_response(),
        }
    }
}
