// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Exam service error.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., second submission for the same quiz)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Failure talking to the exam service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failure acquiring or reading the camera. Never escapes the capture loop.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera available")]
    Unavailable,

    #[error("camera track ended: {0}")]
    TrackEnded(String),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Errors surfaced to the caller of the session coordinator.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Quiz data is missing or malformed; the session cannot start.
    #[error("malformed quiz data: {0}")]
    Protocol(String),

    #[error("failed to load quiz: {0}")]
    Load(#[source] ApiError),

    #[error("quiz deadline has passed")]
    DeadlinePassed,

    #[error("session has already been started")]
    AlreadyStarted,

    #[error("session is not in progress")]
    NotInProgress,

    #[error("unknown question '{0}'")]
    UnknownQuestion(String),

    #[error("option '{option}' is not offered by question '{question}'")]
    UnknownOption { question: String, option: String },

    #[error("failed to start quiz: {0}")]
    Start(#[source] ApiError),

    /// The session is already terminal; no automatic retry is attempted.
    #[error("failed to submit quiz: {0}")]
    Submit(#[source] ApiError),
}
