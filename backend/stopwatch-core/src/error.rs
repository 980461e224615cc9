// src/error.rs
use axum::http::StatusCode as AxumStatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

// --- Engine Errors ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Malformed boundary timestamp '{raw}': {reason}")]
    MalformedTimestamp { raw: String, reason: String },
    #[error("No tokio runtime available to drive the tick source")]
    NoRuntime,
    #[error("Tick period must be between 1 and {max_ms} ms, got {requested_ms} ms")]
    InvalidTickPeriod { requested_ms: u128, max_ms: u64 },
}

// --- Application Errors ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stopwatch error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("Internal start/stop is disabled while an external control signal is present")]
    ExternalControlActive,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        error!("Error occurred: {:?}", self);
        let (status_code, error_message) = match &self {
            AppError::Config(_) | AppError::InvalidConfig(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error.",
            ),
            AppError::Io(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server file I/O error.",
            ),
            AppError::Tracker(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Stopwatch engine error.",
            ),
            AppError::ExternalControlActive => (
                AxumStatusCode::CONFLICT,
                "The stopwatch is controlled externally; use /stopwatch/control.",
            ),
        };

        (status_code, Json(json!({ "error": error_message }))).into_response()
    }
}
