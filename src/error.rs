// Error types for the backend client and the HTTP site.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failures talking to the dealership REST backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to dealership API failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("dealership API returned {status} for {path}")]
    Status {
        status: reqwest::StatusCode,
        path: String,
    },
    #[error("dealership API reported failure for {path}: {message}")]
    Unsuccessful { path: String, message: String },
    #[error("could not decode dealership API response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("dealership API did not answer within {0:?}")]
    Timeout(Duration),
}

// Application error surfaced by route handlers
#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                // Log the detailed error, never expose it
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
