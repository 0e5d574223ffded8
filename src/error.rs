//! Common error types for the load balancing gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("no live backends available")]
    NoLiveBackends,

    #[error("forwarding request failed: {0}")]
    Forward(#[from] reqwest::Error),

    #[error("failed to read request body: {0}")]
    BodyRead(#[from] axum::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NoLiveBackends => StatusCode::SERVICE_UNAVAILABLE,
            // Transport failures surface as a plain 500 with the error text
            // as body, matching what callers of the balancer expect.
            AppError::Forward(_) | AppError::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) | AppError::UnknownStrategy(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
