//! # REST API Errors
//!
//! Engine errors keep their code; only the HTTP status is chosen here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::errors::{EngineError, EngineErrorCode};

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;

/// REST API errors
#[derive(Debug, Error)]
pub enum RestError {
    /// Body is not valid JSON or has the wrong shape
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// `filter` query parameter is not valid JSON
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{}", .0.message())]
    Engine(#[from] EngineError),

    /// Blocking task failed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RestError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::InvalidBody(_) | RestError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            RestError::Engine(e) => match e.code() {
                EngineErrorCode::NotFound => StatusCode::NOT_FOUND,
                EngineErrorCode::AlreadyExists => StatusCode::CONFLICT,
                EngineErrorCode::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
                EngineErrorCode::InvalidQuery
                | EngineErrorCode::InvalidUpdate
                | EngineErrorCode::TypeMismatch
                | EngineErrorCode::InvalidName
                | EngineErrorCode::InvalidDocument => StatusCode::BAD_REQUEST,
            },
            RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string, identical to the line protocol's
    pub fn code(&self) -> &'static str {
        match self {
            RestError::InvalidBody(_) | RestError::InvalidFilter(_) => "INVALID_REQUEST",
            RestError::Engine(e) => e.code().code(),
            RestError::Internal(_) => "INTERNAL",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl From<&RestError> for ErrorResponse {
    fn from(err: &RestError) -> Self {
        Self {
            status: "error",
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            RestError::Engine(e) if !e.code().is_client_error() => {
                error!(code = e.code().code(), error = %e, "request failed")
            }
            RestError::Internal(_) => error!(error = %self, "request failed"),
            _ => debug!(error = %self, "request rejected"),
        }
        let body = Json(ErrorResponse::from(&self));
        (status, body).into_response()
    }
}
