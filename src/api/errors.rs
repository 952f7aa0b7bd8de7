//! API error types
//!
//! API errors are pass-through: engine errors keep their original code
//! (`NOT_FOUND`, `INVALID_QUERY`, ...) so every adapter renders the same
//! code for the same failure.

use std::fmt;

use crate::errors::EngineError;

/// API-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// Malformed JSON or missing request fields
    InvalidRequest,
    /// Unknown operation name
    UnknownOperation,
    /// Request exceeded the server's time budget
    Timeout,
    /// The request task failed inside the server
    Internal,
}

impl ApiErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidRequest => "INVALID_REQUEST",
            ApiErrorCode::UnknownOperation => "UNKNOWN_OPERATION",
            ApiErrorCode::Timeout => "TIMEOUT",
            ApiErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// API error with preserved engine error information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Original error code string (from the engine or the API)
    code: String,
    message: String,
}

impl ApiError {
    /// Create an invalid request error
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::InvalidRequest.code().to_string(),
            message: reason.into(),
        }
    }

    /// Create an unknown operation error
    pub fn unknown_operation(op: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::UnknownOperation.code().to_string(),
            message: format!("Unknown operation: {}", op.into()),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self {
            code: ApiErrorCode::Timeout.code().to_string(),
            message: format!("Request timed out after {}s", seconds),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::Internal.code().to_string(),
            message: reason.into(),
        }
    }

    /// Create from an engine error (pass-through)
    pub fn from_engine_error(err: EngineError) -> Self {
        Self {
            code: err.code().code().to_string(),
            message: err.message().to_string(),
        }
    }

    /// Rebuild an error received over the wire
    pub fn from_parts(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::from_engine_error(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_error() {
        let err = ApiError::invalid_request("missing field");
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_unknown_operation_error() {
        let err = ApiError::unknown_operation("foo");
        assert_eq!(err.code(), "UNKNOWN_OPERATION");
        assert!(err.message().contains("foo"));
    }

    #[test]
    fn test_engine_codes_pass_through() {
        let err: ApiError = EngineError::collection_not_found("t", "u").into();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "NOT_FOUND: Collection 't.u' does not exist");
    }
}
