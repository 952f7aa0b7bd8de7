//! Engine error types
//!
//! Every engine operation returns either a value or an `EngineError`
//! carrying a stable code and a human-readable message. Adapters (TCP
//! server, REST, CLI) render the code and message; they never need to
//! inspect anything else.

use std::fmt;
use std::io;

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorCode {
    /// Database, collection, index, or document target missing
    NotFound,
    /// Create on an existing name, or duplicate `_id`
    AlreadyExists,
    /// Malformed query or unsupported query operator
    InvalidQuery,
    /// No recognized update operator, or operand type disallowed
    InvalidUpdate,
    /// Operator applied to an incompatible existing value
    TypeMismatch,
    /// Underlying persistence failure or detected corruption
    StorageFailure,
    /// Database, collection, or field name rejected
    InvalidName,
    /// Inserted value is not a well-formed document
    InvalidDocument,
}

impl EngineErrorCode {
    /// Returns the string code rendered by adapters
    pub fn code(&self) -> &'static str {
        match self {
            EngineErrorCode::NotFound => "NOT_FOUND",
            EngineErrorCode::AlreadyExists => "ALREADY_EXISTS",
            EngineErrorCode::InvalidQuery => "INVALID_QUERY",
            EngineErrorCode::InvalidUpdate => "INVALID_UPDATE",
            EngineErrorCode::TypeMismatch => "TYPE_MISMATCH",
            EngineErrorCode::StorageFailure => "STORAGE_FAILURE",
            EngineErrorCode::InvalidName => "INVALID_NAME",
            EngineErrorCode::InvalidDocument => "INVALID_DOCUMENT",
        }
    }

    /// Returns true if the caller sent something the engine cannot accept
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineErrorCode::StorageFailure)
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with code, message, and optional I/O source
#[derive(Debug)]
pub struct EngineError {
    code: EngineErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl EngineError {
    /// Create an error with the given code
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::AlreadyExists, message)
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::InvalidQuery, message)
    }

    pub fn invalid_update(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::InvalidUpdate, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::TypeMismatch, message)
    }

    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::InvalidName, message)
    }

    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::InvalidDocument, message)
    }

    /// Create a storage failure, keeping the I/O error as the source
    pub fn storage_failure(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code: EngineErrorCode::StorageFailure,
            message: message.into(),
            source,
        }
    }

    /// Database missing
    pub fn database_not_found(db: &str) -> Self {
        Self::not_found(format!("Database '{}' does not exist", db))
    }

    /// Collection missing
    pub fn collection_not_found(db: &str, coll: &str) -> Self {
        Self::not_found(format!("Collection '{}.{}' does not exist", db, coll))
    }

    /// Returns the error code
    pub fn code(&self) -> EngineErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
