//! Storage error types
//!
//! Error codes:
//! - STORAGE_ALREADY_EXISTS - create on an existing database or collection
//! - STORAGE_NOT_FOUND - drop or read of a missing database or collection
//! - STORAGE_IO_ERROR - disk I/O failure
//! - STORAGE_CORRUPTION - checksum or format failure on read

use std::fmt;
use std::io;

use crate::errors::{EngineError, EngineErrorCode};

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    AlreadyExists,
    NotFound,
    Io,
    Corruption,
}

impl StorageErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::AlreadyExists => "STORAGE_ALREADY_EXISTS",
            StorageErrorCode::NotFound => "STORAGE_NOT_FOUND",
            StorageErrorCode::Io => "STORAGE_IO_ERROR",
            StorageErrorCode::Corruption => "STORAGE_CORRUPTION",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error type
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl StorageError {
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::AlreadyExists,
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::NotFound,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new storage I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::Io,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a data corruption error naming the damaged unit
    pub fn corruption(unit: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::Corruption,
            message: format!("{} is corrupt: {}", unit, reason.into()),
            source: None,
        }
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_corruption(&self) -> bool {
        self.code == StorageErrorCode::Corruption
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err.code {
            StorageErrorCode::AlreadyExists => {
                EngineError::new(EngineErrorCode::AlreadyExists, err.message)
            }
            StorageErrorCode::NotFound => EngineError::new(EngineErrorCode::NotFound, err.message),
            StorageErrorCode::Io => EngineError::storage_failure(err.message, err.source),
            StorageErrorCode::Corruption => EngineError::storage_failure(err.message, None),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
