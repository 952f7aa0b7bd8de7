//! Client errors

use std::io;

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error reported by the server, code passed through unchanged
    #[error("{code}: {message}")]
    Server { code: String, message: String },
}

impl ClientError {
    /// Error code for display: the server code, or a local one
    pub fn code(&self) -> &str {
        match self {
            ClientError::Io(_) => "CONNECTION_ERROR",
            ClientError::Protocol(_) => "PROTOCOL_ERROR",
            ClientError::Server { code, .. } => code,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ClientError::Io(e) => e.to_string(),
            ClientError::Protocol(m) => m.clone(),
            ClientError::Server { message, .. } => message.clone(),
        }
    }
}
