//! Error types shared across Clipcast crates.

use std::path::PathBuf;

/// Top-level error type for Clipcast operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipcastError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Token error: {message}")]
    Token { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Preflight error: {message}")]
    Preflight { message: String },

    #[error("Spawn error: {message}")]
    Spawn { message: String },

    #[error("Encoder exited with code {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },

    #[error("Filesystem error: {message}")]
    Filesystem { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipcastError.
pub type ClipcastResult<T> = Result<T, ClipcastError>;

impl ClipcastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn token(msg: impl Into<String>) -> Self {
        Self::Token {
            message: msg.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol {
            message: msg.into(),
        }
    }

    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight {
            message: msg.into(),
        }
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn {
            message: msg.into(),
        }
    }

    pub fn filesystem(msg: impl Into<String>) -> Self {
        Self::Filesystem {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }
}
