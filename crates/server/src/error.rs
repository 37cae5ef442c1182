//! Error types for the session core.
//!
//! Nothing here is fatal to the process: session errors are reported to the
//! host channel, request errors become `serverResponse.error` frames.

use std::io;
use std::path::PathBuf;

use agentlink_protocol::error_codes;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a session for {project_root} is already running on port {port}")]
    AlreadyRunning { project_root: String, port: u16 },
    #[error("failed to bind loopback listener: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to generate auth token")]
    TokenGeneration,
    #[error(transparent)]
    Lockfile(#[from] LockfileError),
}

#[derive(Debug, thiserror::Error)]
pub enum LockfileError {
    #[error("failed to write lockfile {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove lockfile {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("failed to encode lockfile: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A request-level failure, sent back to the peer with the request's id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RequestError {
    pub code: i32,
    pub message: String,
}

impl RequestError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_method() -> Self {
        Self::new(error_codes::BAD_REQUEST, "Unknown request method")
    }

    pub fn invalid_params(err: impl std::fmt::Display) -> Self {
        Self::new(
            error_codes::BAD_REQUEST,
            format!("Invalid request parameters: {err}"),
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(error_codes::UNAUTHORIZED, "Not authenticated")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(error_codes::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(error_codes::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(error_codes::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL, message)
    }
}
