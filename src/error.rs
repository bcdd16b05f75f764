//! Error types for the event log engine.
//!
//! One crate-wide enum, matching every stable RPC error code the service
//! surfaces. `code()` and `http_status()` are what the RPC/SSE surface
//! uses to render responses; everything else just propagates with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("stream not found: {0}")]
    StreamNotFound(String),

    #[error("stream version conflict: expected {expected}, found {actual:?}")]
    StreamVersionConflict { expected: i64, actual: Option<u64> },

    #[error("position already exists: {0}")]
    PositionExists(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid json at line {line}: {message}")]
    InvalidJson { line: usize, message: String },

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Stable error code surfaced over RPC.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NamespaceNotFound(_) => "NAMESPACE_NOT_FOUND",
            Error::NamespaceExists(_) => "NAMESPACE_EXISTS",
            Error::StreamNotFound(_) => "STREAM_NOT_FOUND",
            Error::StreamVersionConflict { .. } => "STREAM_VERSION_CONFLICT",
            Error::PositionExists(_) => "POSITION_EXISTS",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::InvalidJson { .. } => "INVALID_JSON",
            Error::MethodNotFound(_) => "METHOD_NOT_FOUND",
            Error::AuthRequired => "AUTH_REQUIRED",
            Error::Decode(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the RPC/SSE surface should respond with: version
    /// conflict is 409, every other error (including `AUTH_REQUIRED`) is
    /// 400 with the stable code string.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::StreamVersionConflict { .. } => 409,
            _ => 400,
        }
    }
}
