//! # Error Handling
//!
//! Error taxonomy for the daemon. Variants map onto what a caller can do
//! about the failure: fix the request, look at the engine, look at the
//! upstream peer, or look at the local disk.

use thiserror::Error;

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for the Akshara daemon
#[derive(Error, Debug)]
pub enum Error {
    // Client errors
    #[error("invalid scheme identifier: {0}")]
    UnknownScheme(String),

    #[error("{message}")]
    BadRequest { message: String },

    // Engine errors carry the native code and message verbatim
    #[error("{code}:{message}")]
    Engine { code: i32, message: String },

    // Upstream peer errors
    #[error("upstream error: {message}")]
    Upstream { message: String },

    // Pack registry errors
    #[error("No packs found")]
    NoPacksFound,

    #[error("Pack not found")]
    PackNotFound,

    #[error("Pack page not found")]
    PackPageNotFound,

    #[error("Pack already installed")]
    PackAlreadyInstalled,

    #[error("Pack file not found")]
    PackFileNotFound,

    // System errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mutation queue full for scheme {scheme}")]
    QueueFull { scheme: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("authorization failed, {reason}")]
    Auth { reason: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Error::Engine { code, message: message.into() }
    }

    pub fn upstream(message: impl std::fmt::Display) -> Self {
        Error::Upstream { message: message.to_string() }
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        Error::Internal { message: message.to_string() }
    }

    /// Short stable code for logs and monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnknownScheme(_) => "UNKNOWN_SCHEME",
            Error::BadRequest { .. } => "BAD_REQUEST",
            Error::Engine { .. } => "ENGINE_ERROR",
            Error::Upstream { .. } => "UPSTREAM_ERROR",
            Error::NoPacksFound => "NO_PACKS_FOUND",
            Error::PackNotFound => "PACK_NOT_FOUND",
            Error::PackPageNotFound => "PACK_PAGE_NOT_FOUND",
            Error::PackAlreadyInstalled => "PACK_ALREADY_INSTALLED",
            Error::PackFileNotFound => "PACK_FILE_NOT_FOUND",
            Error::Io { .. } => "IO_ERROR",
            Error::QueueFull { .. } => "QUEUE_FULL",
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::Auth { .. } => "AUTH_FAILED",
            Error::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Upstream { .. } | Error::QueueFull { .. } | Error::Io { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io { message: err.to_string(), source: err }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal { message: format!("JSON encoding failed: {}", err) }
    }
}
