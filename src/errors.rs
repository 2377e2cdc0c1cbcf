//! Error types for the playlist checker
//!
//! Fatal conditions (unreadable input, malformed playlist, bad configuration)
//! surface as `AppError` and abort the run. Per-channel probe failures are not
//! errors at this level; they are folded into `ProbeOutcome` by the prober.

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Input document cannot be parsed as an M3U playlist
    #[error("malformed playlist at line {line}: {message}")]
    MalformedPlaylist { line: usize, message: String },

    /// Invalid configuration detected before the run starts
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors reading input or writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Report serialization errors
    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Create a malformed playlist error pointing at a source line
    pub fn malformed_playlist<S: Into<String>>(line: usize, message: S) -> Self {
        Self::MalformedPlaylist {
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
