//! # Playback Error Types
//!
//! Errors surfaced by source assignment and play requests.
//!
//! Every variant carries owned strings so one outcome can be cloned to all
//! callers waiting on the same play execution.

use thiserror::Error;

/// Errors that can occur while coordinating playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// A middleware refused the source during the set-source pass.
    #[error("Source rejected by middleware: {0}")]
    SourceRejected(String),

    /// The descriptor is missing its URL or type.
    #[error("Invalid source descriptor: {0}")]
    InvalidSource(String),

    /// The backend refused to begin loading the accepted source.
    #[error("Backend error: {0}")]
    Tech(String),

    // ========================================================================
    // Middleware Errors
    // ========================================================================
    /// A middleware hook panicked. The pass it was part of was aborted.
    #[error("Middleware fault: {0}")]
    MiddlewareFault(String),

    // ========================================================================
    // Play Errors
    // ========================================================================
    /// The asynchronous result returned by the backend's play call rejected.
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// The request was superseded before it could execute.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The player was disposed while the request was outstanding.
    #[error("Player disposed")]
    Disposed,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Returns `true` if the request was dropped rather than failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PlaybackError::Cancelled(_) | PlaybackError::Disposed)
    }

    /// Returns `true` if this error came out of source assignment.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceRejected(_)
                | PlaybackError::InvalidSource(_)
                | PlaybackError::Tech(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
