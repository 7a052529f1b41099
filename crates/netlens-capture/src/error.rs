//! Capture error types.

use thiserror::Error;

use crate::channel::TabId;

/// Failure reported by a browser capability.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The browser endpoint could not be reached.
    #[error("Browser not reachable: {0}")]
    Unreachable(String),

    /// A browser command was rejected or failed.
    #[error("{operation} failed: {message}")]
    Command {
        operation: &'static str,
        message: String,
    },

    /// The tab is gone.
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    /// The attached target speaks a different protocol version.
    #[error("Protocol version mismatch: wanted {wanted}, browser has {actual}")]
    VersionMismatch { wanted: String, actual: String },
}

impl ChannelError {
    pub fn command(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            operation,
            message: message.into(),
        }
    }
}

/// Failure fetching a response body.
#[derive(Debug, Clone, Error)]
pub enum BodyFetchError {
    /// The browser retains no body for this request. Retrying will not help.
    #[error("No data: {0}")]
    NoData(String),

    /// Any other failure; may succeed on a later attempt.
    #[error("{0}")]
    Failed(String),
}

/// Errors delivered to a capture caller.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// Opening the capture tab failed.
    #[error("Failed to open capture tab: {0}")]
    TabCreation(ChannelError),

    /// Attaching instrumentation failed.
    #[error("Failed to attach to tab: {0}")]
    Attach(ChannelError),

    /// Enabling network observation failed.
    #[error("Failed to enable network capture: {0}")]
    Enable(ChannelError),

    /// A newer capture replaced this one before it completed.
    #[error("Capture superseded by a newer session")]
    Superseded,

    /// A session handle is already outstanding.
    #[error("A capture session is already active")]
    SessionActive,

    /// The session ended without delivering a result.
    #[error("Capture session ended without a result")]
    Dropped,
}
