//! Runtime settings for capture sessions.

use std::time::Duration;

/// Timing and size settings for a capture session.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Protocol version requested when attaching.
    pub protocol_version: String,
    /// Quiet period after the last page load before the session completes.
    pub completion_delay: Duration,
    /// Wait after a page load before the page is snapshotted.
    pub snapshot_settle: Duration,
    pub body_retry_delay: Duration,
    pub body_fetch_attempts: u32,
    /// Decoded base64 bodies at or above this many characters are treated as binary.
    pub max_decoded_chars: usize,
    /// Hard ceiling on a session, for pages that never finish loading.
    pub session_limit: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            protocol_version: "1.2".to_string(),
            completion_delay: Duration::from_millis(5000),
            snapshot_settle: Duration::from_millis(2000),
            body_retry_delay: Duration::from_millis(100),
            body_fetch_attempts: 3,
            max_decoded_chars: 1_000_000,
            session_limit: Duration::from_secs(120),
        }
    }
}
