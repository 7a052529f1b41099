//! CDP error types.

use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Chrome not found or not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    /// Failed to open the WebSocket.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The browser answered a command with an error.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (endpoint discovery, tab creation).
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// The connection went away before the answer arrived.
    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CdpError {
    /// Whether the browser reported that it keeps no body for a request.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::Protocol { message, .. } if message.contains("No data found"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_detection() {
        let err = CdpError::Protocol {
            code: -32000,
            message: "No data found for resource with given identifier".to_string(),
        };
        assert!(err.is_no_data());

        let err = CdpError::Protocol {
            code: -32000,
            message: "No resource with given identifier found".to_string(),
        };
        assert!(!err.is_no_data());
        assert!(!CdpError::SessionClosed.is_no_data());
    }

    #[test]
    fn test_protocol_display() {
        let err = CdpError::Protocol {
            code: -32601,
            message: "'Foo.bar' wasn't found".to_string(),
        };
        assert_eq!(err.to_string(), "CDP error: 'Foo.bar' wasn't found (code: -32601)");
    }
}
