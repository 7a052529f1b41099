//! Analysis errors.

use netlens_protocols::error::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No network data captured. Capture a page first.")]
    NoCapturedData,

    #[error("Query cannot be empty")]
    EmptyQuery,

    /// The service refused the credential or the request (4xx other than 429).
    #[error("Request rejected by the AI service ({0}). Check your Gemini API key.")]
    CredentialRejected(String),

    #[error("Analysis failed: {0}")]
    Failed(ProviderError),

    #[error("No response from AI")]
    EmptyResponse,

    #[error("Could not determine a URL for this query. Please provide one.")]
    NoUrlSuggested,

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to serialize request data: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ProviderError> for AnalysisError {
    fn from(err: ProviderError) -> Self {
        if err.is_client_error() {
            Self::CredentialRejected(err.to_string())
        } else {
            Self::Failed(err)
        }
    }
}
