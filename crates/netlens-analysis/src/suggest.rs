//! Target URL suggestion and normalization.

use std::sync::Arc;

use tracing::info;
use url::Url;

use netlens_protocols::provider::{CompletionRequest, LLMProvider};

use crate::error::AnalysisError;
use crate::prompts::url_suggestion_prompt;

/// Asks the reasoning service which page to capture for a question.
pub struct UrlSuggester {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl UrlSuggester {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_output_tokens,
        }
    }

    /// Suggest a normalized URL for `query`.
    pub async fn suggest(&self, query: &str) -> Result<String, AnalysisError> {
        let request = CompletionRequest::prompt(&self.model, url_suggestion_prompt(query))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_output_tokens);

        let response = self.provider.complete(request).await?;
        let suggested = clean_suggestion(response.text()).ok_or(AnalysisError::NoUrlSuggested)?;
        info!(url = %suggested, "Suggested target URL");
        normalize_target_url(&suggested).map_err(|_| AnalysisError::NoUrlSuggested)
    }
}

/// First line of the answer with wrapping quotes and backticks removed.
fn clean_suggestion(answer: &str) -> Option<String> {
    let line = answer.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned = line.trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>')).trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Prepend `https://` when no http(s) scheme is given and check the result parses.
pub fn normalize_target_url(input: &str) -> Result<String, AnalysisError> {
    let trimmed = input.trim();
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Ok(candidate),
        Ok(_) => Err(AnalysisError::InvalidUrl {
            url: input.to_string(),
            message: "missing host".to_string(),
        }),
        Err(e) => Err(AnalysisError::InvalidUrl {
            url: input.to_string(),
            message: e.to_string(),
        }),
    }
}
