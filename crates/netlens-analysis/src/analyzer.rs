//! Query pipeline: keywords, relevance filter, final reasoning call.

use std::sync::Arc;

use tracing::{info, warn};

use netlens_capture::CaptureResult;
use netlens_protocols::provider::{CompletionRequest, LLMProvider};

use crate::error::AnalysisError;
use crate::filter::{FilterSettings, search, select_for_analysis};
use crate::keywords::{KeywordSettings, KeywordSynthesizer};
use crate::prompts::{analysis_prompt, no_matches_message};

/// Settings for the whole pipeline.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub keywords: KeywordSettings,
    pub filter: FilterSettings,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            max_output_tokens: 50_000,
            keywords: KeywordSettings::default(),
            filter: FilterSettings::default(),
        }
    }
}

/// What the pipeline produced.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// The reasoning service answered.
    Answer(AnalysisReport),
    /// No exchange matched any keyword; the service was not asked.
    NoMatches { message: String, keywords: Vec<String> },
}

impl AnalysisOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(report) => &report.answer,
            Self::NoMatches { message, .. } => message,
        }
    }

    pub fn keywords(&self) -> &[String] {
        match self {
            Self::Answer(report) => &report.keywords,
            Self::NoMatches { keywords, .. } => keywords,
        }
    }
}

/// A successful analysis with its bookkeeping.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub answer: String,
    pub keywords: Vec<String>,
    pub relevant: usize,
    pub focused: usize,
    pub total: usize,
    pub estimated_tokens: usize,
    pub truncated: bool,
    /// Page content stood in for at least one failed body.
    pub used_dom_fallback: bool,
}

/// Answers questions about captured traffic.
pub struct NetworkAnalyzer {
    provider: Arc<dyn LLMProvider>,
    keywords: KeywordSynthesizer,
    settings: AnalyzerSettings,
}

impl NetworkAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: AnalyzerSettings) -> Self {
        Self {
            keywords: KeywordSynthesizer::new(provider.clone(), settings.keywords.clone()),
            provider,
            settings,
        }
    }

    pub async fn analyze(
        &self,
        query: &str,
        capture: &CaptureResult,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AnalysisError::EmptyQuery);
        }
        if capture.exchanges.is_empty() {
            return Err(AnalysisError::NoCapturedData);
        }

        let keywords = self.keywords.synthesize(query).await;
        let ranked = search(&capture.exchanges, &keywords, &self.settings.filter);
        if ranked.is_empty() {
            info!(total = capture.exchanges.len(), "No request matched the keywords");
            return Ok(AnalysisOutcome::NoMatches {
                message: no_matches_message(query, &keywords),
                keywords,
            });
        }

        let filter = &self.settings.filter;
        let selection = select_for_analysis(
            &ranked,
            filter.max_relevant_requests,
            filter.max_tokens,
            filter.token_char_ratio,
        )?;
        if selection.truncated {
            warn!(
                estimated_tokens = selection.estimated_tokens,
                budget = filter.max_tokens,
                "Request data truncated to fit the token budget"
            );
        }
        info!(
            focused = selection.focused.len(),
            relevant = ranked.len(),
            estimated_tokens = selection.estimated_tokens,
            "Sending filtered requests for analysis"
        );

        let prompt = analysis_prompt(
            query,
            &keywords,
            &selection.serialized,
            selection.focused.len(),
            capture.exchanges.len(),
        );
        let request = CompletionRequest::prompt(&self.settings.model, prompt)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_output_tokens);

        let response = self.provider.complete(request).await?;
        let answer = response.text().trim();
        if answer.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        Ok(AnalysisOutcome::Answer(AnalysisReport {
            answer: answer.to_string(),
            keywords,
            relevant: ranked.len(),
            focused: selection.focused.len(),
            total: capture.exchanges.len(),
            estimated_tokens: selection.estimated_tokens,
            truncated: selection.truncated,
            used_dom_fallback: capture.used_dom_fallback(),
        }))
    }
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
