//! Turns a free-text question into search terms.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use netlens_protocols::provider::{CompletionRequest, LLMProvider};

use crate::prompts::keyword_prompt;

/// Settings for the keyword request.
#[derive(Debug, Clone)]
pub struct KeywordSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Cap for terms recovered from a non-JSON answer.
    pub max_keywords: usize,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            max_output_tokens: 1000,
            max_keywords: 20,
        }
    }
}

/// Asks the reasoning service for search terms, degrading to a local split.
pub struct KeywordSynthesizer {
    provider: Arc<dyn LLMProvider>,
    settings: KeywordSettings,
}

impl KeywordSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: KeywordSettings) -> Self {
        Self { provider, settings }
    }

    /// Never fails. A non-empty query always yields at least one term.
    pub async fn synthesize(&self, query: &str) -> Vec<String> {
        let request = CompletionRequest::prompt(&self.settings.model, keyword_prompt(query))
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_output_tokens);

        let answer = match self.provider.complete(request).await {
            Ok(response) => response.text().trim().to_string(),
            Err(e) => {
                warn!("Keyword generation failed, using query words: {}", e);
                return fallback_keywords(query);
            }
        };
        debug!(answer = %answer, "Keyword answer");

        match parse_keywords(&answer, self.settings.max_keywords) {
            Some(keywords) => {
                info!(count = keywords.len(), ?keywords, "Search keywords");
                keywords
            }
            None => {
                warn!("Keyword answer was unusable, using query words");
                fallback_keywords(query)
            }
        }
    }
}

/// Extract terms from the service's answer, trying stricter forms first.
///
/// Returns `None` when nothing usable was found.
pub fn parse_keywords(answer: &str, max_keywords: usize) -> Option<Vec<String>> {
    let text = strip_code_fence(answer.trim());

    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(text) {
        let keywords: Vec<String> = values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect();
        return non_empty(keywords);
    }

    if let Ok(quoted) = Regex::new(r#"["']([^"']+)["']"#) {
        let keywords: Vec<String> = quoted
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .take(max_keywords)
            .collect();
        if !keywords.is_empty() {
            return Some(keywords);
        }
    }

    let keywords: Vec<String> = text
        .split([',', '\n', '\r', '\t'])
        .map(|w| w.trim().replace(['"', '\'', '[', ']', '`'], ""))
        .filter(|w| !w.is_empty())
        .take(max_keywords)
        .collect();
    non_empty(keywords)
}

/// Lowercased query words longer than two characters, or the whole query.
pub fn fallback_keywords(query: &str) -> Vec<String> {
    let lowered = query.trim().to_lowercase();
    let words: Vec<String> = lowered
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();

    if words.is_empty() && !lowered.is_empty() {
        vec![lowered]
    } else {
        words
    }
}

/// Remove a surrounding Markdown fence and its optional `json` tag. The
/// fenced text may sit on the fence lines themselves.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn non_empty(keywords: Vec<String>) -> Option<Vec<String>> {
    (!keywords.is_empty()).then_some(keywords)
}

#[cfg(test)]
#[path = "keywords_tests.rs"]
mod tests;
