//! Keyword search over captured exchanges and prompt-budget selection.

use regex::RegexBuilder;
use serde::Serialize;
use tracing::{debug, warn};

use netlens_capture::{CapturedExchange, Headers};

pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Limits applied while filtering.
#[derive(Debug, Clone)]
pub struct FilterSettings {
    /// Characters kept on each side of a hit.
    pub context_length: usize,
    /// Ceiling for request and response body excerpts.
    pub body_excerpt_chars: usize,
    pub max_relevant_requests: usize,
    pub max_tokens: usize,
    pub token_char_ratio: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            context_length: 200,
            body_excerpt_chars: 1000,
            max_relevant_requests: 10,
            max_tokens: 500_000,
            token_char_ratio: 4,
        }
    }
}

/// One keyword hit inside an exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub context: String,
    /// Byte offset of the hit in the searched text.
    pub position: usize,
}

/// An exchange with at least one keyword hit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantExchange {
    /// Position in the capture, starting at 0.
    pub request_index: usize,
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub matches: Vec<KeywordMatch>,
    pub headers: Headers,
    pub response_headers: Headers,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
}

/// Find every keyword occurrence in every exchange.
///
/// Exchanges without hits are dropped; the rest keep capture order.
pub fn search(
    exchanges: &[CapturedExchange],
    keywords: &[String],
    settings: &FilterSettings,
) -> Vec<RelevantExchange> {
    let patterns: Vec<_> = keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .filter_map(|keyword| {
            let lowered = keyword.to_lowercase();
            match RegexBuilder::new(&regex::escape(&lowered))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => Some((keyword, re)),
                Err(e) => {
                    warn!(keyword = %keyword, "Skipping keyword: {}", e);
                    None
                }
            }
        })
        .collect();

    let mut relevant = Vec::new();
    for (index, exchange) in exchanges.iter().enumerate() {
        let blob = match serde_json::to_string(exchange) {
            Ok(json) => json.to_lowercase(),
            Err(e) => {
                warn!(url = %exchange.url, "Cannot serialize exchange for search: {}", e);
                continue;
            }
        };

        let matches: Vec<KeywordMatch> = patterns
            .iter()
            .flat_map(|(keyword, re)| {
                let blob = blob.as_str();
                re.find_iter(blob).map(move |m| KeywordMatch {
                    keyword: (*keyword).clone(),
                    context: context_window(blob, m.start(), m.end(), settings.context_length)
                        .to_string(),
                    position: m.start(),
                })
            })
            .collect();

        if matches.is_empty() {
            continue;
        }

        let excerpt = |text: &str| truncate_chars(text, settings.body_excerpt_chars).to_string();
        relevant.push(RelevantExchange {
            request_index: index,
            url: exchange.url.clone(),
            method: exchange.method.clone(),
            status: exchange.status,
            matches,
            headers: exchange.request_headers.clone(),
            response_headers: exchange.response_headers.clone(),
            request_body: exchange.request_body.as_deref().map(excerpt),
            response_body: exchange.response_body.render().map(|body| excerpt(body.as_ref())),
        });
    }

    debug!(
        relevant = relevant.len(),
        total = exchanges.len(),
        "Keyword search finished"
    );
    relevant
}

/// The prompt-ready subset of the ranked exchanges.
#[derive(Debug, Clone)]
pub struct FocusedSelection {
    pub focused: Vec<RelevantExchange>,
    pub serialized: String,
    /// Estimate for the untruncated serialization.
    pub estimated_tokens: usize,
    pub truncated: bool,
}

/// Take the first `max_count` exchanges and fit their serialization into the token budget.
pub fn select_for_analysis(
    ranked: &[RelevantExchange],
    max_count: usize,
    max_tokens: usize,
    token_char_ratio: usize,
) -> Result<FocusedSelection, serde_json::Error> {
    let focused: Vec<_> = ranked.iter().take(max_count).cloned().collect();
    let serialized = serde_json::to_string_pretty(&focused)?;
    let estimated_tokens = estimate_tokens(&serialized, token_char_ratio);

    let (serialized, truncated) = if estimated_tokens > max_tokens {
        let max_chars = max_tokens.saturating_mul(token_char_ratio.max(1));
        (truncate_with_marker(&serialized, max_chars), true)
    } else {
        (serialized, false)
    };

    Ok(FocusedSelection {
        focused,
        serialized,
        estimated_tokens,
        truncated,
    })
}

/// Rough token count: characters divided by the ratio, rounded up.
pub fn estimate_tokens(text: &str, token_char_ratio: usize) -> usize {
    text.chars().count().div_ceil(token_char_ratio.max(1))
}

/// Cut `text` to at most `max_chars` characters, marker included.
fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars < marker_len {
        return truncate_chars(text, max_chars).to_string();
    }
    let mut cut = truncate_chars(text, max_chars - marker_len).to_string();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn context_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    &text[from..to]
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
