//! Conversions from file configuration to runtime settings.

use std::sync::Arc;
use std::time::Duration;

use netlens_analysis::{AnalyzerSettings, FilterSettings, KeywordSettings};
use netlens_capture::{AnyUnavailable, CaptureConfig, FallbackAffinity, PageUrlFragments};
use netlens_config::{Config, ProviderSettings};

pub(crate) fn capture_config(config: &Config) -> CaptureConfig {
    let capture = &config.capture;
    CaptureConfig {
        protocol_version: config.browser.protocol_version.clone(),
        completion_delay: Duration::from_millis(capture.completion_delay_ms),
        snapshot_settle: Duration::from_millis(capture.snapshot_settle_ms),
        body_retry_delay: Duration::from_millis(capture.body_retry_delay_ms),
        body_fetch_attempts: capture.body_fetch_attempts,
        max_decoded_chars: capture.max_decoded_chars,
        session_limit: Duration::from_secs(capture.session_limit_secs),
    }
}

/// Which exchanges receive the page snapshot when their body is missing.
pub(crate) fn fallback_affinity(config: &Config) -> Arc<dyn FallbackAffinity> {
    let fragments = &config.capture.fallback_url_fragments;
    if fragments.is_empty() {
        Arc::new(AnyUnavailable)
    } else {
        Arc::new(PageUrlFragments::new(fragments.clone()))
    }
}

pub(crate) fn analyzer_settings(config: &Config) -> AnalyzerSettings {
    let provider = &config.provider;
    let analysis = &config.analysis;
    AnalyzerSettings {
        model: provider.model.clone(),
        temperature: provider.temperature,
        max_output_tokens: provider.max_output_tokens,
        keywords: KeywordSettings {
            model: provider.model.clone(),
            temperature: provider.temperature,
            max_output_tokens: provider.keyword_max_output_tokens,
            max_keywords: analysis.max_keywords,
        },
        filter: FilterSettings {
            context_length: analysis.context_length,
            body_excerpt_chars: analysis.body_excerpt_chars,
            max_relevant_requests: analysis.max_relevant_requests,
            max_tokens: analysis.max_tokens,
            token_char_ratio: analysis.token_char_ratio,
        },
    }
}

/// Flag or environment first, then the config file. Blank keys count as missing.
pub(crate) fn resolve_api_key(flag: Option<String>, provider: &ProviderSettings) -> Option<String> {
    flag.into_iter()
        .chain(provider.api_key.clone())
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}
