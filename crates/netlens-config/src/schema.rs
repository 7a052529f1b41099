//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub analysis: AnalysisSettings,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Browser connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Remote debugging HTTP endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            protocol_version: default_protocol_version(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:9222".to_string()
}

fn default_protocol_version() -> String {
    "1.2".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

/// Capture session timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_completion_delay")]
    pub completion_delay_ms: u64,

    #[serde(default = "default_snapshot_settle")]
    pub snapshot_settle_ms: u64,

    #[serde(default = "default_body_retry_delay")]
    pub body_retry_delay_ms: u64,

    #[serde(default = "default_body_fetch_attempts")]
    pub body_fetch_attempts: u32,

    #[serde(default = "default_max_decoded_chars")]
    pub max_decoded_chars: usize,

    #[serde(default = "default_session_limit")]
    pub session_limit_secs: u64,

    /// Page URL fragments that enable the DOM fallback. Empty applies it everywhere.
    #[serde(default)]
    pub fallback_url_fragments: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            completion_delay_ms: default_completion_delay(),
            snapshot_settle_ms: default_snapshot_settle(),
            body_retry_delay_ms: default_body_retry_delay(),
            body_fetch_attempts: default_body_fetch_attempts(),
            max_decoded_chars: default_max_decoded_chars(),
            session_limit_secs: default_session_limit(),
            fallback_url_fragments: Vec::new(),
        }
    }
}

fn default_completion_delay() -> u64 {
    5000
}

fn default_snapshot_settle() -> u64 {
    2000
}

fn default_body_retry_delay() -> u64 {
    100
}

fn default_body_fetch_attempts() -> u32 {
    3
}

fn default_max_decoded_chars() -> usize {
    1_000_000
}

fn default_session_limit() -> u64 {
    120
}

/// Relevance filtering and prompt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Characters of context kept on each side of a keyword hit.
    #[serde(default = "default_context_length")]
    pub context_length: usize,

    #[serde(default = "default_max_relevant_requests")]
    pub max_relevant_requests: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_token_char_ratio")]
    pub token_char_ratio: usize,

    #[serde(default = "default_body_excerpt_chars")]
    pub body_excerpt_chars: usize,

    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            max_relevant_requests: default_max_relevant_requests(),
            max_tokens: default_max_tokens(),
            token_char_ratio: default_token_char_ratio(),
            body_excerpt_chars: default_body_excerpt_chars(),
            max_keywords: default_max_keywords(),
        }
    }
}

fn default_context_length() -> usize {
    200
}

fn default_max_relevant_requests() -> usize {
    10
}

fn default_max_tokens() -> usize {
    500_000
}

fn default_token_char_ratio() -> usize {
    4
}

fn default_body_excerpt_chars() -> usize {
    1000
}

fn default_max_keywords() -> usize {
    20
}

/// Reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_keyword_max_output_tokens")]
    pub keyword_max_output_tokens: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            keyword_max_output_tokens: default_keyword_max_output_tokens(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    50_000
}

fn default_keyword_max_output_tokens() -> u32 {
    1000
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_dir() -> String {
    "~/.netlens/logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    30
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
