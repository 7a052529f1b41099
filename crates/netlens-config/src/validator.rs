//! Configuration validation.

use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_browser(config, &mut result);
        Self::validate_capture(config, &mut result);
        Self::validate_analysis(config, &mut result);
        Self::validate_provider(config, &mut result);
        result
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let endpoint = &config.browser.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            result.add_error(ValidationError::new(
                "browser.endpoint",
                "Endpoint must be an http(s) URL",
            ));
        }

        if config.browser.protocol_version.is_empty() {
            result.add_error(ValidationError::new(
                "browser.protocol_version",
                "Protocol version cannot be empty",
            ));
        }

        if config.browser.command_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "browser.command_timeout_secs",
                "Command timeout must be greater than 0",
            ));
        }
    }

    fn validate_capture(config: &Config, result: &mut ValidationResult) {
        let capture = &config.capture;

        if capture.body_fetch_attempts == 0 {
            result.add_error(ValidationError::new(
                "capture.body_fetch_attempts",
                "At least one body fetch attempt is required",
            ));
        }

        if capture.completion_delay_ms == 0 {
            result.add_error(ValidationError::new(
                "capture.completion_delay_ms",
                "Completion delay must be greater than 0",
            ));
        }

        if capture.snapshot_settle_ms >= capture.completion_delay_ms {
            result.add_warning(ValidationWarning::new(
                "capture.snapshot_settle_ms",
                "Snapshot settle delay is not shorter than the completion delay; the page snapshot may never be taken",
            ));
        }

        if capture.session_limit_secs * 1000 <= capture.completion_delay_ms {
            result.add_warning(ValidationWarning::new(
                "capture.session_limit_secs",
                "Session limit is shorter than the completion delay",
            ));
        }

        if capture.fallback_url_fragments.iter().any(|f| f.trim().is_empty()) {
            result.add_warning(ValidationWarning::new(
                "capture.fallback_url_fragments",
                "Empty fragment matches every page",
            ));
        }
    }

    fn validate_analysis(config: &Config, result: &mut ValidationResult) {
        let analysis = &config.analysis;

        if analysis.token_char_ratio == 0 {
            result.add_error(ValidationError::new(
                "analysis.token_char_ratio",
                "Token/char ratio must be greater than 0",
            ));
        }

        if analysis.max_relevant_requests == 0 {
            result.add_error(ValidationError::new(
                "analysis.max_relevant_requests",
                "At least one request must be selectable",
            ));
        }

        if analysis.max_keywords == 0 {
            result.add_error(ValidationError::new(
                "analysis.max_keywords",
                "max_keywords must be greater than 0",
            ));
        }

        if analysis.max_tokens > 1_000_000 {
            result.add_warning(ValidationWarning::new(
                "analysis.max_tokens",
                "Token budget exceeds 1M tokens, most models will reject the prompt",
            ));
        }
    }

    fn validate_provider(config: &Config, result: &mut ValidationResult) {
        let provider = &config.provider;

        if provider.model.is_empty() {
            result.add_error(ValidationError::new("provider.model", "Model cannot be empty"));
        }

        if !(0.0..=2.0).contains(&provider.temperature) {
            result.add_error(ValidationError::new(
                "provider.temperature",
                "Temperature must be between 0.0 and 2.0",
            ));
        }

        if provider.api_key.as_deref().is_some_and(str::is_empty) {
            result.add_warning(ValidationWarning::new(
                "provider.api_key",
                "API key is empty; set it here, with --api-key or GEMINI_API_KEY",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
