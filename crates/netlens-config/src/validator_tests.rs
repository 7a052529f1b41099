use super::*;

#[test]
fn test_default_config_is_valid() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_bad_endpoint() {
    let mut config = Config::default();
    config.browser.endpoint = "ws://localhost:9222".to_string();
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "browser.endpoint");
}

#[test]
fn test_zero_attempts() {
    let mut config = Config::default();
    config.capture.body_fetch_attempts = 0;
    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "capture.body_fetch_attempts"));
}

#[test]
fn test_settle_longer_than_completion_warns() {
    let mut config = Config::default();
    config.capture.snapshot_settle_ms = 6000;
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "capture.snapshot_settle_ms"));
}

#[test]
fn test_zero_token_ratio() {
    let mut config = Config::default();
    config.analysis.token_char_ratio = 0;
    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "analysis.token_char_ratio"));
}

#[test]
fn test_temperature_out_of_range() {
    let mut config = Config::default();
    config.provider.temperature = 3.5;
    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "provider.temperature"));
}

#[test]
fn test_empty_api_key_warns() {
    let mut config = Config::default();
    config.provider.api_key = Some(String::new());
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_multiple_errors_collected() {
    let mut config = Config::default();
    config.browser.protocol_version.clear();
    config.provider.model.clear();
    config.analysis.max_keywords = 0;
    let result = ConfigValidator::validate(&config);
    assert_eq!(result.errors.len(), 3);
}
