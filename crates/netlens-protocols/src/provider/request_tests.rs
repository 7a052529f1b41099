use super::*;
use crate::types::MessageRole;

#[test]
fn test_completion_request_new() {
    let request = CompletionRequest::new("gemini-2.5-flash", vec![Message::user("Hello")]);
    assert_eq!(request.model, "gemini-2.5-flash");
    assert_eq!(request.messages.len(), 1);
    assert!(request.system.is_none());
    assert!(request.stop.is_empty());
}

#[test]
fn test_completion_request_prompt() {
    let request = CompletionRequest::prompt("gemini-2.5-flash", "find my token");
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, MessageRole::User);
    assert_eq!(request.messages[0].content, "find my token");
}

#[test]
fn test_completion_request_builder_chain() {
    let request = CompletionRequest::prompt("gemini-2.5-flash", "hi")
        .with_system("Be precise")
        .with_max_tokens(1000)
        .with_temperature(0.3);
    assert_eq!(request.system.as_deref(), Some("Be precise"));
    assert_eq!(request.max_tokens, Some(1000));
    assert!((request.temperature.unwrap() - 0.3).abs() < 0.001);
}

#[test]
fn test_completion_request_skips_empty_optionals() {
    let request = CompletionRequest::prompt("m", "p");
    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("system").is_none());
    assert!(json.get("max_tokens").is_none());
    assert!(json.get("temperature").is_none());
}
