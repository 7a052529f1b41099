//! Gemini LLM provider implementation.

use async_trait::async_trait;
use tracing::{debug, info};

use netlens_protocols::error::ProviderError;
use netlens_protocols::provider::{CompletionRequest, CompletionResponse, LLMProvider};
use netlens_protocols::types::{Message, MessageRole, StopReason, Usage};

use crate::client::{GeminiClient, BASE_URL};
use crate::types::*;

/// Gemini LLM provider.
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    /// Create a new Gemini provider talking to the public API.
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Create a provider against a custom API root (proxies, tests).
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: GeminiClient::new(api_key, base_url)?,
        })
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Content> {
        messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|msg| {
                let role = match msg.role {
                    MessageRole::Assistant => "model",
                    MessageRole::User | MessageRole::System => "user",
                };
                Content {
                    role: Some(role.to_string()),
                    parts: vec![Part::text(msg.content.clone())],
                }
            })
            .collect()
    }

    fn convert_system(&self, request: &CompletionRequest) -> Option<Content> {
        let text = request.system.clone().or_else(|| {
            request
                .messages
                .iter()
                .find(|m| m.role == MessageRole::System)
                .map(|m| m.content.clone())
        })?;

        Some(Content {
            role: None,
            parts: vec![Part::text(text)],
        })
    }

    fn convert_response(
        &self,
        response: GenerateContentResponse,
        model: &str,
    ) -> Result<CompletionResponse, ProviderError> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".to_string()))?;

        let text = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default();

        let stop_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("STOP_SEQUENCE") => StopReason::StopSequence,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => StopReason::ContentFiltered,
            _ => StopReason::EndTurn,
        };

        let usage = response
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: format!("gemini-{}", uuid::Uuid::new_v4()),
            model: model.to_string(),
            message: Message::assistant(text),
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        debug!("Gemini complete: model={}", request.model);

        let gemini_request = GenerateContentRequest {
            contents: self.convert_messages(&request.messages),
            system_instruction: self.convert_system(&request),
            generation_config: Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                stop_sequences: request.stop.clone(),
            }),
        };

        let response = self.client.generate_content(&request.model, gemini_request).await?;
        let completion = self.convert_response(response, &request.model)?;

        info!(
            model = %completion.model,
            prompt = completion.usage.prompt_tokens,
            response = completion.usage.completion_tokens,
            total = completion.usage.total_tokens,
            "Gemini token usage"
        );

        Ok(completion)
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
