//! Reasoning-service trait.

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse};
use crate::error::ProviderError;

/// A text-completion backend. Keyword synthesis, URL suggestion and the
/// final analysis all go through this one call.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &str;

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;
}
