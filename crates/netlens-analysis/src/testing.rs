//! Scripted reasoning provider for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use netlens_capture::{
    CaptureResult, CapturedExchange, Headers, RequestId, RequestInitiated, ResponseBody, StopCause,
};
use netlens_protocols::error::ProviderError;
use netlens_protocols::provider::{CompletionRequest, CompletionResponse, LLMProvider};
use netlens_protocols::types::{Message, StopReason, Usage};

/// Answers requests from a queue and records every prompt it saw.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    answers: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(answers: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().clone()
    }

    pub(crate) fn prompt_text(&self, index: usize) -> String {
        self.prompts.lock()[index].messages[0].content.clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.clone();
        self.prompts.lock().push(request);
        let text = self
            .answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".to_string())))?;
        Ok(CompletionResponse {
            id: "scripted-1".to_string(),
            model,
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}

pub(crate) fn exchange(index: usize, url: &str, body: ResponseBody) -> CapturedExchange {
    let mut exchange = CapturedExchange::from_request(RequestInitiated {
        request_id: RequestId(index.to_string()),
        url: url.to_string(),
        method: "GET".to_string(),
        headers: Headers::from([("Accept".to_string(), "application/json".to_string())]),
        post_data: None,
        timestamp: index as f64,
    });
    exchange.response_received = true;
    exchange.status = Some(200);
    exchange.status_text = Some("OK".to_string());
    exchange.mime_type = Some("application/json".to_string());
    exchange.response_body = body;
    exchange
}

pub(crate) fn capture(exchanges: Vec<CapturedExchange>) -> CaptureResult {
    let now = chrono::Utc::now();
    CaptureResult {
        session_id: uuid::Uuid::new_v4(),
        target_url: "https://www.example.com/account".to_string(),
        started_at: now,
        finished_at: now,
        stop_cause: StopCause::Completed,
        exchanges,
        dom_fallback: None,
    }
}
