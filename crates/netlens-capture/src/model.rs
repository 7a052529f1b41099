//! Captured exchanges and the result handed back to callers.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::channel::{Headers, RequestId, RequestInitiated, ResponseMeta, merge_headers};

pub const LOADING_MARKER: &str = "(Loading...)";
pub const EMPTY_BODY_MARKER: &str = "(empty body)";
pub const BINARY_MARKER: &str = "[Binary content - base64 encoded]";
pub const DOM_FALLBACK_HEADER: &str = "(DOM Content Fallback)";

/// Rendered page state, used when bodies could not be retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text_content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub captured_at: i64,
}

impl PageSnapshot {
    /// The composite text substituted for a missing body.
    pub fn fallback_text(&self) -> String {
        format!(
            "{DOM_FALLBACK_HEADER}\n\nPage Title: {}\n\nPage Text Content:\n{}\n\n--- Full HTML ---\n{}",
            self.title, self.text_content, self.html
        )
    }
}

/// Why a body could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// The browser had no data for the request.
    NoData,
    /// The body was still missing after the request finished loading.
    Streamed,
    /// Retrieval failed; carries the browser's message.
    Failed(String),
}

/// Lifecycle of a response body.
///
/// Bodies only move forward: `NotRequested -> Loading -> Unavailable -> resolved`.
/// An unavailable body may still be upgraded by a later fetch or by the DOM
/// fallback, but a resolved body is never replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    NotRequested,
    Loading,
    NoContent { status: u16 },
    Text(String),
    Empty,
    Binary,
    Unavailable(Unavailable),
    DomFallback(Arc<PageSnapshot>),
}

impl ResponseBody {
    fn rank(&self) -> u8 {
        match self {
            Self::NotRequested => 0,
            Self::Loading => 1,
            Self::Unavailable(_) => 2,
            _ => 3,
        }
    }

    /// Move to `next` if it is strictly further along. Returns whether the body changed.
    pub fn advance(&mut self, next: ResponseBody) -> bool {
        if next.rank() > self.rank() {
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn is_resolved(&self) -> bool {
        self.rank() == 3
    }

    /// Textual rendering, `None` until a response has been seen.
    pub fn render(&self) -> Option<Cow<'_, str>> {
        let text = match self {
            Self::NotRequested => return None,
            Self::Loading => Cow::Borrowed(LOADING_MARKER),
            Self::NoContent { status } => Cow::Owned(format!("(No content: status {status})")),
            Self::Text(body) => Cow::Borrowed(body.as_str()),
            Self::Empty => Cow::Borrowed(EMPTY_BODY_MARKER),
            Self::Binary => Cow::Borrowed(BINARY_MARKER),
            Self::Unavailable(Unavailable::NoData) => Cow::Borrowed(
                "(Response body not available - likely streamed or service worker handled)",
            ),
            Self::Unavailable(Unavailable::Streamed) => Cow::Borrowed(
                "(Response body not available - likely streamed or handled by service worker)",
            ),
            Self::Unavailable(Unavailable::Failed(detail)) => {
                Cow::Owned(format!("(Could not get response body: {detail})"))
            }
            Self::DomFallback(snapshot) => Cow::Owned(snapshot.fallback_text()),
        };
        Some(text)
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.render() {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_none(),
        }
    }
}

/// One request/response pair observed during a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedExchange {
    pub request_id: RequestId,
    pub url: String,
    pub method: String,
    pub request_headers: Headers,
    pub request_body: Option<String>,
    pub timestamp: f64,
    pub response_received: bool,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub response_headers: Headers,
    pub mime_type: Option<String>,
    pub response_body: ResponseBody,
}

impl CapturedExchange {
    pub fn from_request(req: RequestInitiated) -> Self {
        Self {
            request_id: req.request_id,
            url: req.url,
            method: req.method,
            request_headers: req.headers,
            request_body: req.post_data,
            timestamp: req.timestamp,
            response_received: false,
            status: None,
            status_text: None,
            response_headers: Headers::new(),
            mime_type: None,
            response_body: ResponseBody::NotRequested,
        }
    }

    /// Build a record for a response whose request was never observed.
    pub fn from_orphan_response(meta: &ResponseMeta) -> Self {
        Self {
            request_id: meta.request_id.clone(),
            url: meta.url.clone(),
            method: "GET".to_string(),
            request_headers: Headers::new(),
            request_body: None,
            timestamp: meta.timestamp,
            response_received: false,
            status: None,
            status_text: None,
            response_headers: Headers::new(),
            mime_type: None,
            response_body: ResponseBody::NotRequested,
        }
    }

    /// Refresh request fields from a repeated initiation event.
    pub fn update_request(&mut self, req: RequestInitiated) {
        self.url = req.url;
        self.method = req.method;
        self.request_headers = req.headers;
        self.request_body = req.post_data;
        self.timestamp = req.timestamp;
    }

    /// Record response metadata. Headers already merged from extra-info
    /// events are kept and win over the base response headers.
    pub fn apply_response(&mut self, meta: &ResponseMeta) {
        self.response_received = true;
        self.status = Some(meta.status);
        self.status_text = Some(meta.status_text.clone());
        let extra = std::mem::take(&mut self.response_headers);
        self.response_headers = meta.headers.clone();
        merge_headers(&mut self.response_headers, extra);
        self.mime_type = Some(meta.mime_type.clone());
    }
}

/// Insert-ordered exchange table keyed by request id.
#[derive(Debug, Default)]
pub struct ExchangeTable {
    entries: Vec<CapturedExchange>,
    index: HashMap<RequestId, usize>,
}

impl ExchangeTable {
    pub fn get(&self, id: &RequestId) -> Option<&CapturedExchange> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, id: &RequestId) -> Option<&mut CapturedExchange> {
        self.index.get(id).map(|&i| &mut self.entries[i])
    }

    /// Insert a new exchange. An existing id keeps its slot and is replaced.
    pub fn insert(&mut self, exchange: CapturedExchange) -> &mut CapturedExchange {
        let slot = match self.index.get(&exchange.request_id) {
            Some(&i) => {
                self.entries[i] = exchange;
                i
            }
            None => {
                let i = self.entries.len();
                self.index.insert(exchange.request_id.clone(), i);
                self.entries.push(exchange);
                i
            }
        };
        &mut self.entries[slot]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CapturedExchange> {
        self.entries.iter_mut()
    }

    /// Take every exchange out in capture order.
    pub fn drain(&mut self) -> Vec<CapturedExchange> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

/// Why a capture session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// No further page load within the completion window.
    Completed,
    /// Stopped on request.
    Manual,
    /// The tab was closed outside the session.
    TabClosed,
    /// A newer session replaced this one.
    Superseded,
    /// The hard session limit elapsed.
    SessionLimit,
    /// The browser event stream ended.
    BrowserDisconnected,
    /// Setup failed before capture began.
    StartFailed,
}

/// Everything a finished session observed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub session_id: Uuid,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_cause: StopCause,
    pub exchanges: Vec<CapturedExchange>,
    pub dom_fallback: Option<Arc<PageSnapshot>>,
}

impl CaptureResult {
    /// True when at least one body was replaced by page content.
    pub fn used_dom_fallback(&self) -> bool {
        self.exchanges
            .iter()
            .any(|e| matches!(e.response_body, ResponseBody::DomFallback(_)))
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
