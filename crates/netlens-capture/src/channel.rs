//! Browser capability traits and the events they emit.
//!
//! The capture session never talks to a browser directly. It drives three
//! narrow capabilities (instrumentation, tab control and an event stream)
//! which an adapter such as the CDP backend implements.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{BodyFetchError, ChannelError};
use crate::model::PageSnapshot;

/// Header map. Keys keep the casing the browser reported.
pub type Headers = BTreeMap<String, String>;

/// Merge `incoming` into `headers`. Names compare case-insensitively and the
/// incoming value replaces any existing spelling of the same name.
pub fn merge_headers(headers: &mut Headers, incoming: Headers) {
    for (name, value) in incoming {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        headers.insert(name, value);
    }
}

/// Opaque identifier for a browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Browser-assigned identifier of one network request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A request leaving the page.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInitiated {
    pub request_id: RequestId,
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub post_data: Option<String>,
    pub timestamp: f64,
}

/// Response metadata, before the body is available.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMeta {
    pub request_id: RequestId,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub mime_type: String,
    pub timestamp: f64,
}

/// Network lifecycle events for one tab.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Initiated(RequestInitiated),
    ExtraRequestInfo { request_id: RequestId, headers: Headers },
    ResponseReceived(ResponseMeta),
    ExtraResponseInfo { request_id: RequestId, headers: Headers },
    LoadingFinished { request_id: RequestId },
}

impl NetworkEvent {
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Initiated(req) => &req.request_id,
            Self::ResponseReceived(resp) => &resp.request_id,
            Self::ExtraRequestInfo { request_id, .. }
            | Self::ExtraResponseInfo { request_id, .. }
            | Self::LoadingFinished { request_id } => request_id,
        }
    }
}

/// Everything the browser pushes at a capture session.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    Network { tab: TabId, event: NetworkEvent },
    PageLoaded { tab: TabId },
    TabClosed { tab: TabId },
}

impl BrowserEvent {
    pub fn tab(&self) -> &TabId {
        match self {
            Self::Network { tab, .. } | Self::PageLoaded { tab } | Self::TabClosed { tab } => tab,
        }
    }
}

/// Raw body as the browser hands it over.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPayload {
    pub body: String,
    pub base64_encoded: bool,
}

/// Attach-to-tab instrumentation.
#[async_trait]
pub trait InstrumentationChannel: Send + Sync {
    /// Attach to a tab at the given protocol version.
    async fn attach(&self, tab: &TabId, protocol_version: &str) -> Result<(), ChannelError>;

    /// Start reporting network events for the tab.
    async fn enable_network(&self, tab: &TabId) -> Result<(), ChannelError>;

    /// Fetch the retained body of a request.
    async fn get_response_body(
        &self,
        tab: &TabId,
        request_id: &RequestId,
    ) -> Result<BodyPayload, BodyFetchError>;

    async fn detach(&self, tab: &TabId) -> Result<(), ChannelError>;
}

/// Tab lifecycle and page inspection.
#[async_trait]
pub trait TabController: Send + Sync {
    /// Open a tab, optionally already pointed at a URL.
    async fn create_tab(&self, url: Option<&str>) -> Result<TabId, ChannelError>;

    async fn navigate(&self, tab: &TabId, url: &str) -> Result<(), ChannelError>;

    async fn remove_tab(&self, tab: &TabId) -> Result<(), ChannelError>;

    /// Capture URL, title, markup and visible text of the rendered page.
    async fn snapshot_page(&self, tab: &TabId) -> Result<PageSnapshot, ChannelError>;
}

/// Source of browser events.
pub trait EventSource: Send + Sync {
    /// Register a new listener. Every listener sees every event after registration.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent>;
}

/// A browser that offers all three capabilities.
pub trait BrowserBackend: InstrumentationChannel + TabController + EventSource {}

impl<T> BrowserBackend for T where T: InstrumentationChannel + TabController + EventSource {}
