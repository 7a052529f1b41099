//! Network traffic capture for a single browser tab.
//!
//! A [`CaptureService`] opens a tab, attaches instrumentation, navigates to
//! the target URL and records every request/response exchange until the page
//! has been quiet for the completion window, the tab closes, or the capture
//! is stopped. The browser itself sits behind the [`BrowserBackend`] traits.

pub mod body;
pub mod channel;
pub mod config;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod model;
pub mod service;
pub mod session;
pub mod sink;

#[cfg(test)]
mod testing;

pub use channel::{
    BodyPayload, BrowserBackend, BrowserEvent, EventSource, Headers, InstrumentationChannel,
    NetworkEvent, RequestId, RequestInitiated, ResponseMeta, TabController, TabId, merge_headers,
};
pub use config::CaptureConfig;
pub use error::{BodyFetchError, CaptureError, ChannelError};
pub use fallback::{AnyUnavailable, FallbackAffinity, PageUrlFragments};
pub use filter::UrlFilter;
pub use model::{
    CaptureResult, CapturedExchange, PageSnapshot, ResponseBody, StopCause, Unavailable,
};
pub use service::{CaptureService, summarize};
pub use session::{CaptureRequest, SessionState};
