//! Chrome DevTools Protocol backend for NetLens capture.
//!
//! Start Chrome with remote debugging enabled:
//!
//! ```bash
//! chrome --remote-debugging-port=9222
//! ```
//!
//! then hand a connected [`CdpBrowser`] to the capture service:
//!
//! ```rust,ignore
//! let browser = CdpBrowser::connect("http://localhost:9222", Duration::from_secs(30)).await?;
//! let service = CaptureService::new(Arc::new(browser), CaptureConfig::default());
//! ```

mod browser;
mod client;
mod error;
mod events;
mod protocol;
mod router;

pub use browser::{CdpBrowser, parse_snapshot, version_supported};
pub use client::CdpClient;
pub use error::CdpError;
pub use events::{TabSignal, translate};
pub use protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo};
