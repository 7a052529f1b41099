//! Capture capabilities backed by a CDP connection.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use netlens_capture::{
    BodyFetchError, BodyPayload, BrowserEvent, ChannelError, EventSource, InstrumentationChannel,
    PageSnapshot, RequestId, TabController, TabId,
};

use crate::client::CdpClient;
use crate::error::CdpError;
use crate::protocol::ResponseBodyResult;

/// Collects what the page shows once it has rendered.
const SNAPSHOT_SCRIPT: &str = r#"(() => ({
    url: window.location.href,
    title: document.title || '',
    html: document.documentElement ? document.documentElement.outerHTML : '',
    textContent: document.body ? (document.body.innerText || document.body.textContent || '') : '',
    capturedAt: Date.now()
}))()"#;

/// A Chrome instance reached through its remote debugging endpoint.
pub struct CdpBrowser {
    client: CdpClient,
}

impl CdpBrowser {
    /// Connect and start watching for targets so closed tabs are reported.
    pub async fn connect(endpoint: &str, command_timeout: Duration) -> Result<Self, CdpError> {
        let client = CdpClient::connect(endpoint, command_timeout).await?;
        client
            .call("Target.setDiscoverTargets", Some(json!({"discover": true})), None)
            .await?;
        info!(
            browser = %client.version().browser,
            endpoint,
            "Browser connected"
        );
        Ok(Self { client })
    }

    fn session(&self, tab: &TabId) -> Result<String, ChannelError> {
        self.client
            .router()
            .session_for(tab)
            .ok_or_else(|| ChannelError::TabNotFound(tab.clone()))
    }

    async fn page_call(
        &self,
        operation: &'static str,
        tab: &TabId,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ChannelError> {
        let session = self.session(tab)?;
        self.client
            .call(method, params, Some(&session))
            .await
            .map_err(|e| channel_error(operation, e))
    }
}

fn channel_error(operation: &'static str, e: CdpError) -> ChannelError {
    match e {
        CdpError::ChromeNotAvailable(m) | CdpError::ConnectionFailed(m) | CdpError::WebSocket(m) => {
            ChannelError::Unreachable(m)
        }
        CdpError::SessionClosed => ChannelError::Unreachable("connection closed".to_string()),
        other => ChannelError::command(operation, other.to_string()),
    }
}

fn body_error(e: CdpError) -> BodyFetchError {
    if e.is_no_data() {
        return BodyFetchError::NoData(e.to_string());
    }
    match e {
        // Keep the browser's own error object so the message can be recovered.
        CdpError::Protocol { code, message } => {
            BodyFetchError::Failed(json!({"code": code, "message": message}).to_string())
        }
        other => BodyFetchError::Failed(other.to_string()),
    }
}

/// Whether a browser speaking `actual` accepts clients asking for `wanted`.
///
/// Versions are `major.minor`; newer minors stay compatible.
pub fn version_supported(wanted: &str, actual: &str) -> bool {
    fn split(version: &str) -> Option<(u32, u32)> {
        let (major, minor) = version.trim().split_once('.')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }
    match (split(wanted), split(actual)) {
        (Some((w_major, w_minor)), Some((a_major, a_minor))) => {
            w_major == a_major && w_minor <= a_minor
        }
        _ => wanted.trim() == actual.trim(),
    }
}

/// Read the object returned by the snapshot script.
pub fn parse_snapshot(result: &Value) -> Result<PageSnapshot, ChannelError> {
    if let Some(exception) = result.get("exceptionDetails") {
        let text = exception["text"].as_str().unwrap_or("Unknown error");
        return Err(ChannelError::command("snapshot", text));
    }
    PageSnapshot::deserialize(&result["result"]["value"])
        .map_err(|e| ChannelError::command("snapshot", e.to_string()))
}

#[async_trait]
impl InstrumentationChannel for CdpBrowser {
    async fn attach(&self, tab: &TabId, protocol_version: &str) -> Result<(), ChannelError> {
        let actual = &self.client.version().protocol_version;
        if !version_supported(protocol_version, actual) {
            return Err(ChannelError::VersionMismatch {
                wanted: protocol_version.to_string(),
                actual: actual.clone(),
            });
        }

        let result = self
            .client
            .call(
                "Target.attachToTarget",
                Some(json!({"targetId": tab.0, "flatten": true})),
                None,
            )
            .await
            .map_err(|e| channel_error("attach", e))?;
        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| ChannelError::command("attach", "missing sessionId"))?
            .to_string();
        self.client.router().bind_session(session_id, tab.clone());

        if let Err(e) = self.page_call("attach", tab, "Page.enable", None).await {
            let _ = self.detach(tab).await;
            return Err(e);
        }
        debug!(tab = %tab, "Attached");
        Ok(())
    }

    async fn enable_network(&self, tab: &TabId) -> Result<(), ChannelError> {
        self.page_call("Network.enable", tab, "Network.enable", None)
            .await
            .map(|_| ())
    }

    async fn get_response_body(
        &self,
        tab: &TabId,
        request_id: &RequestId,
    ) -> Result<BodyPayload, BodyFetchError> {
        let session = self
            .session(tab)
            .map_err(|e| BodyFetchError::Failed(e.to_string()))?;
        let result = self
            .client
            .call(
                "Network.getResponseBody",
                Some(json!({"requestId": request_id.0})),
                Some(&session),
            )
            .await
            .map_err(body_error)?;

        let body: ResponseBodyResult =
            serde_json::from_value(result).map_err(|e| BodyFetchError::Failed(e.to_string()))?;
        Ok(BodyPayload {
            body: body.body,
            base64_encoded: body.base64_encoded,
        })
    }

    async fn detach(&self, tab: &TabId) -> Result<(), ChannelError> {
        let Some(session_id) = self.client.router().unbind_tab(tab) else {
            return Err(ChannelError::TabNotFound(tab.clone()));
        };
        self.client
            .call(
                "Target.detachFromTarget",
                Some(json!({"sessionId": session_id})),
                None,
            )
            .await
            .map_err(|e| channel_error("detach", e))?;
        Ok(())
    }
}

#[async_trait]
impl TabController for CdpBrowser {
    async fn create_tab(&self, url: Option<&str>) -> Result<TabId, ChannelError> {
        let page = self
            .client
            .new_page(url)
            .await
            .map_err(|e| channel_error("create tab", e))?;
        Ok(TabId(page.id))
    }

    async fn navigate(&self, tab: &TabId, url: &str) -> Result<(), ChannelError> {
        let result = self
            .page_call("navigate", tab, "Page.navigate", Some(json!({"url": url})))
            .await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(ChannelError::command("navigate", error));
        }
        Ok(())
    }

    async fn remove_tab(&self, tab: &TabId) -> Result<(), ChannelError> {
        self.client
            .call("Target.closeTarget", Some(json!({"targetId": tab.0})), None)
            .await
            .map_err(|e| channel_error("close tab", e))?;
        Ok(())
    }

    async fn snapshot_page(&self, tab: &TabId) -> Result<PageSnapshot, ChannelError> {
        let result = self
            .page_call(
                "snapshot",
                tab,
                "Runtime.evaluate",
                Some(json!({
                    "expression": SNAPSHOT_SCRIPT,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;
        let snapshot = parse_snapshot(&result);
        if let Err(e) = &snapshot {
            warn!(tab = %tab, "Page snapshot failed: {}", e);
        }
        snapshot
    }
}

impl EventSource for CdpBrowser {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent> {
        self.client.router().subscribe()
    }
}

#[cfg(test)]
#[path = "browser_tests.rs"]
mod tests;
