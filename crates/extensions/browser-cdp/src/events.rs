//! Translation of raw CDP events into the capture session's typed events.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use netlens_capture::{Headers, NetworkEvent, RequestId, RequestInitiated, ResponseMeta};

use crate::protocol::{
    ExtraInfo, LoadingFinished, RawHeaders, RequestWillBeSent, ResponseReceived,
};

/// What a page-session event means for capture.
#[derive(Debug, Clone, PartialEq)]
pub enum TabSignal {
    Network(NetworkEvent),
    Loaded,
}

/// Map a session-scoped CDP event to a capture signal.
///
/// Events capture does not care about, and malformed payloads, yield `None`.
pub fn translate(method: &str, params: &Value) -> Option<TabSignal> {
    let event = match method {
        "Page.loadEventFired" => return Some(TabSignal::Loaded),
        "Network.requestWillBeSent" => {
            let sent: RequestWillBeSent = parse(method, params)?;
            NetworkEvent::Initiated(RequestInitiated {
                request_id: RequestId(sent.request_id),
                url: sent.request.url,
                method: sent.request.method,
                headers: flatten_headers(sent.request.headers),
                post_data: sent.request.post_data,
                timestamp: sent.timestamp,
            })
        }
        "Network.requestWillBeSentExtraInfo" => {
            let extra: ExtraInfo = parse(method, params)?;
            NetworkEvent::ExtraRequestInfo {
                request_id: RequestId(extra.request_id),
                headers: flatten_headers(extra.headers),
            }
        }
        "Network.responseReceived" => {
            let received: ResponseReceived = parse(method, params)?;
            let response = received.response;
            NetworkEvent::ResponseReceived(ResponseMeta {
                request_id: RequestId(received.request_id),
                url: response.url,
                status: status_code(response.status),
                status_text: response.status_text,
                headers: flatten_headers(response.headers),
                mime_type: response.mime_type,
                timestamp: received.timestamp,
            })
        }
        "Network.responseReceivedExtraInfo" => {
            let extra: ExtraInfo = parse(method, params)?;
            NetworkEvent::ExtraResponseInfo {
                request_id: RequestId(extra.request_id),
                headers: flatten_headers(extra.headers),
            }
        }
        "Network.loadingFinished" => {
            let finished: LoadingFinished = parse(method, params)?;
            NetworkEvent::LoadingFinished {
                request_id: RequestId(finished.request_id),
            }
        }
        _ => return None,
    };
    Some(TabSignal::Network(event))
}

fn parse<T: DeserializeOwned>(method: &str, params: &Value) -> Option<T> {
    match T::deserialize(params) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(method, "Dropping malformed event: {}", e);
            None
        }
    }
}

fn flatten_headers(raw: RawHeaders) -> Headers {
    raw.into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect()
}

// CDP reports status as a JSON number that may carry a fraction.
fn status_code(status: f64) -> u16 {
    if status.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&status) {
        status as u16
    } else {
        0
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
