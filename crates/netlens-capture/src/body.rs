//! Response body retrieval and decoding.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, trace};

use crate::channel::{BodyPayload, InstrumentationChannel, RequestId, TabId};
use crate::error::BodyFetchError;
use crate::model::{ResponseBody, Unavailable};

/// How many characters of decoded content are checked for printability.
const PRINTABLE_SAMPLE: usize = 1000;

/// Bounded retry schedule for body fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Fetch a body, retrying transient failures.
///
/// A `NoData` answer ends the loop at once. The returned count is the number
/// of fetch calls issued.
pub async fn fetch_with_retry<C>(
    channel: &C,
    tab: &TabId,
    request_id: &RequestId,
    policy: RetryPolicy,
    max_decoded_chars: usize,
) -> (ResponseBody, u32)
where
    C: InstrumentationChannel + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match channel.get_response_body(tab, request_id).await {
            Ok(payload) => return (decode_payload(payload, max_decoded_chars), attempt),
            Err(BodyFetchError::NoData(message)) => {
                debug!(request_id = %request_id, "No body retained: {}", message);
                return (ResponseBody::Unavailable(Unavailable::NoData), attempt);
            }
            Err(BodyFetchError::Failed(message)) if attempt < attempts => {
                trace!(request_id = %request_id, attempt, "Body fetch failed, retrying: {}", message);
                tokio::time::sleep(policy.delay).await;
            }
            Err(BodyFetchError::Failed(message)) => {
                debug!(request_id = %request_id, attempt, "Body fetch gave up: {}", message);
                let detail = parse_error_detail(&message);
                return (ResponseBody::Unavailable(Unavailable::Failed(detail)), attempt);
            }
        }
    }
}

/// Single fetch issued once a request has finished loading.
pub async fn fetch_final<C>(
    channel: &C,
    tab: &TabId,
    request_id: &RequestId,
    max_decoded_chars: usize,
) -> ResponseBody
where
    C: InstrumentationChannel + ?Sized,
{
    match channel.get_response_body(tab, request_id).await {
        Ok(payload) => decode_payload(payload, max_decoded_chars),
        Err(e) => {
            debug!(request_id = %request_id, "Body still unavailable after load: {}", e);
            ResponseBody::Unavailable(Unavailable::Streamed)
        }
    }
}

/// Turn a raw payload into a body state.
///
/// Base64 payloads are kept as text only when they decode to valid UTF-8
/// below the size ceiling and the leading sample is printable.
pub fn decode_payload(payload: BodyPayload, max_decoded_chars: usize) -> ResponseBody {
    if !payload.base64_encoded {
        return if payload.body.is_empty() {
            ResponseBody::Empty
        } else {
            ResponseBody::Text(payload.body)
        };
    }

    let Ok(bytes) = BASE64.decode(payload.body.as_bytes()) else {
        return ResponseBody::Binary;
    };
    let Ok(decoded) = String::from_utf8(bytes) else {
        return ResponseBody::Binary;
    };

    if decoded.is_empty() {
        return ResponseBody::Empty;
    }
    if decoded.chars().count() >= max_decoded_chars || !is_printable(&decoded) {
        return ResponseBody::Binary;
    }
    ResponseBody::Text(decoded)
}

fn is_printable(text: &str) -> bool {
    text.chars().take(PRINTABLE_SAMPLE).all(|c| {
        matches!(c, '\t' | '\n' | '\r' | ' '..='~') || c >= '\u{00A0}'
    })
}

/// Pull the `message` field out of an error string with embedded JSON.
pub fn parse_error_detail(raw: &str) -> String {
    let embedded = raw
        .find('{')
        .zip(raw.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<serde_json::Value>(&raw[start..=end]).ok());

    embedded
        .as_ref()
        .and_then(|value| value.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
#[path = "body_tests.rs"]
mod tests;
