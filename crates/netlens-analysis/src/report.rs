//! Plain-text dump of every captured exchange.

use std::fmt::Write;

use netlens_capture::{CapturedExchange, Headers};

const BLOCK_SEPARATOR: &str =
    "================================================================================";

/// Render exchanges as the human-readable raw report.
pub fn render_raw_report(exchanges: &[CapturedExchange]) -> String {
    if exchanges.is_empty() {
        return "No network requests captured.".to_string();
    }

    exchanges
        .iter()
        .enumerate()
        .map(|(index, exchange)| render_exchange(index + 1, exchange))
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n\n", BLOCK_SEPARATOR))
}

fn render_exchange(number: usize, exchange: &CapturedExchange) -> String {
    let mut out = String::new();
    let status = exchange
        .status
        .map_or_else(|| "N/A".to_string(), |s| s.to_string());

    // Writing into a String cannot fail.
    let _ = writeln!(out, "REQUEST #{}", number);
    let _ = writeln!(out, "================");
    let _ = writeln!(out, "URL: {}", exchange.url);
    let _ = writeln!(out, "Method: {}", exchange.method);
    let _ = writeln!(
        out,
        "Status: {} {}",
        status,
        exchange.status_text.as_deref().unwrap_or_default()
    );
    let _ = writeln!(
        out,
        "MIME Type: {}",
        exchange.mime_type.as_deref().unwrap_or("N/A")
    );

    let _ = writeln!(out, "\nREQUEST HEADERS:");
    write_headers(&mut out, &exchange.request_headers);

    let _ = writeln!(out, "\nREQUEST BODY:");
    let _ = writeln!(
        out,
        "{}",
        exchange.request_body.as_deref().unwrap_or("(No request body)")
    );

    let _ = writeln!(out, "\nRESPONSE HEADERS:");
    write_headers(&mut out, &exchange.response_headers);

    let _ = writeln!(out, "\nRESPONSE BODY:");
    match exchange.response_body.render() {
        Some(body) => {
            let _ = writeln!(out, "{}", body);
        }
        None => {
            let _ = writeln!(out, "(No response body)");
        }
    }
    out
}

fn write_headers(out: &mut String, headers: &Headers) {
    if headers.is_empty() {
        let _ = writeln!(out, "  None");
        return;
    }
    for (name, value) in headers {
        let _ = writeln!(out, "  {}: {}", name, value);
    }
}
