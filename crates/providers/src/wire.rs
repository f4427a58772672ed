//! HTTP plumbing shared by the backends: client construction, status
//! mapping, and a line buffer for server-sent events.

use std::time::Duration;

use parley_core::error::ProviderError;
use parley_core::turn::{Segment, Turn};
use tracing::warn;

/// Timeout for a complete (non-streaming) request.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Build the shared HTTP client.
///
/// No overall timeout is set here: streams stay open as long as the model
/// keeps talking. Complete requests set [`REQUEST_TIMEOUT`] per request.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a transport failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Pass a 2xx response through; map anything else to a `ProviderError`.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let body = response.text().await.unwrap_or_default();
    warn!(provider = %provider, status = code, body = %body, "Provider returned error");
    Err(status_error(code, retry_after, &body))
}

/// The error for a non-2xx status with its `Retry-After` seconds and body.
fn status_error(code: u16, retry_after: Option<u64>, body: &str) -> ProviderError {
    match code {
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => ProviderError::ModelNotFound(error_message(body)),
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        _ => ProviderError::ApiError {
            status_code: code,
            message: error_message(body),
        },
    }
}

/// Pull `error.message` out of a JSON error body, or return the body as is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Text of a turn as sent to a backend: the main content, followed by any
/// text segments and a textual note for each recorded tool call.
pub(crate) fn turn_text(turn: &Turn) -> String {
    let mut text = turn.content.clone();
    for segment in &turn.segments {
        let part = match segment {
            Segment::Text { text } => text.clone(),
            Segment::ToolCall {
                name, arguments, ..
            } => format!("[tool call: {name} {arguments}]"),
            Segment::Image { .. } => continue,
        };
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&part);
    }
    text
}

/// Image segments of a turn as `(media_type, base64 data)` pairs.
pub(crate) fn turn_images(turn: &Turn) -> impl Iterator<Item = (&str, &str)> {
    turn.segments.iter().filter_map(|s| match s {
        Segment::Image { media_type, data } => Some((media_type.as_str(), data.as_str())),
        _ => None,
    })
}

/// Splits a byte stream into SSE `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    /// Feed bytes; returns the data payloads of every completed line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_buffer_waits_for_complete_lines() {
        let mut buf = SseBuffer::default();
        assert!(buf.push(b"data: {\"a\":").is_empty());
        let out = buf.push(b"1}\n\n");
        assert_eq!(out, vec!["{\"a\":1}"]);
    }

    #[test]
    fn sse_buffer_skips_comments_and_events() {
        let mut buf = SseBuffer::default();
        let out = buf.push(b": keep-alive\nevent: ping\ndata: x\r\ndata:y\n");
        assert_eq!(out, vec!["x", "y"]);
    }

    #[test]
    fn sse_buffer_handles_split_utf8() {
        let mut buf = SseBuffer::default();
        let bytes = "data: héllo\n".as_bytes();
        // Split inside the two-byte 'é'
        assert!(buf.push(&bytes[..8]).is_empty());
        assert_eq!(buf.push(&bytes[8..]), vec!["héllo"]);
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"error":{"message":"model overloaded"}}"#),
            "model overloaded"
        );
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn status_codes_map_to_errors() {
        assert!(matches!(
            status_error(401, None, ""),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(403, None, ""),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(429, Some(12), ""),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            status_error(429, None, ""),
            ProviderError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS
            }
        ));
        match status_error(500, None, "Internal Server Error") {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn not_found_names_the_missing_model() {
        let body = r#"{"error":{"message":"The model `gpt-9` does not exist","code":"model_not_found"}}"#;
        match status_error(404, None, body) {
            ProviderError::ModelNotFound(message) => {
                assert_eq!(message, "The model `gpt-9` does not exist");
            }
            other => panic!("expected ModelNotFound, got {other:?}"),
        }
    }

    #[test]
    fn turn_text_includes_segments() {
        let turn = Turn::assistant("Running it.")
            .with_segment(Segment::ToolCall {
                id: "c1".into(),
                name: "shell".into(),
                arguments: r#"{"cmd":"ls"}"#.into(),
            })
            .with_segment(Segment::Image {
                media_type: "image/png".into(),
                data: "AAAA".into(),
            });
        assert_eq!(
            turn_text(&turn),
            "Running it.\n[tool call: shell {\"cmd\":\"ls\"}]"
        );
        assert_eq!(turn_images(&turn).count(), 1);
    }
}
