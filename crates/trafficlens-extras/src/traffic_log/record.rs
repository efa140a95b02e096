//! Log record model and its construction helpers.

use crate::sanitization::{is_likely_text, Sanitizer, TRUNCATION_MARKER};
use serde::Serialize;
use std::collections::BTreeMap;
use trafficlens_core::Capture;

/// Failure while building or formatting a log record.
///
/// Never reaches the client: the layer logs it and returns the response
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The query string or form body could not be decoded.
    #[error("invalid urlencoded data: {0}")]
    Urlencoded(#[from] serde_urlencoded::de::Error),

    /// The record could not be turned into JSON.
    #[error("failed to format record: {0}")]
    Format(#[from] serde_json::Error),
}

/// A query or form parameter value.
///
/// A key seen once stays a scalar; a repeated key becomes a list in
/// encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Single occurrence.
    Single(String),
    /// Repeated key.
    Multi(Vec<String>),
}

impl ParamValue {
    fn push(&mut self, value: String) {
        match self {
            ParamValue::Single(first) => {
                let first = std::mem::take(first);
                *self = ParamValue::Multi(vec![first, value]);
            }
            ParamValue::Multi(values) => values.push(value),
        }
    }
}

/// Parameter map as it appears in a record.
pub type Params = BTreeMap<String, ParamValue>;

/// Decode `application/x-www-form-urlencoded` data, keeping repeated keys.
pub fn parse_params(encoded: &str) -> Result<Params, RecordError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded)?;
    let mut params = Params::new();
    for (key, value) in pairs {
        match params.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                params.insert(key, ParamValue::Single(value));
            }
        }
    }
    Ok(params)
}

/// Client identity as seen by the logger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInfo {
    /// Resolved client IP, or `"unknown"`.
    pub ip: String,
    /// Transport peer port, when known.
    pub port: Option<u16>,
}

/// Request half of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestLog {
    /// Sanitized request headers.
    pub request_headers: BTreeMap<String, String>,
    /// Query parameters.
    pub params: Params,
    /// Fields of a urlencoded form body, when the body is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Params>,
    /// Sanitized body text, a `bytes[n]` marker, or null when not captured.
    #[serde(rename = "request-body")]
    pub body: Option<String>,
    /// Client identity.
    pub from: ClientInfo,
}

/// Response half of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseLog {
    /// Sanitized response headers.
    pub response_headers: BTreeMap<String, String>,
    /// Sanitized body text, a `bytes[n]` marker, or null.
    pub body: Option<String>,
    /// HTTP status code.
    pub response_code: u16,
    /// Time spent in the rest of the chain, rounded to 2 decimals.
    pub elapsed_ms: f64,
}

/// One request/response pair, ready for a formatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// RFC 3339 UTC timestamp with a `Z` suffix.
    pub t: String,
    /// HTTP method.
    pub method: String,
    /// Absolute request URL.
    pub url: String,
    /// Request details.
    pub request: RequestLog,
    /// Response details.
    pub response: ResponseLog,
}

/// Placeholder for a body that is not shown as text.
pub fn bytes_marker(len: usize) -> String {
    format!("bytes[{}]", len)
}

fn read_error(capture: &Capture) -> Option<String> {
    capture
        .error()
        .map(|err| format!("error_reading_body: {}", err))
}

/// Sanitize captured text, marking it as truncated when the capture stopped
/// at its byte limit and the length cap did not already cut it.
fn sanitize_captured(
    capture: &Capture,
    text: &str,
    sanitizer: &Sanitizer,
    max_len: usize,
) -> String {
    let mut out = sanitizer.sanitize(text, max_len);
    if capture.is_partial() && !out.ends_with(TRUNCATION_MARKER) {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

/// Render a captured request body.
///
/// UTF-8 text that passes the likely-text check is sanitized; anything else
/// is reported by length.
pub fn render_request_body(capture: &Capture, sanitizer: &Sanitizer, max_len: usize) -> String {
    if let Some(marker) = read_error(capture) {
        return marker;
    }

    match capture.as_utf8() {
        Some(text) if is_likely_text(text) => {
            sanitize_captured(capture, text, sanitizer, max_len)
        }
        _ => bytes_marker(capture.len()),
    }
}

/// Whether a response body with this content type is decoded as text.
pub fn is_textual_content_type(content_type: Option<&str>) -> bool {
    content_type.map_or(false, |ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("application/json") || ct.contains("text/")
    })
}

/// Render a captured response body.
///
/// An empty body renders as `None`. Only JSON and `text/*` bodies are
/// decoded; everything else is reported by length.
pub fn render_response_body(
    capture: &Capture,
    content_type: Option<&str>,
    sanitizer: &Sanitizer,
    max_len: usize,
) -> Option<String> {
    if let Some(marker) = read_error(capture) {
        return Some(marker);
    }
    if capture.is_empty() {
        return None;
    }

    if is_textual_content_type(content_type) {
        if let Some(text) = capture.as_utf8() {
            return Some(sanitize_captured(capture, text, sanitizer, max_len));
        }
    }
    Some(bytes_marker(capture.len()))
}

/// Current time in the record's timestamp format.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
