//! Per-request performance samples

use chrono::{DateTime, Utc};
use http::header;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use trafficlens_core::Response;

/// Performance facts about one completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSample {
    /// Absolute request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Time spent in the rest of the chain, in milliseconds
    pub elapsed_ms: f64,
    /// Response `Content-Type`, if any
    pub content_type: Option<String>,
    /// Response `Content-Length`, if present and well-formed
    pub content_length: Option<u64>,
    /// Response status code
    pub status: u16,
    /// When the request completed
    pub timestamp: DateTime<Utc>,
}

impl RequestSample {
    /// Create a sample stamped with the current time.
    pub fn new(url: impl Into<String>, method: impl Into<String>, elapsed_ms: f64, status: u16) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            elapsed_ms,
            content_type: None,
            content_length: None,
            status,
            timestamp: Utc::now(),
        }
    }

    /// Build a sample from a finished response, reading content type and
    /// length from its headers.
    pub fn from_response(
        url: impl Into<String>,
        method: impl Into<String>,
        elapsed_ms: f64,
        response: &Response,
    ) -> Self {
        let headers = response.headers();
        let mut sample = Self::new(url, method, elapsed_ms, response.status().as_u16());
        sample.content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        sample.content_length = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        sample
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the content length.
    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Override the completion time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Hash for RequestSample {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
        self.method.hash(state);
        self.elapsed_ms.to_bits().hash(state);
        self.content_type.hash(state);
        self.content_length.hash(state);
        self.status.hash(state);
        self.timestamp.hash(state);
    }
}
