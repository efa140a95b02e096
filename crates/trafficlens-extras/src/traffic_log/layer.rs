//! TrafficLogLayer middleware.
//!
//! Captures the request body (for payload-carrying methods), runs the rest of
//! the chain, captures the response body, and emits one record per request.
//! Both bodies are handed on as replay bodies, so nothing downstream notices
//! the interception.

use super::config::TrafficLogConfig;
use super::formats::{LogFormatter, NestedFormatter};
use super::record::{
    parse_params, render_request_body, render_response_body, round2, timestamp_now, ClientInfo,
    LogRecord, ParamValue, Params, RecordError, RequestLog, ResponseLog,
};
use super::sink::{LogSink, TracingSink};
use crate::sanitization::{Sanitizer, MASK};
use http::{header, HeaderMap, Method, StatusCode};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use trafficlens_core::middleware::{BoxFuture, BoxedNext, HandlerResult, MiddlewareLayer};
use trafficlens_core::{capture, Body, Capture, Request, Response};

/// Structured request/response logging middleware.
///
/// ```
/// use trafficlens_extras::traffic_log::{MemorySink, TrafficLogConfig, TrafficLogLayer};
///
/// let sink = MemorySink::new(100);
/// let layer = TrafficLogLayer::with_config(
///     TrafficLogConfig::new().sensitive_fields(["password"]),
/// )
/// .sink(sink.clone());
/// # let _ = layer;
/// ```
#[derive(Clone)]
pub struct TrafficLogLayer {
    config: Arc<TrafficLogConfig>,
    formatter: Arc<dyn LogFormatter>,
    sink: Option<Arc<dyn LogSink>>,
}

impl TrafficLogLayer {
    /// Default configuration, nested records, `tracing` output.
    pub fn new() -> Self {
        Self::with_config(TrafficLogConfig::new())
    }

    /// Custom configuration, nested records, `tracing` output.
    pub fn with_config(config: TrafficLogConfig) -> Self {
        Self {
            config: Arc::new(config),
            formatter: Arc::new(NestedFormatter),
            sink: Some(Arc::new(TracingSink)),
        }
    }

    /// Use another record formatter.
    pub fn formatter<F: LogFormatter>(mut self, formatter: F) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Send records to `sink`.
    pub fn sink<S: LogSink>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Drop records instead of emitting them.
    pub fn without_sink(mut self) -> Self {
        self.sink = None;
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &TrafficLogConfig {
        &self.config
    }
}

impl Default for TrafficLogLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the client IP.
///
/// Priority: `x-real-ip`, then the first entry of `x-forwarded-for`, then
/// the transport peer, else `"unknown"`.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.to_string();
    }

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }

    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

fn carries_payload(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| {
            ct.to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

fn mask_params(mut params: Params, sanitizer: &Sanitizer) -> Params {
    for (key, value) in params.iter_mut() {
        if sanitizer.is_sensitive_field(key) {
            *value = match value {
                ParamValue::Single(_) => ParamValue::Single(MASK.to_string()),
                ParamValue::Multi(values) => {
                    ParamValue::Multi(values.iter().map(|_| MASK.to_string()).collect())
                }
            };
        }
    }
    params
}

/// What is known about the request before the chain runs.
struct RequestSide {
    method: String,
    url: String,
    headers: BTreeMap<String, String>,
    query: String,
    form: bool,
    from: ClientInfo,
    body: Option<Capture>,
}

impl RequestSide {
    fn into_log(self, config: &TrafficLogConfig) -> Result<(String, String, RequestLog), RecordError> {
        let sanitizer = config.sanitizer();
        let params = mask_params(parse_params(&self.query)?, sanitizer);

        let form = match (&self.body, self.form) {
            (Some(captured), true) if captured.error().is_none() && !captured.is_partial() => {
                match captured.as_utf8() {
                    Some(text) => Some(mask_params(parse_params(text)?, sanitizer)),
                    None => None,
                }
            }
            _ => None,
        };

        let body = self
            .body
            .as_ref()
            .map(|captured| render_request_body(captured, sanitizer, config.max_field_len));

        let log = RequestLog {
            request_headers: self.headers,
            params,
            form,
            body,
            from: self.from,
        };
        Ok((self.method, self.url, log))
    }
}

fn build_record(
    config: &TrafficLogConfig,
    formatter: &dyn LogFormatter,
    request: RequestSide,
    response_headers: &HeaderMap,
    status: StatusCode,
    response_body: Option<&Capture>,
    elapsed_ms: f64,
) -> Result<serde_json::Value, RecordError> {
    let sanitizer = config.sanitizer();
    let (method, url, request) = request.into_log(config)?;

    let content_type = response_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = response_body.and_then(|captured| {
        render_response_body(
            captured,
            content_type,
            sanitizer,
            config.response_cap(status.as_u16()),
        )
    });

    let record = LogRecord {
        t: timestamp_now(),
        method,
        url,
        request,
        response: ResponseLog {
            response_headers: sanitizer.sanitize_headers(response_headers),
            body,
            response_code: status.as_u16(),
            elapsed_ms,
        },
    };

    formatter.format(&record)
}

impl MiddlewareLayer for TrafficLogLayer {
    fn call(&self, mut req: Request, next: BoxedNext) -> BoxFuture<HandlerResult> {
        let config = self.config.clone();
        let formatter = self.formatter.clone();
        let sink = self.sink.clone();

        Box::pin(async move {
            let Some(sink) = sink else {
                return next(req).await;
            };
            if config.is_excluded(req.path()) {
                return next(req).await;
            }

            let peer = req.peer_addr();
            let body = if config.log_request_body && carries_payload(req.method()) {
                let (captured, replay) = capture(req.take_body(), config.max_capture_bytes).await;
                req.set_body(replay);
                Some(captured)
            } else {
                None
            };

            let request_side = RequestSide {
                method: req.method().to_string(),
                url: req.full_url(),
                headers: config.sanitizer().sanitize_headers(req.headers()),
                query: req.query_string().unwrap_or_default().to_string(),
                form: is_form(req.headers()),
                from: ClientInfo {
                    ip: resolve_client_ip(req.headers(), peer),
                    port: peer.map(|addr| addr.port()),
                },
                body,
            };

            let start = Instant::now();
            let response = next(req).await?;
            let elapsed_ms = round2(start.elapsed().as_secs_f64() * 1000.0);

            let (parts, body) = response.into_parts();
            let (response_capture, body) = if config.log_response_body {
                let (captured, replay) = capture(body, config.max_capture_bytes).await;
                (Some(captured), Body::from(replay))
            } else {
                (None, body)
            };

            match build_record(
                &config,
                formatter.as_ref(),
                request_side,
                &parts.headers,
                parts.status,
                response_capture.as_ref(),
                elapsed_ms,
            ) {
                Ok(record) => sink.emit(parts.status, record),
                Err(err) => tracing::warn!(error = %err, "failed to build traffic log record"),
            }

            Ok(Response::from_parts(parts, body))
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}
