//! Record formatters

use super::record::{LogRecord, RecordError};
use serde_json::{json, Map, Value};

/// Turns a [`LogRecord`] into the structured value handed to a sink.
pub trait LogFormatter: Send + Sync + 'static {
    /// Format a single record
    fn format(&self, record: &LogRecord) -> Result<Value, RecordError>;
}

/// Nested record shape (default).
///
/// ```json
/// {"t": "...", "method": "GET", "url": "...",
///  "request": {"request_headers": {}, "params": {}, "request-body": null,
///              "from": {"ip": "...", "port": 1234}},
///  "response": {"response_headers": {}, "body": null,
///               "response_code": 200, "elapsed_ms": 1.5}}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedFormatter;

impl LogFormatter for NestedFormatter {
    fn format(&self, record: &LogRecord) -> Result<Value, RecordError> {
        Ok(serde_json::to_value(record)?)
    }
}

/// Single-level object with dotted keys, for log pipelines that index
/// top-level fields only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatFormatter;

impl LogFormatter for FlatFormatter {
    fn format(&self, record: &LogRecord) -> Result<Value, RecordError> {
        let mut map = Map::new();
        map.insert("timestamp".into(), json!(record.t));
        map.insert("http.method".into(), json!(record.method));
        map.insert("http.url".into(), json!(record.url));
        map.insert("http.status_code".into(), json!(record.response.response_code));
        map.insert("http.elapsed_ms".into(), json!(record.response.elapsed_ms));
        map.insert("client.ip".into(), json!(record.request.from.ip));
        map.insert("client.port".into(), json!(record.request.from.port));
        map.insert(
            "http.request.headers".into(),
            serde_json::to_value(&record.request.request_headers)?,
        );
        map.insert(
            "http.request.params".into(),
            serde_json::to_value(&record.request.params)?,
        );
        if let Some(form) = &record.request.form {
            map.insert("http.request.form".into(), serde_json::to_value(form)?);
        }
        map.insert("http.request.body".into(), json!(record.request.body));
        map.insert(
            "http.response.headers".into(),
            serde_json::to_value(&record.response.response_headers)?,
        );
        map.insert("http.response.body".into(), json!(record.response.body));
        Ok(Value::Object(map))
    }
}
