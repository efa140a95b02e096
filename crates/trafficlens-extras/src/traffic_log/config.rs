//! Configuration for the TrafficLogLayer middleware.

use crate::sanitization::Sanitizer;
use crate::HEALTHCHECK_PATH;
use std::collections::HashSet;

/// Default cap on logged body length, in characters.
pub const DEFAULT_MAX_FIELD_LEN: usize = 5000;

/// Configuration for the TrafficLogLayer middleware.
///
/// ```
/// use trafficlens_extras::traffic_log::TrafficLogConfig;
///
/// let config = TrafficLogConfig::new()
///     .exclude_path("/metrics")
///     .max_field_len(2000)
///     .server_error_body_limit(4000)
///     .sensitive_fields(["password", "token", "authorization"]);
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct TrafficLogConfig {
    /// Paths bypassed entirely (exact match). Default: `/healthcheck`.
    pub(crate) excluded_paths: HashSet<String>,

    /// Cap on logged request body length, in characters. Default: 5000.
    pub(crate) max_field_len: usize,

    /// Whether request bodies are captured. Default: true.
    pub(crate) log_request_body: bool,

    /// Whether response bodies are captured. Default: true.
    pub(crate) log_response_body: bool,

    /// Precompiled masking rules. Default: no sensitive fields.
    pub(crate) sanitizer: Sanitizer,

    /// Response body cap for non-error statuses. `None` uses `max_field_len`.
    pub(crate) response_body_limit: Option<usize>,

    /// Response body cap for statuses 500..=600. `None` uses `max_field_len`.
    pub(crate) server_error_body_limit: Option<usize>,

    /// Most bytes buffered per body. `None` buffers the whole body.
    pub(crate) max_capture_bytes: Option<usize>,
}

impl Default for TrafficLogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficLogConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            excluded_paths: HashSet::from([HEALTHCHECK_PATH.to_string()]),
            max_field_len: DEFAULT_MAX_FIELD_LEN,
            log_request_body: true,
            log_response_body: true,
            sanitizer: Sanitizer::default(),
            response_body_limit: None,
            server_error_body_limit: None,
            max_capture_bytes: None,
        }
    }

    /// Add a path to bypass.
    pub fn exclude_path(mut self, path: impl Into<String>) -> Self {
        self.excluded_paths.insert(path.into());
        self
    }

    /// Replace the set of bypassed paths.
    ///
    /// [`HEALTHCHECK_PATH`] stays bypassed regardless.
    pub fn excluded_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the cap on logged body length.
    pub fn max_field_len(mut self, len: usize) -> Self {
        self.max_field_len = len;
        self
    }

    /// Enable or disable request body capture.
    pub fn log_request_body(mut self, enabled: bool) -> Self {
        self.log_request_body = enabled;
        self
    }

    /// Enable or disable response body capture.
    pub fn log_response_body(mut self, enabled: bool) -> Self {
        self.log_response_body = enabled;
        self
    }

    /// Set the sensitive field names.
    ///
    /// Patterns are compiled here, once.
    pub fn sensitive_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sanitizer = Sanitizer::new(fields);
        self
    }

    /// Set the response body cap for non-error statuses.
    pub fn response_body_limit(mut self, len: usize) -> Self {
        self.response_body_limit = Some(len);
        self
    }

    /// Set the response body cap for server-error statuses.
    pub fn server_error_body_limit(mut self, len: usize) -> Self {
        self.server_error_body_limit = Some(len);
        self
    }

    /// Bound how many bytes of each body are buffered for logging.
    ///
    /// The unread remainder still reaches the downstream consumer.
    pub fn max_capture_bytes(mut self, bytes: usize) -> Self {
        self.max_capture_bytes = Some(bytes);
        self
    }

    /// Whether `path` bypasses the logger.
    pub fn is_excluded(&self, path: &str) -> bool {
        path == HEALTHCHECK_PATH || self.excluded_paths.contains(path)
    }

    /// The masking rules in effect.
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Cap applied to a response body with the given status.
    pub fn response_cap(&self, status: u16) -> usize {
        let limit = if (500..=600).contains(&status) {
            self.server_error_body_limit
        } else {
            self.response_body_limit
        };
        limit.unwrap_or(self.max_field_len)
    }
}
