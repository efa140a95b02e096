//! Configuration for the StatsLayer middleware.

use crate::HEALTHCHECK_PATH;
use std::collections::HashSet;
use std::ops::{Range, RangeInclusive};
use std::time::Duration;

/// Paths skipped by default.
pub const DEFAULT_EXCLUDED_PATHS: [&str; 6] = [
    HEALTHCHECK_PATH,
    "/metrics",
    "/stats",
    "/docs",
    "/redoc",
    "/openapi.json",
];

/// Configuration for request statistics.
///
/// ```
/// use std::time::Duration;
/// use trafficlens_extras::stats::StatsConfig;
///
/// let config = StatsConfig::new()
///     .max_records(1000)
///     .publish_every(100)
///     .publish_after(Duration::from_secs(30));
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Paths that are never recorded (exact match).
    pub(crate) excluded_paths: HashSet<String>,

    /// Ring buffer capacity. Default: 500.
    pub(crate) max_records: usize,

    /// Publish on every N-th request. Default: 50.
    pub(crate) publish_every: u64,

    /// Publish when the last publication is older than this. Default: 10s.
    pub(crate) publish_after: Duration,

    /// Size of the slowest-requests list. Default: 5.
    pub(crate) slowest_count: usize,

    /// Statuses counted as successful. Default: 200..300.
    pub(crate) success_statuses: Range<u16>,

    /// Statuses tracked in the holder's per-status history. Default: 500..=600.
    pub(crate) error_statuses: RangeInclusive<u16>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            excluded_paths: DEFAULT_EXCLUDED_PATHS.iter().map(|p| p.to_string()).collect(),
            max_records: 500,
            publish_every: 50,
            publish_after: Duration::from_secs(10),
            slowest_count: 5,
            success_statuses: 200..300,
            error_statuses: 500..=600,
        }
    }

    /// Add a path that is never recorded.
    pub fn exclude_path(mut self, path: impl Into<String>) -> Self {
        self.excluded_paths.insert(path.into());
        self
    }

    /// Replace the set of excluded paths.
    ///
    /// [`HEALTHCHECK_PATH`] stays excluded regardless.
    pub fn excluded_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the ring buffer capacity (at least 1).
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = max.max(1);
        self
    }

    /// Publish on every N-th request (at least 1).
    pub fn publish_every(mut self, every: u64) -> Self {
        self.publish_every = every.max(1);
        self
    }

    /// Publish when the previous publication is older than `after`.
    pub fn publish_after(mut self, after: Duration) -> Self {
        self.publish_after = after;
        self
    }

    /// Set how many of the slowest requests a snapshot lists.
    pub fn slowest_count(mut self, count: usize) -> Self {
        self.slowest_count = count;
        self
    }

    /// Set the status range counted as successful.
    pub fn success_statuses(mut self, statuses: Range<u16>) -> Self {
        self.success_statuses = statuses;
        self
    }

    /// Set the status range tracked per status code in the holder.
    pub fn error_statuses(mut self, statuses: RangeInclusive<u16>) -> Self {
        self.error_statuses = statuses;
        self
    }

    /// Whether `path` is skipped.
    pub fn is_excluded(&self, path: &str) -> bool {
        path == HEALTHCHECK_PATH || self.excluded_paths.contains(path)
    }

    /// Ring buffer capacity.
    pub fn capacity(&self) -> usize {
        self.max_records
    }

    pub(crate) fn is_success(&self, status: u16) -> bool {
        self.success_statuses.contains(&status)
    }

    pub(crate) fn is_error(&self, status: u16) -> bool {
        self.error_statuses.contains(&status)
    }
}
