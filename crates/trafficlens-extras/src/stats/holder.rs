//! Shared holder for published statistics

use super::snapshot::ExtendedStats;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// How many recent URLs are kept per status code.
pub const RECENT_URLS_CAP: usize = 10;

/// Failure while exporting statistics.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// The report could not be turned into JSON.
    #[error("failed to serialize stats: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A URL that produced a tracked status, and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlRecord {
    /// Request URL
    pub url: String,
    /// RFC 3339 UTC time of the response
    pub time: String,
}

/// Occurrences of one status code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    /// Total occurrences
    pub count: u64,
    /// Most recent URLs, oldest first
    pub last_urls: Vec<UrlRecord>,
}

/// Everything the holder knows, as served to a status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    /// Last published statistics, `null` before the first publication
    pub time: Option<ExtendedStats>,
    /// Per-status history keyed by status code
    pub responses: BTreeMap<String, StatusSummary>,
}

#[derive(Debug, Default)]
struct StatusHistory {
    count: u64,
    last_urls: VecDeque<UrlRecord>,
}

/// Process-wide store of the latest published statistics.
///
/// Created once and shared (`Arc`) between the stats layer, which writes on
/// a cadence, and any endpoint that reads it. Readers see either the old or
/// the new snapshot, never a mix.
#[derive(Debug, Default)]
pub struct StatsHolder {
    latest: RwLock<Option<Arc<ExtendedStats>>>,
    statuses: Mutex<BTreeMap<String, StatusHistory>>,
}

impl StatsHolder {
    /// Create an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published statistics.
    pub fn update(&self, stats: ExtendedStats) {
        let stats = Arc::new(stats);
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(stats);
    }

    /// The last published statistics.
    pub fn latest(&self) -> Option<Arc<ExtendedStats>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether anything has been published yet.
    pub fn is_populated(&self) -> bool {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Count one response with `status` and remember its URL.
    pub fn record_status(&self, status: u16, url: impl Into<String>) {
        let record = UrlRecord {
            url: url.into(),
            time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        };

        let mut statuses = self.statuses();
        let history = statuses.entry(status.to_string()).or_default();
        history.count += 1;
        if history.last_urls.len() >= RECENT_URLS_CAP {
            history.last_urls.pop_front();
        }
        history.last_urls.push_back(record);
    }

    /// Current report.
    pub fn get(&self) -> StatsReport {
        let responses = self
            .statuses()
            .iter()
            .map(|(status, history)| {
                let summary = StatusSummary {
                    count: history.count,
                    last_urls: history.last_urls.iter().cloned().collect(),
                };
                (status.clone(), summary)
            })
            .collect();

        StatsReport {
            time: self.latest().map(|stats| stats.as_ref().clone()),
            responses,
        }
    }

    /// Current report as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, StatsError> {
        Ok(serde_json::to_value(self.get())?)
    }

    fn statuses(&self) -> MutexGuard<'_, BTreeMap<String, StatusHistory>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
