//! Live request statistics.
//!
//! [`StatsLayer`] feeds a [`StatsAggregator`]: a bounded window of recent
//! [`RequestSample`]s with running counters. On a cadence the aggregator
//! publishes an [`ExtendedStats`] snapshot into a shared [`StatsHolder`],
//! which a status endpoint can read at any time.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trafficlens_core::{sync_next_fn, IntoResponse, Json, LayerStack};
//! use trafficlens_extras::stats::{StatsConfig, StatsHolder, StatsLayer};
//!
//! let holder = Arc::new(StatsHolder::new());
//! let stack = LayerStack::new().layer(StatsLayer::with_holder(StatsConfig::new(), holder.clone()));
//!
//! let status_holder = holder.clone();
//! let chain = stack.build(sync_next_fn(move |req| match req.path() {
//!     "/stats" => Ok(Json(status_holder.get()).into_response()),
//!     _ => Ok("ok".into_response()),
//! }));
//! # let _ = chain;
//! ```

mod aggregator;
mod config;
mod holder;
mod layer;
mod sample;
mod snapshot;

pub use aggregator::StatsAggregator;
pub use config::{StatsConfig, DEFAULT_EXCLUDED_PATHS};
pub use holder::{StatsError, StatsHolder, StatsReport, StatusSummary, UrlRecord, RECENT_URLS_CAP};
pub use layer::StatsLayer;
pub use sample::RequestSample;
pub use snapshot::{
    compute_snapshot, fingerprint, AggregatedStats, ExtendedMetrics, ExtendedStats, SlowRequest,
};
