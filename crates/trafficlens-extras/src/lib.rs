//! # trafficlens-extras
//!
//! Observability interceptors for the TrafficLens handler chain.
//!
//! ## Features
//!
//! - `traffic-log` (default) - structured per-request logging with body
//!   capture, masking and truncation
//! - `stats` (default) - sliding-window request statistics with a shared
//!   holder for status endpoints
//! - `config` - configuration from environment variables and `.env` files
//! - `full` - all features enabled
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! trafficlens-extras = { version = "0.1", features = ["config"] }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Health probe path. Both layers always bypass it, whatever their
/// configured exclusions.
pub const HEALTHCHECK_PATH: &str = "/healthcheck";

// Masking and truncation helpers
pub mod sanitization;

// Structured traffic logging
#[cfg(feature = "traffic-log")]
pub mod traffic_log;

// Request statistics
#[cfg(feature = "stats")]
pub mod stats;

// Environment configuration
#[cfg(feature = "config")]
pub mod config;

#[cfg(feature = "traffic-log")]
pub use traffic_log::{TrafficLogConfig, TrafficLogLayer};

#[cfg(feature = "stats")]
pub use stats::{StatsAggregator, StatsConfig, StatsHolder, StatsLayer};

#[cfg(feature = "config")]
pub use config::{load_dotenv, load_dotenv_from, ConfigError};
