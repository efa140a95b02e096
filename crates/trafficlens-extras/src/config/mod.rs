//! Environment-driven configuration.
//!
//! Interceptor settings can be read from environment variables, optionally
//! seeded from a `.env` file. Lists are comma-separated.
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `TRAFFIC_LOG_EXCLUDED_PATHS` | logger bypass paths |
//! | `TRAFFIC_LOG_MAX_FIELD_LEN` | body length cap |
//! | `TRAFFIC_LOG_LOG_REQUEST_BODY` / `TRAFFIC_LOG_LOG_RESPONSE_BODY` | capture toggles |
//! | `TRAFFIC_LOG_SENSITIVE_FIELDS` | masked field names |
//! | `TRAFFIC_LOG_RESPONSE_BODY_LIMIT` / `TRAFFIC_LOG_SERVER_ERROR_BODY_LIMIT` | response caps |
//! | `TRAFFIC_LOG_MAX_CAPTURE_BYTES` | buffering bound |
//! | `TRAFFIC_STATS_EXCLUDED_PATHS` | stats bypass paths |
//! | `TRAFFIC_STATS_MAX_RECORDS` | window capacity |
//! | `TRAFFIC_STATS_PUBLISH_EVERY` / `TRAFFIC_STATS_PUBLISH_AFTER_SECS` | publish cadence |
//! | `TRAFFIC_STATS_SLOWEST_COUNT` | slowest-requests list size |
//!
//! # Example
//!
//! ```ignore
//! use trafficlens_extras::config::load_dotenv;
//! use trafficlens_extras::traffic_log::TrafficLogConfig;
//!
//! load_dotenv();
//! let config = TrafficLogConfig::from_env()?;
//! ```
//!
//! Unset variables keep the builder defaults.

use serde::Deserialize;

/// Prefix of traffic logger variables.
pub const TRAFFIC_LOG_PREFIX: &str = "TRAFFIC_LOG_";

/// Prefix of stats variables.
pub const STATS_PREFIX: &str = "TRAFFIC_STATS_";

/// Error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was present but could not be parsed.
    #[error("Configuration error: {0}")]
    Envy(#[from] envy::Error),
}

/// Load environment variables from a `.env` file in the current directory.
///
/// A missing file is not an error. Variables already set win over the file.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load environment variables from a specific file.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}

#[cfg(feature = "traffic-log")]
mod traffic_log_env {
    use super::{ConfigError, Deserialize, TRAFFIC_LOG_PREFIX};
    use crate::traffic_log::TrafficLogConfig;

    #[derive(Debug, Default, Deserialize)]
    struct TrafficLogEnv {
        excluded_paths: Option<Vec<String>>,
        max_field_len: Option<usize>,
        log_request_body: Option<bool>,
        log_response_body: Option<bool>,
        sensitive_fields: Option<Vec<String>>,
        response_body_limit: Option<usize>,
        server_error_body_limit: Option<usize>,
        max_capture_bytes: Option<usize>,
    }

    impl TrafficLogEnv {
        fn apply(self, mut config: TrafficLogConfig) -> TrafficLogConfig {
            if let Some(paths) = self.excluded_paths {
                config = config.excluded_paths(trimmed(paths));
            }
            if let Some(len) = self.max_field_len {
                config = config.max_field_len(len);
            }
            if let Some(enabled) = self.log_request_body {
                config = config.log_request_body(enabled);
            }
            if let Some(enabled) = self.log_response_body {
                config = config.log_response_body(enabled);
            }
            if let Some(fields) = self.sensitive_fields {
                config = config.sensitive_fields(trimmed(fields));
            }
            if let Some(len) = self.response_body_limit {
                config = config.response_body_limit(len);
            }
            if let Some(len) = self.server_error_body_limit {
                config = config.server_error_body_limit(len);
            }
            if let Some(bytes) = self.max_capture_bytes {
                config = config.max_capture_bytes(bytes);
            }
            config
        }
    }

    fn trimmed(values: Vec<String>) -> impl Iterator<Item = String> {
        values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    impl TrafficLogConfig {
        /// Read `TRAFFIC_LOG_*` variables over the defaults.
        pub fn from_env() -> Result<Self, ConfigError> {
            let env: TrafficLogEnv = envy::prefixed(TRAFFIC_LOG_PREFIX).from_env()?;
            Ok(env.apply(Self::new()))
        }

        /// Like [`from_env`](Self::from_env), reading from an explicit set of
        /// variables.
        pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
        where
            I: IntoIterator<Item = (String, String)>,
        {
            let env: TrafficLogEnv = envy::prefixed(TRAFFIC_LOG_PREFIX).from_iter(vars)?;
            Ok(env.apply(Self::new()))
        }
    }
}

#[cfg(feature = "stats")]
mod stats_env {
    use super::{ConfigError, Deserialize, STATS_PREFIX};
    use crate::stats::StatsConfig;
    use std::time::Duration;

    #[derive(Debug, Default, Deserialize)]
    struct StatsEnv {
        excluded_paths: Option<Vec<String>>,
        max_records: Option<usize>,
        publish_every: Option<u64>,
        publish_after_secs: Option<u64>,
        slowest_count: Option<usize>,
    }

    impl StatsEnv {
        fn apply(self, mut config: StatsConfig) -> StatsConfig {
            if let Some(paths) = self.excluded_paths {
                config = config.excluded_paths(
                    paths
                        .into_iter()
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty()),
                );
            }
            if let Some(max) = self.max_records {
                config = config.max_records(max);
            }
            if let Some(every) = self.publish_every {
                config = config.publish_every(every);
            }
            if let Some(secs) = self.publish_after_secs {
                config = config.publish_after(Duration::from_secs(secs));
            }
            if let Some(count) = self.slowest_count {
                config = config.slowest_count(count);
            }
            config
        }
    }

    impl StatsConfig {
        /// Read `TRAFFIC_STATS_*` variables over the defaults.
        pub fn from_env() -> Result<Self, ConfigError> {
            let env: StatsEnv = envy::prefixed(STATS_PREFIX).from_env()?;
            Ok(env.apply(Self::new()))
        }

        /// Like [`from_env`](Self::from_env), reading from an explicit set of
        /// variables.
        pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
        where
            I: IntoIterator<Item = (String, String)>,
        {
            let env: StatsEnv = envy::prefixed(STATS_PREFIX).from_iter(vars)?;
            Ok(env.apply(Self::new()))
        }
    }
}
