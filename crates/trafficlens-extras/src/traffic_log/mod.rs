//! Structured traffic logging.
//!
//! [`TrafficLogLayer`] records one structured entry per request/response
//! pair: client identity, query and form parameters, sanitized headers and
//! bodies, status and elapsed time. Records are shaped by a [`LogFormatter`]
//! and delivered to a [`LogSink`].
//!
//! # Example
//!
//! ```rust
//! use trafficlens_core::{sync_next_fn, IntoResponse, LayerStack};
//! use trafficlens_extras::traffic_log::{FlatFormatter, TrafficLogConfig, TrafficLogLayer};
//!
//! let stack = LayerStack::new().layer(
//!     TrafficLogLayer::with_config(
//!         TrafficLogConfig::new()
//!             .exclude_path("/metrics")
//!             .sensitive_fields(["password", "token"]),
//!     )
//!     .formatter(FlatFormatter),
//! );
//! let chain = stack.build(sync_next_fn(|_req| Ok("ok".into_response())));
//! # let _ = chain;
//! ```

mod config;
mod formats;
mod layer;
mod record;
mod sink;

pub use config::{TrafficLogConfig, DEFAULT_MAX_FIELD_LEN};
pub use formats::{FlatFormatter, LogFormatter, NestedFormatter};
pub use layer::{resolve_client_ip, TrafficLogLayer};
pub use record::{
    parse_params, ClientInfo, LogRecord, ParamValue, Params, RecordError, RequestLog, ResponseLog,
};
pub use sink::{CallbackSink, LogCallback, LogSink, MemorySink, TracingSink};
