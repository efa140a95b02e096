//! # trafficlens-core
//!
//! Pipeline types shared by the TrafficLens interceptors:
//!
//! - [`Body`]: a type-erased HTTP body
//! - [`Request`] / [`Response`]: the values flowing through the chain
//! - [`middleware`]: the [`MiddlewareLayer`] trait and [`LayerStack`]
//! - [`capture`]: draining a body for inspection while replaying it downstream
//!
//! With the `server` feature (on by default) a small hyper-based [`Server`]
//! runs a layer stack over HTTP/1.

mod body;
pub mod capture;
mod error;
pub mod middleware;
mod request;
mod response;
#[cfg(feature = "server")]
mod server;

pub use body::Body;
pub use capture::{capture, Capture, ReplayBody};
pub use error::{BoxError, CaptureError, Result};
pub use middleware::{
    next_fn, sync_next_fn, BoxFuture, BoxedNext, HandlerResult, LayerStack, MiddlewareLayer,
};
pub use request::{PeerAddr, Request};
pub use response::{IntoResponse, Json, Response};
#[cfg(feature = "server")]
pub use server::Server;
