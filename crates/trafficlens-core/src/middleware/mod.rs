//! Middleware infrastructure for TrafficLens
//!
//! Interceptors such as the traffic logger and the stats recorder implement
//! [`MiddlewareLayer`] and are composed with a [`LayerStack`].
//!
//! # Example
//!
//! ```rust
//! use trafficlens_core::middleware::LayerStack;
//! use trafficlens_core::{sync_next_fn, IntoResponse};
//!
//! let stack = LayerStack::new();
//! let chain = stack.build(sync_next_fn(|_req| Ok("hello".into_response())));
//! # let _ = chain;
//! ```

mod layer;

pub use layer::{
    next_fn, sync_next_fn, BoxFuture, BoxedNext, HandlerResult, LayerStack, MiddlewareLayer,
    NextService,
};
