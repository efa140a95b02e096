//! Handler chain for TrafficLens middleware
//!
//! An interceptor is a [`MiddlewareLayer`]: it receives the request together
//! with the rest of the chain as a [`BoxedNext`], and decides what to do before
//! and after calling it. A [`LayerStack`] composes interceptors around a
//! terminal handler.

use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_service::Service;

/// Outcome of running the rest of the chain.
///
/// `Err` means the handler (or an inner layer) failed without producing a
/// response. Interceptors observe it and pass it on unchanged.
pub type HandlerResult = Result<Response, BoxError>;

/// Boxed future returned by handlers and middleware
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A boxed next function for middleware chains
pub type BoxedNext = Arc<dyn Fn(Request) -> BoxFuture<HandlerResult> + Send + Sync>;

/// Trait for request/response interceptors
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Handle a request, calling `next` to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<HandlerResult>;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Wrap an async function as the terminal handler of a chain.
///
/// ```rust
/// use trafficlens_core::{next_fn, IntoResponse, Request};
///
/// let handler = next_fn(|_req: Request| async { Ok("ok".into_response()) });
/// # let _ = handler;
/// ```
pub fn next_fn<F, Fut>(f: F) -> BoxedNext
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)) as BoxFuture<HandlerResult>)
}

/// Wrap a synchronous function as the terminal handler of a chain.
pub fn sync_next_fn<F>(f: F) -> BoxedNext
where
    F: Fn(Request) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(move |req| {
        let result = f(req);
        Box::pin(async move { result }) as BoxFuture<HandlerResult>
    })
}

/// A stack of middleware layers
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware layer to the stack
    ///
    /// Layers run in the order they are added, the first one outermost.
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(layer);
    }

    /// Builder-style [`push`](Self::push)
    pub fn layer<L: MiddlewareLayer>(mut self, layer: L) -> Self {
        self.push(Box::new(layer));
        self
    }

    /// Add a middleware layer as the new outermost layer
    pub fn prepend(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.insert(0, layer);
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Compose the layers around `handler` into a single callable chain
    pub fn build(&self, handler: BoxedNext) -> BoxedNext {
        let mut next = handler;

        // Innermost first, so the first pushed layer ends up outermost.
        for layer in self.layers.iter().rev() {
            let layer: Arc<dyn MiddlewareLayer> = Arc::from(layer.clone_box());
            let inner = next;
            next = Arc::new(move |req: Request| layer.call(req, inner.clone()));
        }

        next
    }

    /// Execute the middleware stack with a final handler
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture<HandlerResult> {
        if self.layers.is_empty() {
            return handler(req);
        }
        self.build(handler)(req)
    }
}

/// A `tower::Service` view of the rest of the chain
pub struct NextService {
    next: BoxedNext,
}

impl NextService {
    pub fn new(next: BoxedNext) -> Self {
        Self { next }
    }
}

impl Clone for NextService {
    fn clone(&self) -> Self {
        Self {
            next: self.next.clone(),
        }
    }
}

impl Service<Request> for NextService {
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        (self.next)(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::response::IntoResponse;
    use http::{Method, StatusCode};
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn create_test_request(method: Method, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
            .into()
    }

    fn status_handler(status: StatusCode) -> BoxedNext {
        sync_next_fn(move |_req| Ok((status, "test").into_response()))
    }

    /// Records pre/post execution per layer id
    #[derive(Clone)]
    struct OrderTrackingMiddleware {
        id: usize,
        order: Arc<Mutex<Vec<(usize, &'static str)>>>,
    }

    impl MiddlewareLayer for OrderTrackingMiddleware {
        fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<HandlerResult> {
            let id = self.id;
            let order = self.order.clone();

            Box::pin(async move {
                order.lock().unwrap().push((id, "pre"));
                let result = next(req).await;
                order.lock().unwrap().push((id, "post"));
                result
            })
        }

        fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
            Box::new(self.clone())
        }
    }

    /// Answers without calling the rest of the chain
    #[derive(Clone)]
    struct ShortCircuitMiddleware {
        status: StatusCode,
    }

    impl MiddlewareLayer for ShortCircuitMiddleware {
        fn call(&self, _req: Request, _next: BoxedNext) -> BoxFuture<HandlerResult> {
            let status = self.status;
            Box::pin(async move { Ok(status.into_response()) })
        }

        fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
            Box::new(self.clone())
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_layer_preserves_handler_status(handler_status in 200u16..600u16) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let order = Arc::new(Mutex::new(Vec::new()));
                let stack = LayerStack::new()
                    .layer(OrderTrackingMiddleware { id: 1, order: order.clone() });

                let status = StatusCode::from_u16(handler_status).unwrap();
                let response = stack
                    .execute(create_test_request(Method::GET, "/test"), status_handler(status))
                    .await
                    .unwrap();

                prop_assert_eq!(response.status(), status);
                let execution_order = order.lock().unwrap();
                prop_assert_eq!(execution_order.clone(), vec![(1usize, "pre"), (1usize, "post")]);
                Ok(())
            });
            result?;
        }

        #[test]
        fn prop_middleware_execution_order(num_layers in 1usize..10usize) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let order = Arc::new(Mutex::new(Vec::new()));
                let mut stack = LayerStack::new();
                for id in 0..num_layers {
                    stack.push(Box::new(OrderTrackingMiddleware { id, order: order.clone() }));
                }

                stack
                    .execute(create_test_request(Method::GET, "/test"), status_handler(StatusCode::OK))
                    .await
                    .unwrap();

                let execution_order = order.lock().unwrap();
                prop_assert_eq!(execution_order.len(), num_layers * 2);
                for i in 0..num_layers {
                    prop_assert_eq!(execution_order[i], (i, "pre"));
                    prop_assert_eq!(execution_order[num_layers + i], (num_layers - 1 - i, "post"));
                }
                Ok(())
            });
            result?;
        }
    }

    #[tokio::test]
    async fn empty_stack_calls_handler_directly() {
        let stack = LayerStack::new();
        let response = stack
            .execute(
                create_test_request(Method::GET, "/"),
                status_handler(StatusCode::ACCEPTED),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn short_circuit_skips_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let handler = sync_next_fn(move |_req| {
            flag.store(true, Ordering::SeqCst);
            Ok(StatusCode::OK.into_response())
        });

        let stack = LayerStack::new().layer(ShortCircuitMiddleware {
            status: StatusCode::UNAUTHORIZED,
        });
        let response = stack
            .execute(create_test_request(Method::GET, "/"), handler)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn handler_error_travels_through_layers() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stack = LayerStack::new().layer(OrderTrackingMiddleware {
            id: 7,
            order: order.clone(),
        });
        let handler = next_fn(|_req| async { Err::<Response, BoxError>("handler exploded".into()) });

        let err = stack
            .execute(create_test_request(Method::POST, "/boom"), handler)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "handler exploded");
        assert_eq!(*order.lock().unwrap(), vec![(7usize, "pre"), (7usize, "post")]);
    }

    #[tokio::test]
    async fn next_service_drives_the_chain() {
        use tower::ServiceExt;

        let service = NextService::new(status_handler(StatusCode::CREATED));
        let response = service
            .oneshot(create_test_request(Method::GET, "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
