//! HTTP server implementation

use crate::body::Body;
use crate::error::BoxError;
use crate::middleware::{BoxedNext, LayerStack};
use crate::request::{PeerAddr, Request};
use crate::response::{IntoResponse, Response};
use http::StatusCode;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Minimal HTTP/1 server driving a handler through a [`LayerStack`].
///
/// Every request gets a [`PeerAddr`] extension with the connection's remote
/// address. A handler error that reaches the top of the chain is logged and
/// answered with an empty 500.
pub struct Server {
    chain: BoxedNext,
}

impl Server {
    /// Compose `layers` around `handler`
    pub fn new(layers: LayerStack, handler: BoxedNext) -> Self {
        Self {
            chain: layers.build(handler),
        }
    }

    /// Bind to `addr` and serve until an accept error occurs
    pub async fn run(self, addr: &str) -> Result<(), BoxError> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("TrafficLens server running on http://{}", addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), BoxError> {
        let chain = self.chain;

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let chain = chain.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let chain = chain.clone();
                    async move { Ok::<_, Infallible>(handle_request(chain, req, remote_addr).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error: {}", err);
                }
            });
        }
    }
}

async fn handle_request(
    chain: BoxedNext,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> http::Response<Body> {
    let mut request = Request::from(req);
    request.extensions_mut().insert(PeerAddr(remote_addr));

    let method = request.method().clone();
    let path = request.path().to_string();

    match chain(request).await {
        Ok(response) => response,
        Err(err) => {
            error!(method = %method, path = %path, error = %err, "Handler failed");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
