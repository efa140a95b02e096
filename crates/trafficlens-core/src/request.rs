//! Request types for TrafficLens

use crate::body::Body;
use crate::error::BoxError;
use bytes::Bytes;
use http::{header, request::Parts, Extensions, HeaderMap, Method, Uri, Version};
use std::net::SocketAddr;

/// Transport-level peer address of the connection a request arrived on.
///
/// Inserted into the request extensions by the server; interceptors fall
/// back to it when no proxy header names the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// HTTP Request wrapper
///
/// Provides access to all parts of an incoming HTTP request. The body can be
/// taken out and put back, which is how interceptors capture it without
/// depriving the handler.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Body,
}

impl Request {
    /// Create a request from parts and a body
    pub fn from_parts(parts: Parts, body: Body) -> Self {
        Self { parts, body }
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Get the query string
    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Transport peer address, when the server recorded one
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.parts.extensions.get::<PeerAddr>().map(|p| p.0)
    }

    /// Take the body, leaving an empty one in its place
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Replace the body
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Mutable access to the body
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Absolute URL of the request.
    ///
    /// Server-side URIs usually carry only the path and query; the scheme and
    /// authority are then rebuilt from the `Host` header. Without either, the
    /// URI is returned as-is.
    pub fn full_url(&self) -> String {
        let uri = &self.parts.uri;
        if uri.authority().is_some() {
            return uri.to_string();
        }

        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        match self
            .parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
        {
            Some(host) => {
                let scheme = uri.scheme_str().unwrap_or("http");
                format!("{}://{}{}", scheme, host, path_and_query)
            }
            None => uri.to_string(),
        }
    }

    /// Split into parts and body
    pub fn into_parts(self) -> (Parts, Body) {
        (self.parts, self.body)
    }

    /// Convert back into an `http::Request`
    pub fn into_http(self) -> http::Request<Body> {
        http::Request::from_parts(self.parts, self.body)
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            parts,
            body: Body::new(body),
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .finish()
    }
}
