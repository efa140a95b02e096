//! Response types for TrafficLens
//!
//! [`Response`] is a plain `http::Response` over the shared [`Body`] type, so
//! an interceptor can swap a streaming body for a replayable one without
//! touching status or headers.
//!
//! | Type | Status | Content-Type |
//! |------|--------|--------------|
//! | `&'static str` / `String` | 200 | text/plain |
//! | `StatusCode` | given | - |
//! | [`Json<T>`] | 200 | application/json |
//! | `(StatusCode, R)` | given | from `R` |

use crate::body::Body;
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use serde::Serialize;

/// HTTP Response type
pub type Response = http::Response<Body>;

/// Trait for types that can be converted into an HTTP response
pub trait IntoResponse {
    /// Convert self into a Response
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        StatusCode::OK.into_response()
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        text_response(Bytes::from_static(self.as_bytes()))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        text_response(Bytes::from(self))
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(Body::empty());
        *response.status_mut() = self;
        response
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;
        response
    }
}

fn text_response(body: Bytes) -> Response {
    let mut response = http::Response::new(Body::full(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// JSON response body
///
/// Serializes the wrapped value with `serde_json`. A serialization failure
/// becomes a 500 with a small JSON error document.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        let (status, body) = match serde_json::to_vec(&self.0) {
            Ok(body) => (StatusCode::OK, body),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize JSON response");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    br#"{"error":"failed to serialize response"}"#.to_vec(),
                )
            }
        };

        let mut response = http::Response::new(Body::full(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}
