//! Body type shared by requests and responses
//!
//! [`Body`] erases the concrete `http_body::Body` implementation so that a
//! middleware can swap a streaming transport body for a buffered one (or the
//! other way around) without changing the request/response type.
//!
//! # Example
//!
//! ```rust
//! use trafficlens_core::Body;
//! use futures_util::stream;
//! use bytes::Bytes;
//!
//! let full = Body::from("hello");
//! let streamed = Body::from_stream(stream::iter(vec![
//!     Ok::<_, std::io::Error>(Bytes::from("chunk 1")),
//!     Ok(Bytes::from("chunk 2")),
//! ]));
//! # let _ = (full, streamed);
//! ```

use crate::error::BoxError;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body::{Body as _, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Type-erased HTTP body.
pub struct Body(UnsyncBoxBody<Bytes, BoxError>);

impl Body {
    /// Wrap any `http_body::Body` producing `Bytes`.
    pub fn new<B>(body: B) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(Into::into).boxed_unsync())
    }

    /// Create an empty body
    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new())
    }

    /// Create a body holding a single chunk
    pub fn full(data: impl Into<Bytes>) -> Self {
        Self::new(Full::new(data.into()))
    }

    /// Create a body from a stream of chunks.
    ///
    /// Chunks are forwarded in order; the first error ends the body.
    pub fn from_stream<S, D, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<D, E>> + Send + 'static,
        D: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        let frames = stream
            .map_ok(|chunk| Frame::data(chunk.into()))
            .map_err(|err| -> BoxError { err.into() });
        Self::new(StreamBody::new(frames))
    }

    /// Drain the body into a single buffer.
    pub async fn to_bytes(self) -> Result<Bytes, BoxError> {
        Ok(self.collect().await?.to_bytes())
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.0).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::full(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::full(s)
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Self::full(v)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Self::full(b)
    }
}
