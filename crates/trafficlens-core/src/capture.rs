//! Non-destructive body capture
//!
//! A transport body can only be drained once. [`capture`] drains it into an
//! owned buffer and hands back a [`ReplayBody`]: a fresh, single-use body that
//! yields exactly the bytes that were read, followed by whatever the original
//! body had left (when a read limit stopped the capture early), followed by
//! the original error or trailers. Downstream consumers therefore observe the
//! same byte sequence they would have seen without interception.
//!
//! # Example
//!
//! ```rust
//! use trafficlens_core::{capture::capture, Body};
//!
//! # async fn demo() {
//! let (captured, replay) = capture(Body::from("{\"id\":1}"), None).await;
//! assert_eq!(captured.bytes().as_ref(), b"{\"id\":1}");
//!
//! let body = Body::new(replay);
//! assert_eq!(body.to_bytes().await.unwrap().as_ref(), b"{\"id\":1}");
//! # }
//! ```

use crate::body::Body;
use crate::error::{BoxError, CaptureError};
use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use http_body::{Body as _, Frame, SizeHint};
use http_body_util::BodyExt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// What an interceptor observed while draining a body.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    bytes: Bytes,
    partial: bool,
    error: Option<CaptureError>,
}

impl Capture {
    /// The bytes read from the body.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Number of bytes read.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was read.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether reading stopped at the limit before the end of the body.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// The read error, if the body failed while being drained.
    pub fn error(&self) -> Option<&CaptureError> {
        self.error.as_ref()
    }

    /// Decode the captured bytes as UTF-8.
    ///
    /// For a partial capture an incomplete code point cut by the limit is
    /// dropped instead of failing the whole decode.
    pub fn as_utf8(&self) -> Option<&str> {
        match std::str::from_utf8(&self.bytes) {
            Ok(text) => Some(text),
            Err(err) if self.partial && err.error_len().is_none() => {
                std::str::from_utf8(&self.bytes[..err.valid_up_to()]).ok()
            }
            Err(_) => None,
        }
    }
}

/// Drain `body` into memory, buffering at most `limit` bytes when given.
///
/// A data frame that crosses the limit is split: the head is buffered and
/// the tail is held back for the [`ReplayBody`], which yields it before
/// polling the rest of the original body. The capture counts as partial only
/// when bytes were actually left unread.
///
/// Never fails: a read error is recorded on the returned [`Capture`] and
/// re-delivered by the [`ReplayBody`] after the bytes read before it.
pub async fn capture(mut body: Body, limit: Option<usize>) -> (Capture, ReplayBody) {
    let mut buf = BytesMut::new();
    let mut trailers = None;
    let mut failure: Option<BoxError> = None;
    let mut pending: Option<Bytes> = None;

    loop {
        match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(mut data) => {
                    let room = limit.map_or(usize::MAX, |max| max.saturating_sub(buf.len()));
                    if data.len() > room {
                        buf.extend_from_slice(&data.split_to(room));
                        pending = Some(data);
                        break;
                    }
                    buf.extend_from_slice(&data);
                }
                Err(frame) => {
                    if let Ok(t) = frame.into_trailers() {
                        trailers = Some(t);
                    }
                }
            },
            Some(Err(err)) => {
                tracing::debug!(error = %err, read = buf.len(), "body read failed during capture");
                failure = Some(err);
                break;
            }
            None => break,
        }
    }

    let bytes = buf.freeze();
    let captured = Capture {
        bytes: bytes.clone(),
        partial: pending.is_some(),
        error: failure.as_ref().map(CaptureError::read),
    };

    let replay = ReplayBody {
        buffered: (!bytes.is_empty()).then_some(bytes),
        rest: pending.is_some().then_some(body),
        pending,
        failure,
        trailers,
    };

    (captured, replay)
}

/// Single-use body replaying a captured prefix.
///
/// Frames are produced in this order: the captured bytes as one data frame,
/// the held-back tail of a frame split at the limit, the original read error
/// (if any), the unread remainder of the original body, then trailers. Once exhausted it
/// reports end-of-stream on every subsequent poll.
pub struct ReplayBody {
    buffered: Option<Bytes>,
    pending: Option<Bytes>,
    failure: Option<BoxError>,
    rest: Option<Body>,
    trailers: Option<HeaderMap>,
}

impl ReplayBody {
    /// A replay body that yields `bytes` once.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            buffered: (!bytes.is_empty()).then_some(bytes),
            pending: None,
            failure: None,
            rest: None,
            trailers: None,
        }
    }
}

impl std::fmt::Debug for ReplayBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayBody")
            .field("buffered", &self.buffered.as_ref().map(Bytes::len))
            .field("pending", &self.pending.as_ref().map(Bytes::len))
            .field("failure", &self.failure.is_some())
            .field("rest", &self.rest.is_some())
            .field("trailers", &self.trailers.is_some())
            .finish()
    }
}

impl http_body::Body for ReplayBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if let Some(bytes) = self.buffered.take() {
            return Poll::Ready(Some(Ok(Frame::data(bytes))));
        }

        if let Some(bytes) = self.pending.take() {
            return Poll::Ready(Some(Ok(Frame::data(bytes))));
        }

        if let Some(err) = self.failure.take() {
            self.rest = None;
            self.trailers = None;
            return Poll::Ready(Some(Err(err)));
        }

        if let Some(rest) = self.rest.as_mut() {
            match Pin::new(rest).poll_frame(cx) {
                Poll::Ready(None) => self.rest = None,
                Poll::Ready(Some(Err(err))) => {
                    self.rest = None;
                    self.trailers = None;
                    return Poll::Ready(Some(Err(err)));
                }
                other => return other,
            }
        }

        Poll::Ready(self.trailers.take().map(|t| Ok(Frame::trailers(t))))
    }

    fn is_end_stream(&self) -> bool {
        self.buffered.is_none()
            && self.pending.is_none()
            && self.failure.is_none()
            && self.trailers.is_none()
            && self.rest.as_ref().map_or(true, |rest| rest.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        let buffered = [&self.buffered, &self.pending]
            .into_iter()
            .flatten()
            .map(|b| b.len() as u64)
            .sum::<u64>();
        match &self.rest {
            None => SizeHint::with_exact(buffered),
            Some(rest) => {
                let inner = rest.size_hint();
                let mut hint = SizeHint::new();
                hint.set_lower(inner.lower() + buffered);
                if let Some(upper) = inner.upper() {
                    hint.set_upper(upper + buffered);
                }
                hint
            }
        }
    }
}

impl From<ReplayBody> for Body {
    fn from(replay: ReplayBody) -> Self {
        Body::new(replay)
    }
}
