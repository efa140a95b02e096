//! Error types for TrafficLens

/// Type-erased error used throughout the handler chain.
///
/// Whatever the terminal handler or an inner middleware fails with travels
/// up the chain as a `BoxError`; the interceptors never swallow it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for handler chain operations
pub type Result<T, E = BoxError> = std::result::Result<T, E>;

/// Failure observed while draining a body for capture.
///
/// A capture error never aborts the request: it only degrades what the
/// observer gets to see. The original error is still delivered to the
/// downstream consumer of the replayed body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The underlying body produced an error frame.
    #[error("{0}")]
    Read(String),
}

impl CaptureError {
    pub(crate) fn read(err: &BoxError) -> Self {
        Self::Read(err.to_string())
    }
}
