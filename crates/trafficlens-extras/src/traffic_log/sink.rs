//! Destinations for formatted records

use http::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives one formatted record per logged request.
///
/// Called on the response path, so implementations should not block.
pub trait LogSink: Send + Sync + 'static {
    /// Accept a record for a response with the given status
    fn emit(&self, status: StatusCode, record: Value);
}

/// Writes records through `tracing` on the `http` target.
///
/// Level follows the status: `error` for 5xx, `warn` for 4xx, `info`
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, status: StatusCode, record: Value) {
        if status.is_server_error() {
            tracing::error!(target: "http", "{}", record);
        } else if status.is_client_error() {
            tracing::warn!(target: "http", "{}", record);
        } else {
            tracing::info!(target: "http", "{}", record);
        }
    }
}

/// Keeps the most recent records in memory.
///
/// Clones share the same buffer, so a handle kept aside can inspect what a
/// layer emitted.
#[derive(Debug, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<VecDeque<Value>>>,
    capacity: usize,
}

impl MemorySink {
    /// Create a sink holding at most `capacity` records (oldest dropped first).
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Copy of the stored records, oldest first.
    pub fn records(&self) -> Vec<Value> {
        self.lock().iter().cloned().collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return all stored records.
    pub fn drain(&self) -> Vec<Value> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Value>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl LogSink for MemorySink {
    fn emit(&self, _status: StatusCode, record: Value) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

/// Callback function type for [`CallbackSink`].
pub type LogCallback = Arc<dyn Fn(StatusCode, &Value) + Send + Sync>;

/// Hands each record to a closure.
#[derive(Clone)]
pub struct CallbackSink {
    callback: LogCallback,
}

impl CallbackSink {
    /// Wrap a closure.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(StatusCode, &Value) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl std::fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

impl LogSink for CallbackSink {
    fn emit(&self, status: StatusCode, record: Value) {
        (self.callback)(status, &record);
    }
}
