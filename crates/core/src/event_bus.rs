//! Record sink contract: the asynchronous emission function trackers drive.
//!
//! Trackers accept an `Arc<dyn RecordSink>` and never await the returned
//! future themselves; delivery, batching and retry belong to the sink.

use crate::error::SinkError;
use crate::types::Record;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Deferred outcome of a single `record` call.
pub type SinkFuture = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'static>>;

/// Accepts a record for a named provider. Must not panic; failures are
/// reported through the returned future.
pub trait RecordSink: Send + Sync {
    fn record(&self, record: Record, provider: &str) -> SinkFuture;
}

/// No-op sink for trackers that should run without a destination.
pub struct NoOpSink;

impl RecordSink for NoOpSink {
    fn record(&self, _record: Record, _provider: &str) -> SinkFuture {
        Box::pin(async { Ok(()) })
    }
}

/// In-memory sink that captures every call, for tests and the replay tool.
///
/// The record is captured synchronously when `record` is invoked; the
/// returned future only carries the configured outcome.
#[derive(Default)]
pub struct CaptureSink {
    calls: Mutex<Vec<(Record, String)>>,
    reject_with: Mutex<Option<String>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call resolve to [`SinkError::Rejected`].
    pub fn reject_all(&self, reason: impl Into<String>) {
        *self.reject_with.lock() = Some(reason.into());
    }

    pub fn accept_all(&self) {
        *self.reject_with.lock() = None;
    }

    /// All `(record, provider)` pairs seen so far.
    pub fn calls(&self) -> Vec<(Record, String)> {
        self.calls.lock().clone()
    }

    pub fn records(&self) -> Vec<Record> {
        self.calls.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(r, _)| r.name.as_deref() == Some(name))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl RecordSink for CaptureSink {
    fn record(&self, record: Record, provider: &str) -> SinkFuture {
        self.calls.lock().push((record, provider.to_string()));
        let outcome = match self.reject_with.lock().clone() {
            Some(reason) => Err(SinkError::Rejected {
                provider: provider.to_string(),
                reason,
            }),
            None => Ok(()),
        };
        Box::pin(async move { outcome })
    }
}

pub fn noop_sink() -> Arc<dyn RecordSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_PROVIDER, SESSION_START};

    #[tokio::test]
    async fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.record(Record::session_start(), DEFAULT_PROVIDER)
            .await
            .unwrap();
        sink.record(Record::session_stop(), "myProvider").await.unwrap();

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_named(SESSION_START), 1);
        let calls = sink.calls();
        assert_eq!(calls[0].1, DEFAULT_PROVIDER);
        assert_eq!(calls[1].1, "myProvider");
    }

    #[tokio::test]
    async fn test_capture_sink_rejection_still_captures() {
        let sink = capture_sink();
        sink.reject_all("quota exceeded");

        let err = sink
            .record(Record::session_start(), DEFAULT_PROVIDER)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SinkError::Rejected {
                provider: DEFAULT_PROVIDER.into(),
                reason: "quota exceeded".into(),
            }
        );
        assert_eq!(sink.count(), 1);

        sink.accept_all();
        assert!(sink.record(Record::session_stop(), "p").await.is_ok());
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = noop_sink();
        assert!(sink.record(Record::default(), DEFAULT_PROVIDER).await.is_ok());
    }
}
