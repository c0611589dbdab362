//! Fire-and-forget hand-off of records to the sink.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use autotrack_core::{Record, RecordSink};

/// Hands sink futures to the runtime the tracker was built on, so host
/// callbacks may fire from any thread.
pub struct Emitter {
    sink: Arc<dyn RecordSink>,
    runtime: Option<Handle>,
}

impl Emitter {
    /// Bind to the tokio runtime of the calling thread, if there is one.
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            debug!("emitter built outside a tokio runtime; resolving per call");
        }
        Self { sink, runtime }
    }

    /// Bind to an explicit runtime.
    pub fn with_runtime(sink: Arc<dyn RecordSink>, runtime: Handle) -> Self {
        Self {
            sink,
            runtime: Some(runtime),
        }
    }

    /// Invoke the sink and attach a failure handler to its result without
    /// awaiting it. Failures are logged under `action` and never returned.
    pub fn emit(&self, record: Record, provider: &str, action: &'static str) {
        let pending = self.sink.record(record, provider);
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(action, "no async runtime; sink outcome dropped");
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = pending.await {
                debug!(error = %e, "{} failed", action);
            }
        });
    }
}
