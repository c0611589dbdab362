//! Session tracker: `_session_start` when tracking is enabled and whenever
//! the page returns to the foreground, `_session_stop` when it is hidden.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use autotrack_core::{Record, RecordSink, SessionConfig, SessionOptions};

use crate::emit::Emitter;
use crate::host::{DocumentHost, Listener};

/// A hidden-state property and the event fired when it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityApi {
    pub hidden_property: &'static str,
    pub change_event: &'static str,
}

/// Candidates checked in order; the first property the document defines wins.
pub const VISIBILITY_APIS: &[VisibilityApi] = &[
    VisibilityApi {
        hidden_property: "hidden",
        change_event: "visibilitychange",
    },
    VisibilityApi {
        hidden_property: "msHidden",
        change_event: "msvisibilitychange",
    },
    VisibilityApi {
        hidden_property: "webkitHidden",
        change_event: "webkitvisibilitychange",
    },
];

/// Resolve the visibility API exposed by `document`, if any.
pub fn detect_visibility_api(document: &dyn DocumentHost) -> Option<VisibilityApi> {
    if !document.has_document_listeners() {
        return None;
    }
    VISIBILITY_APIS
        .iter()
        .copied()
        .find(|api| document.has_property(api.hidden_property))
}

struct SessionState {
    config: SessionConfig,
    enabled: bool,
    api: Option<VisibilityApi>,
}

struct Shared {
    emitter: Emitter,
    document: Arc<dyn DocumentHost>,
    state: Mutex<SessionState>,
}

/// Emits session start/stop records from document visibility changes.
pub struct SessionTracker {
    shared: Arc<Shared>,
    listener: Listener,
}

impl SessionTracker {
    pub fn new(
        sink: Arc<dyn RecordSink>,
        document: Arc<dyn DocumentHost>,
        opts: SessionOptions,
    ) -> Self {
        let mut config = SessionConfig::default();
        config.apply(opts);

        let shared = Arc::new(Shared {
            emitter: Emitter::new(sink),
            document,
            state: Mutex::new(SessionState {
                config,
                enabled: false,
                api: None,
            }),
        });

        let weak = Arc::downgrade(&shared);
        let listener: Listener = Arc::new(move |_event: &str| {
            if let Some(shared) = weak.upgrade() {
                shared.on_visibility_change();
            }
        });

        let tracker = Self { shared, listener };
        tracker.configure(SessionOptions::default());
        tracker
    }

    /// Merge `opts` into the configuration and subscribe or unsubscribe the
    /// visibility listener. Enabling emits `_session_start` before the
    /// listener is registered. Returns `None` when the document has no usable
    /// visibility API.
    pub fn configure(&self, opts: SessionOptions) -> Option<SessionConfig> {
        let document = &self.shared.document;
        let Some(api) = detect_visibility_api(document.as_ref()) else {
            debug!("not in the supported web environment");
            return None;
        };

        let (start, merged) = {
            let mut state = self.shared.state.lock();
            state.config.apply(opts);
            state.api = Some(api);

            if state.config.enable && !state.enabled {
                state.enabled = true;
                let record = session_record(Record::session_start(), &state.config);
                (Some((record, state.config.provider().to_string())), state.config.clone())
            } else {
                if !state.config.enable {
                    // Unconditional: removing an unregistered listener is a no-op.
                    document.remove_event_listener(api.change_event, &self.listener);
                    if state.enabled {
                        info!("session tracking disabled");
                    }
                    state.enabled = false;
                }
                (None, state.config.clone())
            }
        };

        if let Some((record, provider)) = start {
            self.shared.emitter.emit(record, &provider, "record session start event");
            // The sink may have disabled tracking re-entrantly.
            if self.shared.state.lock().enabled {
                document.add_event_listener(api.change_event, &self.listener);
                info!(event = api.change_event, "session tracking enabled");
            }
        }

        Some(merged)
    }

    pub fn config(&self) -> SessionConfig {
        self.shared.state.lock().config.clone()
    }

    /// Whether the visibility listener is currently subscribed.
    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// Handle a visibility change. This is the listener the tracker registers.
    pub fn on_visibility_change(&self) {
        self.shared.on_visibility_change();
    }
}

impl Shared {
    fn on_visibility_change(&self) {
        let (api, record_start, record_stop, provider) = {
            let state = self.state.lock();
            let Some(api) = state.api else {
                return;
            };
            (
                api,
                session_record(Record::session_start(), &state.config),
                session_record(Record::session_stop(), &state.config),
                state.config.provider().to_string(),
            )
        };

        if self.document.flag(api.hidden_property) {
            self.emitter.emit(record_stop, &provider, "record session stop event");
        } else {
            self.emitter.emit(record_start, &provider, "record session start event");
        }
    }
}

fn session_record(record: Record, config: &SessionConfig) -> Record {
    match &config.attributes {
        Some(attributes) => record.with_attributes(attributes.clone()),
        None => record,
    }
}
