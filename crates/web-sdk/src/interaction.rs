//! Interaction tracker: delegated listeners on `[<prefix>on]` elements that
//! turn element metadata into records.
//!
//! Element attributes read, for the default prefix `data-amplify-analytics-`:
//!
//! - `<prefix>on`: comma-separated event types the element opts into
//! - `<prefix>name`: record name
//! - `<prefix>attrs`: comma-separated `key:value` pairs

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use autotrack_core::{InteractionConfig, InteractionOptions, Record, RecordSink};

use crate::emit::Emitter;
use crate::host::{DelegateCallback, DelegationHandle, DelegationHost, DomEvent, Element};

struct InteractionState {
    config: InteractionConfig,
    enabled: bool,
    delegates: Vec<DelegationHandle>,
    /// Prefix the live delegations were registered with.
    delegated_prefix: Option<String>,
}

struct Shared {
    emitter: Emitter,
    host: Arc<dyn DelegationHost>,
    state: Mutex<InteractionState>,
}

/// Records interactions on designated elements.
pub struct InteractionTracker {
    shared: Arc<Shared>,
    callback: DelegateCallback,
}

impl InteractionTracker {
    /// Build a tracker with `opts` merged over the defaults. Delegations are
    /// only set up when the host exposes listener registration.
    pub fn new(
        sink: Arc<dyn RecordSink>,
        host: Arc<dyn DelegationHost>,
        opts: InteractionOptions,
    ) -> Self {
        let mut config = InteractionConfig::default();
        config.apply(opts);

        let shared = Arc::new(Shared {
            emitter: Emitter::new(sink),
            host,
            state: Mutex::new(InteractionState {
                config,
                enabled: false,
                delegates: Vec::new(),
                delegated_prefix: None,
            }),
        });

        let weak = Arc::downgrade(&shared);
        let callback: DelegateCallback = Arc::new(move |event: &DomEvent, element: &dyn Element| {
            if let Some(shared) = weak.upgrade() {
                shared.track(event, element);
            }
        });

        let tracker = Self { shared, callback };
        if !tracker.shared.host.has_global_listeners() {
            debug!("not in the supported web environment");
            return tracker;
        }
        tracker.configure(InteractionOptions::default());
        tracker
    }

    /// Merge `opts` into the configuration and set up or tear down
    /// delegations. Returns the merged configuration, or `None` when the host
    /// cannot register listeners and nothing was changed.
    ///
    /// Enabling is all-or-nothing: if any event type cannot be delegated, the
    /// handles already registered are released and the tracker stays
    /// disabled, so a later `configure` retries. A prefix change while
    /// enabled takes effect on the next enable.
    pub fn configure(&self, opts: InteractionOptions) -> Option<InteractionConfig> {
        let host = &self.shared.host;
        if !host.has_global_listeners() {
            debug!("not in the supported web environment");
            return None;
        }

        let mut state = self.shared.state.lock();
        state.config.apply(opts);

        if state.config.enable && !state.enabled {
            let selector = format!("[{}on]", state.config.selector_prefix);
            let mut delegates = Vec::with_capacity(state.config.events.len());
            let mut failed = false;
            for event_type in &state.config.events {
                match host.delegate(&selector, event_type, self.callback.clone()) {
                    Ok(handle) => delegates.push(handle),
                    Err(e) => {
                        warn!(error = %e, event_type = %event_type, "delegation failed");
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                for handle in delegates {
                    host.undelegate(handle);
                }
                warn!(selector = %selector, "interaction tracking not enabled");
            } else {
                info!(
                    selector = %selector,
                    events = ?state.config.events,
                    "interaction tracking enabled"
                );
                state.delegated_prefix = Some(state.config.selector_prefix.clone());
                state.delegates = delegates;
                state.enabled = true;
            }
        } else if !state.config.enable {
            for handle in std::mem::take(&mut state.delegates) {
                host.undelegate(handle);
            }
            if state.enabled {
                info!("interaction tracking disabled");
            }
            state.delegated_prefix = None;
            state.enabled = false;
        }

        Some(state.config.clone())
    }

    /// Current configuration.
    pub fn config(&self) -> InteractionConfig {
        self.shared.state.lock().config.clone()
    }

    /// Whether delegations are currently active.
    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// Handle one delegated firing. This is the callback the tracker registers.
    pub fn track(&self, event: &DomEvent, element: &dyn Element) {
        self.shared.track(event, element);
    }
}

impl Shared {
    fn track(&self, event: &DomEvent, element: &dyn Element) {
        let (record, provider) = {
            let state = self.state.lock();
            let prefix = state
                .delegated_prefix
                .as_deref()
                .unwrap_or(&state.config.selector_prefix);
            match extract_record(&state.config, prefix, event, element) {
                Some(record) => (record, state.config.provider().to_string()),
                None => return,
            }
        };
        debug!(name = ?record.name, attributes = ?record.attributes, "recording interaction");
        self.emitter.emit(record, &provider, "record interaction event");
    }
}

/// Build the record for `event` on the matched `element`, reading element
/// attributes under `prefix`, or `None` when the element does not opt into
/// this event type.
pub fn extract_record(
    config: &InteractionConfig,
    prefix: &str,
    event: &DomEvent,
    element: &dyn Element,
) -> Option<Record> {

    if let Some(on) = element.get_attribute(&format!("{prefix}on")) {
        if !split_list(&on).any(|t| t == event.event_type) {
            debug!(event_type = %event.event_type, "event is not selected to be recorded");
            return None;
        }
    }

    let mut attributes = HashMap::from([
        ("type".to_string(), event.event_type.clone()),
        (
            "target".to_string(),
            format!("{} with id {}", event.target.local_name, event.target.id),
        ),
    ]);
    if let Some(defaults) = &config.attributes {
        attributes.extend(defaults.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(raw) = element.get_attribute(&format!("{prefix}attrs")) {
        attributes.extend(parse_attributes(&raw));
    }

    Some(Record {
        name: element.get_attribute(&format!("{prefix}name")),
        attributes,
    })
}

/// Parse `"k1:v1, k2:v2"`. The value keeps everything after the first `:`;
/// entries without a `:` or with an empty key are skipped.
pub fn parse_attributes(raw: &str) -> impl Iterator<Item = (String, String)> + '_ {
    split_list(raw).filter_map(|entry| {
        let (key, value) = entry.split_once(':')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.trim().to_string()))
    })
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory_host::MemoryHost;
    use autotrack_core::event_bus::capture_sink;
    use autotrack_core::DEFAULT_PROVIDER;

    struct FakeElement;

    impl Element for FakeElement {
        fn get_attribute(&self, name: &str) -> Option<String> {
            if name.contains("on") {
                Some("click".into())
            } else if name.contains("name") {
                Some("name".into())
            } else if name.contains("attrs") {
                Some("attrs:val".into())
            } else {
                None
            }
        }
    }

    fn enabled_tracker(host: Arc<MemoryHost>) -> (InteractionTracker, Arc<autotrack_core::event_bus::CaptureSink>) {
        let sink = capture_sink();
        let tracker = InteractionTracker::new(sink.clone(), host, InteractionOptions::enable(true));
        (tracker, sink)
    }

    #[tokio::test]
    async fn test_track_happy_case() {
        let (tracker, sink) = enabled_tracker(Arc::new(MemoryHost::new()));
        let event = DomEvent::new("click", "localName", "xxxxx");

        tracker.track(&event, &FakeElement);

        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            Record {
                name: Some("name".into()),
                attributes: HashMap::from([
                    ("type".to_string(), "click".to_string()),
                    ("target".to_string(), "localName with id xxxxx".to_string()),
                    ("attrs".to_string(), "val".to_string()),
                ]),
            }
        );
        assert_eq!(calls[0].1, DEFAULT_PROVIDER);
    }

    #[tokio::test]
    async fn test_configure_happy_case() {
        let host = Arc::new(MemoryHost::new());
        let (tracker, _sink) = enabled_tracker(host.clone());

        let config = tracker
            .configure(InteractionOptions {
                enable: Some(true),
                selector_prefix: Some("prefix".into()),
                events: Some(vec!["click".into(), "mouseover".into()]),
                provider: Some("myProvider".into()),
                attributes: None,
            })
            .unwrap();

        assert_eq!(
            config,
            InteractionConfig {
                enable: true,
                provider: Some("myProvider".into()),
                events: vec!["click".into(), "mouseover".into()],
                selector_prefix: "prefix".into(),
                attributes: None,
            }
        );
        assert_eq!(config, tracker.config());
        // Already enabled: the new event list does not add delegations.
        assert_eq!(host.delegation_count("click"), 1);
        assert_eq!(host.delegation_count("mouseover"), 0);
    }

    #[tokio::test]
    async fn test_invalid_prefix_leaves_tracker_retryable() {
        let host = Arc::new(MemoryHost::new());
        let sink = capture_sink();
        let tracker = InteractionTracker::new(
            sink.clone(),
            host.clone(),
            InteractionOptions {
                enable: Some(true),
                selector_prefix: Some("data track-".into()),
                ..Default::default()
            },
        );

        assert!(!tracker.is_enabled());
        assert_eq!(host.delegation_count("click"), 0);

        tracker.configure(InteractionOptions {
            selector_prefix: Some("data-track-".into()),
            ..Default::default()
        });

        assert!(tracker.is_enabled());
        assert_eq!(host.delegation_count("click"), 1);
        let button = host.append(host.root(), "button", "buy").unwrap();
        host.set_attribute(button, "data-track-on", "click").unwrap();
        assert_eq!(host.dispatch(button, "click").unwrap(), 1);
        assert_eq!(sink.count(), 1);
    }

    /// Host that refuses delegation for one event type.
    struct RefusingHost {
        inner: MemoryHost,
        refuse: &'static str,
    }

    impl DelegationHost for RefusingHost {
        fn has_global_listeners(&self) -> bool {
            self.inner.has_global_listeners()
        }

        fn delegate(
            &self,
            selector: &str,
            event_type: &str,
            callback: DelegateCallback,
        ) -> autotrack_core::TrackerResult<DelegationHandle> {
            if event_type == self.refuse {
                return Err(autotrack_core::TrackerError::Selector(selector.to_string()));
            }
            self.inner.delegate(selector, event_type, callback)
        }

        fn undelegate(&self, handle: DelegationHandle) {
            self.inner.undelegate(handle);
        }
    }

    #[test]
    fn test_partial_delegation_is_rolled_back() {
        let host = Arc::new(RefusingHost {
            inner: MemoryHost::new(),
            refuse: "submit",
        });
        let tracker = InteractionTracker::new(
            capture_sink(),
            host.clone(),
            InteractionOptions {
                enable: Some(true),
                events: Some(vec!["click".into(), "submit".into()]),
                ..Default::default()
            },
        );

        assert!(!tracker.is_enabled());
        assert_eq!(host.inner.delegation_count("click"), 0);
        assert_eq!(host.inner.delegation_count("submit"), 0);
    }

    #[tokio::test]
    async fn test_prefix_change_while_enabled_keeps_delegated_prefix() {
        let host = Arc::new(MemoryHost::new());
        let (tracker, sink) = enabled_tracker(host.clone());
        let button = host.append(host.root(), "button", "buy").unwrap();
        host.set_attribute(button, "data-amplify-analytics-on", "click").unwrap();
        host.set_attribute(button, "data-amplify-analytics-name", "checkout").unwrap();

        tracker.configure(InteractionOptions {
            selector_prefix: Some("data-track-".into()),
            ..Default::default()
        });
        assert_eq!(host.dispatch(button, "click").unwrap(), 1);
        assert_eq!(sink.records()[0].name.as_deref(), Some("checkout"));

        // Re-enabling picks up the new prefix.
        tracker.configure(InteractionOptions::enable(false));
        tracker.configure(InteractionOptions::enable(true));
        assert_eq!(host.dispatch(button, "click").unwrap(), 0);
    }

    #[test]
    fn test_not_in_supported_env() {
        let host = Arc::new(MemoryHost::new().without_listeners());
        let (tracker, _sink) = enabled_tracker(host.clone());

        assert!(!tracker.is_enabled());
        assert_eq!(host.delegation_count("click"), 0);
        assert!(tracker.configure(InteractionOptions::enable(true)).is_none());
        assert!(!tracker.is_enabled());
        assert_eq!(host.delegation_count("click"), 0);
    }

    #[test]
    fn test_extract_skips_unselected_event() {
        let config = InteractionConfig::default();
        let element = HashMap::from([(
            "data-amplify-analytics-on".to_string(),
            "click, submit".to_string(),
        )]);

        assert!(extract_record(&config, &config.selector_prefix, &DomEvent::new("mouseover", "a", "x"), &element).is_none());
        let record = extract_record(&config, &config.selector_prefix, &DomEvent::new("submit", "form", "f"), &element).unwrap();
        assert_eq!(record.name, None);
        assert_eq!(record.attributes.len(), 2);
        assert_eq!(record.attributes["target"], "form with id f");
    }

    #[test]
    fn test_extract_merges_static_then_element_attributes() {
        let config = InteractionConfig {
            attributes: Some(HashMap::from([
                ("page".to_string(), "home".to_string()),
                ("slot".to_string(), "default".to_string()),
            ])),
            ..Default::default()
        };
        let element = HashMap::from([(
            "data-amplify-analytics-attrs".to_string(),
            "slot: hero, type:override".to_string(),
        )]);

        let record = extract_record(&config, &config.selector_prefix, &DomEvent::new("click", "button", "b"), &element).unwrap();
        assert_eq!(record.attributes["page"], "home");
        assert_eq!(record.attributes["slot"], "hero");
        // Element attributes win on collision, including the built-in keys.
        assert_eq!(record.attributes["type"], "override");
    }

    #[test]
    fn test_parse_attributes() {
        let parsed: Vec<_> = parse_attributes(" a:1 ,b : 2,, broken, :nokey, url:https://x.io ").collect();
        assert_eq!(
            parsed,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("url".to_string(), "https://x.io".to_string()),
            ]
        );
    }
}
