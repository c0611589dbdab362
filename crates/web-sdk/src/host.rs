//! Host capability surface consumed by the trackers.
//!
//! A browser binding, a test double, or [`crate::MemoryHost`] implements
//! these traits; the trackers never touch global state directly.

use std::collections::HashMap;
use std::sync::Arc;

use autotrack_core::TrackerResult;
use serde::{Deserialize, Serialize};

/// Document-level listener, invoked with the name of the event that fired.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Delegated callback, invoked with the originating event and the element
/// that matched the delegation selector.
pub type DelegateCallback = Arc<dyn Fn(&DomEvent, &dyn Element) + Send + Sync>;

/// Node an event originated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTarget {
    pub local_name: String,
    pub id: String,
}

/// A bubbling DOM event as seen by delegated callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub target: EventTarget,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>, local_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target: EventTarget {
                local_name: local_name.into(),
                id: id.into(),
            },
        }
    }
}

/// Read access to a matched element's attributes.
pub trait Element {
    fn get_attribute(&self, name: &str) -> Option<String>;
}

impl Element for HashMap<String, String> {
    fn get_attribute(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Registration returned by [`DelegationHost::delegate`], used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegationHandle(pub u64);

/// Document-level event registration and visibility properties.
pub trait DocumentHost: Send + Sync {
    /// Whether `add_event_listener`/`remove_event_listener` are available.
    fn has_document_listeners(&self) -> bool;

    /// Whether the document defines `property` at all, regardless of value.
    fn has_property(&self, property: &str) -> bool;

    /// Current boolean value of `property`; undefined reads as `false`.
    fn flag(&self, property: &str) -> bool;

    fn add_event_listener(&self, event: &str, listener: &Listener);

    /// Remove a listener previously added with the same `Arc`. Removing a
    /// listener that is not registered is a no-op.
    fn remove_event_listener(&self, event: &str, listener: &Listener);
}

/// Selector-based event delegation rooted at the document.
pub trait DelegationHost: Send + Sync {
    /// Whether the host exposes a global listener-registration function.
    fn has_global_listeners(&self) -> bool;

    /// Invoke `callback` for each `event_type` event bubbling through the
    /// root whose target (or an ancestor) matches `selector`. Must not call
    /// `callback` synchronously.
    fn delegate(
        &self,
        selector: &str,
        event_type: &str,
        callback: DelegateCallback,
    ) -> TrackerResult<DelegationHandle>;

    /// Remove a delegation. Unknown handles are ignored.
    fn undelegate(&self, handle: DelegationHandle);
}
