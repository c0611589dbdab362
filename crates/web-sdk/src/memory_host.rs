//! In-memory host: a small node tree with attribute-presence selectors,
//! bubbling delegated dispatch, and a document visibility flag.
//!
//! Callbacks are always invoked after the host lock has been released, so a
//! callback may freely reconfigure a tracker bound to the same host.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use autotrack_core::{TrackerError, TrackerResult};

use crate::host::{
    DelegateCallback, DelegationHandle, DelegationHost, DocumentHost, DomEvent, Element, Listener,
};

/// Index of a node in a [`MemoryHost`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
struct Node {
    local_name: String,
    id: String,
    attributes: HashMap<String, String>,
    parent: Option<NodeId>,
}

/// Attribute-presence selector, `[data-foo]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    attribute: String,
}

impl Selector {
    pub fn parse(raw: &str) -> TrackerResult<Self> {
        let attribute = raw
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .map(str::trim)
            .filter(|attr| !attr.is_empty() && !attr.contains(['[', ']', '=', ' ']))
            .ok_or_else(|| TrackerError::Selector(raw.to_string()))?;
        Ok(Self {
            attribute: attribute.to_string(),
        })
    }

    fn matches(&self, node: &Node) -> bool {
        node.attributes.contains_key(&self.attribute)
    }
}

struct Delegation {
    handle: DelegationHandle,
    selector: Selector,
    event_type: String,
    callback: DelegateCallback,
}

struct HostState {
    global_listeners: bool,
    document_listeners: bool,
    visibility: Option<(String, String)>,
    hidden: bool,
    nodes: Vec<Node>,
    listeners: Vec<(String, Listener)>,
    delegations: Vec<Delegation>,
    next_handle: u64,
}

/// Host double used by tests and the replay tool.
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// A fully capable host exposing the unprefixed `hidden` /
    /// `visibilitychange` pair, with a single `html` root node.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                global_listeners: true,
                document_listeners: true,
                visibility: Some(("hidden".to_string(), "visibilitychange".to_string())),
                hidden: false,
                nodes: vec![Node {
                    local_name: "html".to_string(),
                    id: String::new(),
                    attributes: HashMap::new(),
                    parent: None,
                }],
                listeners: Vec::new(),
                delegations: Vec::new(),
                next_handle: 1,
            }),
        }
    }

    /// Expose visibility under a vendor-specific property and event name.
    pub fn with_visibility_api(self, property: &str, event: &str) -> Self {
        self.state.lock().visibility = Some((property.to_string(), event.to_string()));
        self
    }

    /// Drop every visibility property.
    pub fn without_visibility_api(self) -> Self {
        self.state.lock().visibility = None;
        self
    }

    /// Remove the global and document listener registration functions.
    pub fn without_listeners(self) -> Self {
        {
            let mut state = self.state.lock();
            state.global_listeners = false;
            state.document_listeners = false;
        }
        self
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child element and return its id.
    pub fn append(&self, parent: NodeId, local_name: &str, id: &str) -> TrackerResult<NodeId> {
        let mut state = self.state.lock();
        if parent.0 >= state.nodes.len() {
            return Err(TrackerError::UnknownNode(parent.0));
        }
        state.nodes.push(Node {
            local_name: local_name.to_string(),
            id: id.to_string(),
            attributes: HashMap::new(),
            parent: Some(parent),
        });
        Ok(NodeId(state.nodes.len() - 1))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> TrackerResult<()> {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(node.0)
            .ok_or(TrackerError::UnknownNode(node.0))?;
        node.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Dispatch a bubbling event at `target`. Each delegation fires at most
    /// once, with the closest matching ancestor-or-self. Returns the number
    /// of callbacks invoked.
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> TrackerResult<usize> {
        let pending = {
            let state = self.state.lock();
            let origin = state
                .nodes
                .get(target.0)
                .ok_or(TrackerError::UnknownNode(target.0))?;
            let event = DomEvent::new(event_type, origin.local_name.clone(), origin.id.clone());

            let mut pending = Vec::new();
            for delegation in state.delegations.iter().filter(|d| d.event_type == event_type) {
                let mut cursor = Some(target);
                while let Some(id) = cursor {
                    let node = &state.nodes[id.0];
                    if delegation.selector.matches(node) {
                        pending.push((delegation.callback.clone(), node.attributes.clone()));
                        break;
                    }
                    cursor = node.parent;
                }
            }
            (event, pending)
        };

        let (event, pending) = pending;
        for (callback, element) in &pending {
            callback(&event, element as &dyn Element);
        }
        debug!(event_type, invoked = pending.len(), "dispatched host event");
        Ok(pending.len())
    }

    /// Set the hidden flag and fire the matching visibility-change event.
    /// Returns the number of listeners invoked; zero when the host has no
    /// visibility API.
    pub fn set_hidden(&self, hidden: bool) -> usize {
        let event = {
            let mut state = self.state.lock();
            state.hidden = hidden;
            match &state.visibility {
                Some((_, event)) => event.clone(),
                None => return 0,
            }
        };
        self.fire(&event)
    }

    /// Invoke every document listener registered for `event`.
    pub fn fire(&self, event: &str) -> usize {
        let listeners: Vec<Listener> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of document listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    /// Number of live delegations for `event_type`.
    pub fn delegation_count(&self, event_type: &str) -> usize {
        self.state
            .lock()
            .delegations
            .iter()
            .filter(|d| d.event_type == event_type)
            .count()
    }
}

impl DocumentHost for MemoryHost {
    fn has_document_listeners(&self) -> bool {
        self.state.lock().document_listeners
    }

    fn has_property(&self, property: &str) -> bool {
        matches!(&self.state.lock().visibility, Some((name, _)) if name == property)
    }

    fn flag(&self, property: &str) -> bool {
        let state = self.state.lock();
        matches!(&state.visibility, Some((name, _)) if name == property) && state.hidden
    }

    fn add_event_listener(&self, event: &str, listener: &Listener) {
        let mut state = self.state.lock();
        // Same semantics as the DOM: re-adding an identical listener is ignored.
        if state
            .listeners
            .iter()
            .any(|(name, l)| name == event && Arc::ptr_eq(l, listener))
        {
            return;
        }
        state.listeners.push((event.to_string(), listener.clone()));
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) {
        self.state
            .lock()
            .listeners
            .retain(|(name, l)| !(name == event && Arc::ptr_eq(l, listener)));
    }
}

impl DelegationHost for MemoryHost {
    fn has_global_listeners(&self) -> bool {
        self.state.lock().global_listeners
    }

    fn delegate(
        &self,
        selector: &str,
        event_type: &str,
        callback: DelegateCallback,
    ) -> TrackerResult<DelegationHandle> {
        let selector = Selector::parse(selector)?;
        let mut state = self.state.lock();
        let handle = DelegationHandle(state.next_handle);
        state.next_handle += 1;
        state.delegations.push(Delegation {
            handle,
            selector,
            event_type: event_type.to_string(),
            callback,
        });
        Ok(handle)
    }

    fn undelegate(&self, handle: DelegationHandle) {
        self.state.lock().delegations.retain(|d| d.handle != handle);
    }
}
