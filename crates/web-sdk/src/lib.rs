//! Browser-side automatic tracking: delegated interaction capture and
//! visibility-driven session start/stop records.
//!
//! # Modules
//!
//! - [`host`]: Host capability traits (document listeners, delegation, elements)
//! - [`memory_host`]: In-memory host with a node tree and bubbling dispatch
//! - [`interaction`]: Interaction tracker and attribute-to-record extraction
//! - [`session`]: Session tracker with vendor-prefixed visibility fallback

pub mod emit;
pub mod host;
pub mod interaction;
pub mod memory_host;
pub mod session;

pub use emit::Emitter;
pub use host::{DelegationHandle, DelegationHost, DocumentHost, DomEvent, Element, EventTarget};
pub use interaction::InteractionTracker;
pub use memory_host::{MemoryHost, NodeId};
pub use session::{SessionTracker, VisibilityApi, VISIBILITY_APIS};
