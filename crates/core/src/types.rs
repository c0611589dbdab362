use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider handed to the sink when a tracker has no `provider` configured.
pub const DEFAULT_PROVIDER: &str = "AWSPinpoint";

/// Record name emitted when a session begins or the page returns to the foreground.
pub const SESSION_START: &str = "_session_start";

/// Record name emitted when the page is hidden.
pub const SESSION_STOP: &str = "_session_stop";

/// An analytics record produced by a tracker and handed to a [`crate::RecordSink`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl Record {
    /// A record with a name and no attributes.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn session_start() -> Self {
        Self::named(SESSION_START)
    }

    pub fn session_stop() -> Self {
        Self::named(SESSION_STOP)
    }
}
