use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::TrackerResult;

/// Root configuration for both trackers. Loaded from an optional TOML file
/// and environment variables with the prefix `AUTOTRACK__`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutotrackConfig {
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Interaction tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_events")]
    pub events: Vec<String>,
    #[serde(default = "default_selector_prefix")]
    pub selector_prefix: String,
    /// Static attributes added to every interaction record.
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
}

/// Session tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub provider: Option<String>,
    /// Static attributes added to every session record.
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
}

/// Partial update accepted by `InteractionTracker::configure`. Absent fields
/// keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionOptions {
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub selector_prefix: Option<String>,
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
}

/// Partial update accepted by `SessionTracker::configure`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
}

fn default_events() -> Vec<String> {
    vec!["click".to_string()]
}
fn default_selector_prefix() -> String {
    "data-amplify-analytics-".to_string()
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            enable: false,
            provider: None,
            events: default_events(),
            selector_prefix: default_selector_prefix(),
            attributes: None,
        }
    }
}

impl InteractionConfig {
    /// Merge the fields present in `opts` onto this configuration.
    pub fn apply(&mut self, opts: InteractionOptions) {
        if let Some(enable) = opts.enable {
            self.enable = enable;
        }
        if let Some(provider) = opts.provider {
            self.provider = Some(provider);
        }
        if let Some(events) = opts.events {
            self.events = events;
        }
        if let Some(prefix) = opts.selector_prefix {
            self.selector_prefix = prefix;
        }
        if let Some(attributes) = opts.attributes {
            self.attributes = Some(attributes);
        }
    }

    /// Provider name passed to the sink.
    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(crate::DEFAULT_PROVIDER)
    }
}

impl SessionConfig {
    /// Merge the fields present in `opts` onto this configuration.
    pub fn apply(&mut self, opts: SessionOptions) {
        if let Some(enable) = opts.enable {
            self.enable = enable;
        }
        if let Some(provider) = opts.provider {
            self.provider = Some(provider);
        }
        if let Some(attributes) = opts.attributes {
            self.attributes = Some(attributes);
        }
    }

    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(crate::DEFAULT_PROVIDER)
    }
}

impl InteractionOptions {
    pub fn enable(enable: bool) -> Self {
        Self {
            enable: Some(enable),
            ..Default::default()
        }
    }
}

impl SessionOptions {
    pub fn enable(enable: bool) -> Self {
        Self {
            enable: Some(enable),
            ..Default::default()
        }
    }
}

impl From<InteractionConfig> for InteractionOptions {
    fn from(config: InteractionConfig) -> Self {
        Self {
            enable: Some(config.enable),
            provider: config.provider,
            events: Some(config.events),
            selector_prefix: Some(config.selector_prefix),
            attributes: config.attributes,
        }
    }
}

impl From<SessionConfig> for SessionOptions {
    fn from(config: SessionConfig) -> Self {
        Self {
            enable: Some(config.enable),
            provider: config.provider,
            attributes: config.attributes,
        }
    }
}

impl AutotrackConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (`AUTOTRACK__SESSION__ENABLE=true`).
    pub fn load(path: Option<&Path>) -> TrackerResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("AUTOTRACK")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("interaction.events"),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
