//! Scenario files: a page layout plus a script of host activity to replay
//! against the trackers.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use autotrack_core::{InteractionOptions, SessionOptions};
use autotrack_web::{InteractionTracker, MemoryHost, NodeId, SessionTracker};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub host: HostSpec,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct HostSpec {
    #[serde(default = "default_true")]
    pub listeners: bool,
    /// `[hidden_property, change_event]`; `null` removes the visibility API.
    #[serde(default = "default_visibility")]
    pub visibility: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    pub key: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub local_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Dispatch { node: String, event: String },
    Hidden { value: bool },
    ConfigureInteraction { options: InteractionOptions },
    ConfigureSession { options: SessionOptions },
}

fn default_true() -> bool {
    true
}
fn default_visibility() -> Option<(String, String)> {
    Some(("hidden".to_string(), "visibilitychange".to_string()))
}

impl Default for HostSpec {
    fn default() -> Self {
        Self {
            listeners: true,
            visibility: default_visibility(),
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Build the host and lay out the page. Returns node ids by key.
    pub fn build_host(&self) -> Result<(MemoryHost, HashMap<String, NodeId>)> {
        let mut host = MemoryHost::new();
        if !self.host.listeners {
            host = host.without_listeners();
        }
        host = match &self.host.visibility {
            Some((property, event)) => host.with_visibility_api(property, event),
            None => host.without_visibility_api(),
        };

        let mut nodes: HashMap<String, NodeId> = HashMap::new();
        for spec in &self.nodes {
            let parent = match &spec.parent {
                Some(key) => *nodes
                    .get(key)
                    .with_context(|| format!("node {} references unknown parent {key}", spec.key))?,
                None => host.root(),
            };
            let id = host.append(parent, &spec.local_name, &spec.id)?;
            for (name, value) in &spec.attributes {
                host.set_attribute(id, name, value)?;
            }
            if nodes.insert(spec.key.clone(), id).is_some() {
                bail!("duplicate node key {}", spec.key);
            }
        }
        Ok((host, nodes))
    }
}

/// Apply each step in order.
pub fn replay(
    steps: &[Step],
    host: &MemoryHost,
    nodes: &HashMap<String, NodeId>,
    interaction: &InteractionTracker,
    session: &SessionTracker,
) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        tracing::debug!(index, step = ?step, "replaying step");
        match step {
            Step::Dispatch { node, event } => {
                let target = nodes
                    .get(node)
                    .with_context(|| format!("step {index}: unknown node {node}"))?;
                host.dispatch(*target, event)?;
            }
            Step::Hidden { value } => {
                host.set_hidden(*value);
            }
            Step::ConfigureInteraction { options } => {
                if interaction.configure(options.clone()).is_none() {
                    tracing::warn!(index, "interaction tracking unsupported by host");
                }
            }
            Step::ConfigureSession { options } => {
                if session.configure(options.clone()).is_none() {
                    tracing::warn!(index, "session tracking unsupported by host");
                }
            }
        }
    }
    Ok(())
}
