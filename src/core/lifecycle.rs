//! Container lifecycle graph
//!
//! The graph is plain data: each command verb maps to a node id and the verbs that
//! may legally follow it. A container that has never been touched sits in the
//! removed state (`rm`).
//!
//! ```yaml
//! rm:
//!   id: 0
//!   followers: [create, run]
//! create:
//!   id: 1
//!   followers: [start, rm]
//! ```

use crate::core::error::{Error, Result};
use crate::core::workload::Workload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Verb of the implicit initial state
pub const REMOVED: &str = "rm";

/// One node of the lifecycle graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleNode {
    pub id: i64,
    #[serde(default)]
    pub followers: Vec<String>,
}

/// Allowed command transitions, read-only once loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleGraph {
    nodes: HashMap<String, LifecycleNode>,
    initial: String,
}

impl LifecycleGraph {
    /// Build and validate a graph from its nodes
    pub fn new(nodes: HashMap<String, LifecycleNode>) -> Result<Self> {
        let graph = Self {
            nodes,
            initial: REMOVED.to_string(),
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Parse a YAML document mapping verbs to `{id, followers}`
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let nodes: HashMap<String, LifecycleNode> = serde_yaml::from_str(content)?;
        Self::new(nodes)
    }

    /// Load the graph from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::LifecycleGraph(format!("cannot read {}: {e}", path.display()))
        })?;
        let graph = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), nodes = graph.nodes.len(), "Loaded lifecycle graph");
        Ok(graph)
    }

    /// The initial node must exist. Followers may lack an entry of their own:
    /// a resource left in such a state continues from the initial node.
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.initial) {
            return Err(Error::LifecycleGraph(format!(
                "missing initial node '{}'",
                self.initial
            )));
        }
        Ok(())
    }

    /// Whether the graph mentions `verb`, as a node or as a follower
    pub fn knows(&self, verb: &str) -> bool {
        self.nodes.contains_key(verb)
            || self
                .nodes
                .values()
                .any(|node| node.followers.iter().any(|f| f == verb))
    }

    /// Reject workloads that issue verbs the graph never mentions
    pub fn check_workload(&self, workload: &Workload) -> Result<()> {
        for verb in workload.verbs() {
            if !self.knows(verb) {
                return Err(Error::LifecycleGraph(format!(
                    "workload issues '{verb}' which the graph never mentions"
                )));
            }
        }
        Ok(())
    }

    /// The state a never-seen resource is in
    pub fn initial_state(&self) -> &str {
        &self.initial
    }

    pub fn node(&self, verb: &str) -> Option<&LifecycleNode> {
        self.nodes.get(verb)
    }

    /// Node id for a verb
    pub fn status_of(&self, verb: &str) -> Option<i64> {
        self.nodes.get(verb).map(|node| node.id)
    }

    /// Whether `command` may follow `previous`; `None` and unknown states fall
    /// back to the initial node's followers
    pub fn allowed(&self, previous: Option<&str>, command: &str) -> bool {
        let node = previous
            .and_then(|p| self.node(p))
            .or_else(|| self.node(&self.initial));
        node.map(|n| n.followers.iter().any(|f| f == command))
            .unwrap_or(false)
    }
}
