// SPDX-License-Identifier: MIT

//! Declarative graph configuration
//!
//! A `GraphConfig` is authored externally (JSON or YAML), validated once,
//! and then treated as immutable. Field names are snake_case; the camelCase
//! spellings used by stored JSON configs are accepted as aliases.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::projection::ResultProjection;
use super::router::RouterConfig;
use crate::ensemble::workflow::state::{StateKey, UnknownKeyPolicy};

/// Sentinel source of the entry edges
pub const START: &str = "START";
/// Sentinel target that terminates a run
pub const END: &str = "END";

/// A graph-based workflow definition
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GraphConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, alias = "stateKeys")]
    pub state_keys: Vec<StateKey>,
    #[serde(default, alias = "initialValues")]
    pub initial_values: Map<String, Value>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
    /// Policy for initial values naming undeclared keys
    #[serde(default, alias = "unknownInitialKeys")]
    pub unknown_initial_keys: UnknownKeyPolicy,
    /// Per-node visit cap; derived from quality gates when absent
    #[serde(default, alias = "maxNodeVisits")]
    pub max_node_visits: Option<u32>,
    /// State keys read when projecting a run into a result
    #[serde(default)]
    pub projection: ResultProjection,
}

impl GraphConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn key(mut self, key: StateKey) -> Self {
        self.state_keys.push(key);
        self
    }

    pub fn node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, edge: EdgeConfig) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn initial(mut self, key: impl Into<String>, value: Value) -> Self {
        self.initial_values.insert(key.into(), value);
        self
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A node in the workflow graph
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Unique identifier within the graph
    pub id: String,
    /// Executor tag, e.g. `LLM_NODE`
    #[serde(rename = "type", alias = "node_type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Executor-specific parameters
    #[serde(default, alias = "config")]
    pub params: Map<String, Value>,
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            description: String::new(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Edge kinds
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    #[serde(alias = "SIMPLE")]
    Simple,
    #[serde(alias = "CONDITIONAL")]
    Conditional,
}

/// A declared transition between nodes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeConfig {
    /// Source node id or START
    pub from: String,
    /// Target node id or END; required for simple edges
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: EdgeKind,
    /// Route label to target node id or END
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    /// How the route label is computed; reads `next_node` when absent
    #[serde(default)]
    pub router: Option<RouterConfig>,
}

impl EdgeConfig {
    pub fn simple(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
            kind: EdgeKind::Simple,
            routes: BTreeMap::new(),
            router: None,
        }
    }

    pub fn conditional(from: impl Into<String>, routes: &[(&str, &str)]) -> Self {
        Self {
            from: from.into(),
            to: None,
            kind: EdgeKind::Conditional,
            routes: routes
                .iter()
                .map(|(label, target)| (label.to_string(), target.to_string()))
                .collect(),
            router: None,
        }
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = Some(router);
        self
    }

    /// Short label used in error messages
    pub fn describe(&self, index: usize) -> String {
        match (&self.kind, &self.to) {
            (EdgeKind::Simple, Some(to)) => format!("edge[{}] '{}' -> '{}'", index, self.from, to),
            (EdgeKind::Simple, None) => format!("edge[{}] '{}' -> ?", index, self.from),
            (EdgeKind::Conditional, _) => format!("edge[{}] '{}' -> (conditional)", index, self.from),
        }
    }
}
