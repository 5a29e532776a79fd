// SPDX-License-Identifier: MIT

//! Node executors: turning a `NodeConfig` into something runnable
//!
//! Each node type is an executor registered under a tag. At compile time
//! the executor validates the node's params and produces a [`NodeAction`];
//! at run time the action reads a state snapshot and returns the writes it
//! wants applied.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::config::NodeConfig;
use super::nodes::{ConditionNodeExecutor, LlmNodeExecutor, ToolNodeExecutor, TransformNodeExecutor};
use crate::adk::error::{ConfigError, EnsembleError};
use crate::adk::runtime::AgentRuntime;
use crate::ensemble::workflow::registry::ToolRegistry;
use crate::ensemble::workflow::state::{StateSnapshot, StateUpdate};

/// Written by every built-in node for progress tracking
pub const CURRENT_NODE_KEY: &str = "current_node";
/// Holds the last failure message of a run
pub const ERROR_KEY: &str = "error_message";

/// Collaborators available while compiling nodes
#[derive(Clone)]
pub struct CompileContext {
    pub runtime: Arc<dyn AgentRuntime>,
    pub tools: ToolRegistry,
}

#[async_trait]
pub trait NodeAction: Send + Sync {
    async fn run(&self, state: StateSnapshot) -> Result<StateUpdate, EnsembleError>;
}

#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Canonical tag, e.g. `LLM_NODE`
    fn node_type(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the node's params
    fn config_schema(&self) -> Value;

    async fn create(
        &self,
        node: &NodeConfig,
        ctx: &CompileContext,
    ) -> Result<Arc<dyn NodeAction>, ConfigError>;
}

/// Executors by canonical tag
#[derive(Clone, Default)]
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in node types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LlmNodeExecutor));
        registry.register(Arc::new(ConditionNodeExecutor));
        registry.register(Arc::new(TransformNodeExecutor));
        registry.register(Arc::new(ToolNodeExecutor));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        self.executors
            .insert(normalize_node_type(executor.node_type()), executor);
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&normalize_node_type(node_type)).cloned()
    }

    /// Tag to description, sorted by tag
    pub fn available_types(&self) -> BTreeMap<String, String> {
        self.executors
            .iter()
            .map(|(tag, e)| (tag.clone(), e.description().to_string()))
            .collect()
    }

    pub fn config_schema(&self, node_type: &str) -> Option<Value> {
        self.get(node_type).map(|e| e.config_schema())
    }
}

/// Canonical form of a node type tag.
///
/// `LlmNode`, `llm_node` and `LlmNodeExecutor` all become `LLM_NODE`.
pub fn normalize_node_type(tag: &str) -> String {
    let trimmed = tag.trim();
    let base = trimmed
        .strip_suffix("Executor")
        .or_else(|| trimmed.strip_suffix("_EXECUTOR"))
        .unwrap_or(trimmed);

    let mut out = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for c in base.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_uppercase());
    }
    out.replace('-', "_")
}

/// Deserialize a node's params, mapping failures to a config error
pub(crate) fn parse_params<T: DeserializeOwned>(node: &NodeConfig) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(node.params.clone())).map_err(|e| invalid(node, e))
}

pub(crate) fn invalid(node: &NodeConfig, message: impl ToString) -> ConfigError {
    ConfigError::InvalidNodeParams {
        node: node.id.clone(),
        message: message.to_string(),
    }
}

pub(crate) fn schema_of<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_node_type() {
        assert_eq!(normalize_node_type("LLM_NODE"), "LLM_NODE");
        assert_eq!(normalize_node_type("llm_node"), "LLM_NODE");
        assert_eq!(normalize_node_type("LlmNode"), "LLM_NODE");
        assert_eq!(normalize_node_type("LlmNodeExecutor"), "LLM_NODE");
        assert_eq!(normalize_node_type("TransformNode"), "TRANSFORM_NODE");
        assert_eq!(normalize_node_type(" condition-node "), "CONDITION_NODE");
    }

    #[test]
    fn test_default_registry() {
        let registry = NodeExecutorRegistry::with_defaults();
        let types = registry.available_types();

        assert_eq!(
            types.keys().cloned().collect::<Vec<_>>(),
            vec!["CONDITION_NODE", "LLM_NODE", "TOOL_NODE", "TRANSFORM_NODE"]
        );
        assert!(registry.get("ConditionNode").is_some());
        assert!(registry.get("VECTOR_NODE").is_none());
    }

    #[test]
    fn test_config_schema_lists_params() {
        let registry = NodeExecutorRegistry::with_defaults();
        let schema = registry.config_schema("LLM_NODE").unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("output_key").is_some());
        assert!(properties.get("system_prompt").is_some());
    }
}
