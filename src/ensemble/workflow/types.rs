// SPDX-License-Identifier: MIT

//! Declarative engine, agent, pattern and supervisor definitions
//!
//! These are the shapes read from YAML or JSON configuration files. Graph
//! definitions live in [`graph::config`](super::graph::config).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::pattern::WorkflowPattern;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Top-level engine configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EngineConfig {
    /// Agent runtimes by name
    #[serde(default)]
    pub runtimes: HashMap<String, RuntimeDefinition>,
    /// Runtime used when an agent or graph names none
    #[serde(default)]
    pub default_runtime: Option<String>,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub cache_capacity_hint: Option<usize>,
}

/// A process speaking the runtime JSON-lines protocol
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuntimeDefinition {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// MCP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Agent definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "instructions")]
    pub instruction: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Runtime name; the engine default when absent
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// An agent taking part in a pattern, resolved from the catalog
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PatternAgentDefinition {
    pub name: String,
    /// Catalog entry to use; defaults to `name`
    #[serde(default, rename = "ref")]
    pub agent_ref: Option<String>,
    /// Overrides the catalog description
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl PatternAgentDefinition {
    pub fn catalog_name(&self) -> &str {
        self.agent_ref.as_deref().unwrap_or(&self.name)
    }
}

/// Sequential, parallel, routing or loop pattern
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PatternDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pattern: Option<WorkflowPattern>,
    #[serde(default)]
    pub agents: Vec<PatternAgentDefinition>,
    #[serde(default = "default_true")]
    pub chain_output: bool,
    #[serde(default)]
    pub merge_agent: Option<String>,
    #[serde(default)]
    pub merge_prompt: Option<String>,
    #[serde(default)]
    pub routing_agent: Option<String>,
    #[serde(default)]
    pub routing_prompt: Option<String>,
    #[serde(default)]
    pub multi_routing: bool,
    #[serde(default)]
    pub max_loop_iterations: Option<u32>,
    #[serde(default)]
    pub loop_termination_agent: Option<String>,
    #[serde(default)]
    pub loop_termination_prompt: Option<String>,
    #[serde(default)]
    pub global_timeout_ms: Option<u64>,
    #[serde(default)]
    pub verbose_logging: bool,
}

/// A supervisor and its workers
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SupervisorDefinition {
    #[serde(default = "default_supervisor_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
    /// Extra non-agent tools
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Worker configuration - either a catalog reference or an inline definition
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum WorkerConfig {
    Reference {
        #[serde(rename = "ref")]
        agent_ref: String,
    },
    Inline(Box<AgentDefinition>),
}

fn default_true() -> bool {
    true
}

fn default_supervisor_name() -> String {
    super::supervisor::DEFAULT_SUPERVISOR_NAME.to_string()
}
