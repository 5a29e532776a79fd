// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::adk::agent::Agent;
use crate::adk::error::ConfigError;

pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_LOOP_ITERATIONS: u32 = 5;

/// Fixed multi-agent collaboration topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum WorkflowPattern {
    Sequential,
    Parallel,
    Routing,
    Loop,
}

impl WorkflowPattern {
    /// Parse a pattern code, ignoring case
    pub fn from_code(code: &str) -> Result<Self, ConfigError> {
        match code.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "routing" => Ok(Self::Routing),
            "loop" => Ok(Self::Loop),
            _ => Err(ConfigError::UnknownPattern(code.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Routing => "routing",
            Self::Loop => "loop",
        }
    }
}

impl fmt::Display for WorkflowPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for WorkflowPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

impl TryFrom<String> for WorkflowPattern {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_code(&value)
    }
}

/// One agent taking part in a pattern
#[derive(Clone)]
pub struct AgentSlot {
    pub name: String,
    pub description: String,
    pub agent: Arc<dyn Agent>,
    pub enabled: bool,
    pub timeout: Duration,
}

impl AgentSlot {
    /// Slot named and described after the agent itself
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            name: agent.name().to_string(),
            description: agent.description().to_string(),
            agent,
            enabled: true,
            timeout: DEFAULT_AGENT_TIMEOUT,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for AgentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSlot")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Runtime configuration of a pattern run.
///
/// Built with the fluent setters below or by
/// [`AgentFactory::build_pattern`](crate::ensemble::workflow::agent_factory::AgentFactory::build_pattern)
/// from a declarative definition.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    pub pattern: Option<WorkflowPattern>,
    pub name: String,
    pub agents: Vec<AgentSlot>,
    /// Sequential: feed each agent the previous agent's output
    pub chain_output: bool,
    /// Parallel: agent that merges the contributions
    pub merge_agent: Option<AgentSlot>,
    pub merge_prompt: Option<String>,
    /// Routing: agent that picks the target agent(s)
    pub routing_agent: Option<AgentSlot>,
    pub routing_prompt: Option<String>,
    pub multi_routing: bool,
    /// Loop: round cap and the agent answering DONE or CONTINUE
    pub max_loop_iterations: u32,
    pub loop_termination_agent: Option<AgentSlot>,
    pub loop_termination_prompt: Option<String>,
    pub global_timeout: Duration,
    pub verbose_logging: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            pattern: None,
            name: String::new(),
            agents: Vec::new(),
            chain_output: true,
            merge_agent: None,
            merge_prompt: None,
            routing_agent: None,
            routing_prompt: None,
            multi_routing: false,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            loop_termination_agent: None,
            loop_termination_prompt: None,
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
            verbose_logging: false,
        }
    }
}

impl PatternConfig {
    pub fn new(pattern: WorkflowPattern) -> Self {
        Self {
            pattern: Some(pattern),
            name: pattern.code().to_string(),
            ..Default::default()
        }
    }

    pub fn agent(mut self, slot: AgentSlot) -> Self {
        self.agents.push(slot);
        self
    }

    pub fn chain_output(mut self, chain: bool) -> Self {
        self.chain_output = chain;
        self
    }

    pub fn merge_with(mut self, agent: AgentSlot, prompt: Option<String>) -> Self {
        self.merge_agent = Some(agent);
        self.merge_prompt = prompt;
        self
    }

    pub fn route_with(mut self, agent: AgentSlot, prompt: Option<String>) -> Self {
        self.routing_agent = Some(agent);
        self.routing_prompt = prompt;
        self
    }

    pub fn multi_routing(mut self, multi: bool) -> Self {
        self.multi_routing = multi;
        self
    }

    pub fn loop_until(mut self, agent: AgentSlot, prompt: Option<String>, max: u32) -> Self {
        self.loop_termination_agent = Some(agent);
        self.loop_termination_prompt = prompt;
        self.max_loop_iterations = max;
        self
    }

    pub fn global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentSlot> {
        self.agents.iter().filter(|a| a.enabled)
    }

    /// Fail-fast structural checks, run before any agent is invoked
    pub fn validate(&self) -> Result<WorkflowPattern, ConfigError> {
        let pattern = self.pattern.ok_or(ConfigError::MissingPattern)?;
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        match pattern {
            WorkflowPattern::Routing if self.routing_agent.is_none() => {
                Err(ConfigError::MissingRoutingAgent)
            }
            WorkflowPattern::Loop if self.loop_termination_agent.is_none() => {
                Err(ConfigError::MissingLoopTermination)
            }
            _ => Ok(pattern),
        }
    }
}
