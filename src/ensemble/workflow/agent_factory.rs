// SPDX-License-Identifier: MIT

//! Agent factory - constructs agents, patterns and supervisors from definitions
//!
//! Runtimes come from the engine config's `runtimes` table (or are injected
//! with [`AgentFactory::with_runtime`]); tools are resolved through the
//! [`ToolRegistry`]. Pattern agents and supervisor workers referenced by name
//! are looked up in the engine's agent catalog.

use crate::adk::agent::{Agent, ConfiguredAgent};
use crate::adk::error::ConfigError;
use crate::adk::runtime::{AgentRuntime, CommandRuntime, InvocationOptions};
use crate::ensemble::workflow::pattern::{AgentSlot, PatternConfig};
use crate::ensemble::workflow::registry::ToolRegistry;
use crate::ensemble::workflow::supervisor::SupervisorTeam;
use crate::ensemble::workflow::types::{
    AgentDefinition, EngineConfig, PatternDefinition, SupervisorDefinition, WorkerConfig,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Factory for creating agents and agent compositions from definitions
pub struct AgentFactory<'a> {
    config: &'a EngineConfig,
    registry: &'a ToolRegistry,
    runtimes: HashMap<String, Arc<dyn AgentRuntime>>,
}

impl<'a> AgentFactory<'a> {
    pub fn new(config: &'a EngineConfig, registry: &'a ToolRegistry) -> Self {
        let runtimes = config
            .runtimes
            .iter()
            .map(|(name, def)| {
                let mut runtime = CommandRuntime::new(name.clone(), def.command.clone(), def.args.clone())
                    .with_env(def.env.clone());
                if let Some(ms) = def.timeout_ms {
                    runtime = runtime.with_timeout(Duration::from_millis(ms));
                }
                (name.clone(), Arc::new(runtime) as Arc<dyn AgentRuntime>)
            })
            .collect();

        Self {
            config,
            registry,
            runtimes,
        }
    }

    /// Register or replace a runtime under `name`
    pub fn with_runtime(mut self, name: impl Into<String>, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.runtimes.insert(name.into(), runtime);
        self
    }

    /// Resolve a runtime by name; `None` means the engine default.
    ///
    /// With no default configured, a single declared runtime is used.
    pub fn runtime(&self, name: Option<&str>) -> Result<Arc<dyn AgentRuntime>, ConfigError> {
        let name = match name.or(self.config.default_runtime.as_deref()) {
            Some(name) => name,
            None if self.runtimes.len() == 1 => {
                return self
                    .runtimes
                    .values()
                    .next()
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownRuntime("default".to_string()));
            }
            None => return Err(ConfigError::UnknownRuntime("default".to_string())),
        };
        self.runtimes
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownRuntime(name.to_string()))
    }

    /// Catalog entry by name, case-insensitive
    pub fn definition(&self, name: &str) -> Option<&'a AgentDefinition> {
        self.config
            .agents
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Build an agent from an AgentDefinition
    pub async fn build(&self, def: &AgentDefinition) -> Result<Arc<dyn Agent>, ConfigError> {
        Ok(Arc::new(self.build_configured(def).await?))
    }

    async fn build_configured(&self, def: &AgentDefinition) -> Result<ConfiguredAgent, ConfigError> {
        let runtime = self.runtime(def.runtime.as_deref())?;
        let tools = self.registry.resolve(&def.tools).await;
        log::info!(
            "Building agent '{}' on runtime '{}' with {} tool(s)",
            def.name,
            runtime.id(),
            tools.len()
        );

        Ok(ConfiguredAgent::new(
            def.name.clone(),
            def.description.clone(),
            def.instruction.clone(),
            runtime,
            tools,
        )
        .with_options(InvocationOptions {
            temperature: def.temperature,
            max_tokens: def.max_tokens,
        }))
    }

    /// Build the catalog agent called `name`
    pub async fn build_named(&self, name: &str) -> Result<Arc<dyn Agent>, ConfigError> {
        let def = self
            .definition(name)
            .ok_or_else(|| ConfigError::UnknownAgentRef(name.to_string()))?;
        self.build(def).await
    }

    async fn slot(&self, name: &str) -> Result<AgentSlot, ConfigError> {
        Ok(AgentSlot::new(self.build_named(name).await?))
    }

    /// Turn a declarative pattern into a runnable [`PatternConfig`].
    ///
    /// Every agent reference is resolved here, so an unknown name fails
    /// before any agent runs.
    pub async fn build_pattern(&self, def: &PatternDefinition) -> Result<PatternConfig, ConfigError> {
        let mut config = PatternConfig {
            pattern: def.pattern,
            name: if def.name.is_empty() {
                def.pattern.map(|p| p.code().to_string()).unwrap_or_default()
            } else {
                def.name.clone()
            },
            chain_output: def.chain_output,
            merge_prompt: def.merge_prompt.clone(),
            routing_prompt: def.routing_prompt.clone(),
            multi_routing: def.multi_routing,
            loop_termination_prompt: def.loop_termination_prompt.clone(),
            verbose_logging: def.verbose_logging,
            ..Default::default()
        };
        if let Some(max) = def.max_loop_iterations {
            config.max_loop_iterations = max;
        }
        if let Some(ms) = def.global_timeout_ms {
            config.global_timeout = Duration::from_millis(ms);
        }

        for agent_def in &def.agents {
            let mut slot = self.slot(agent_def.catalog_name()).await?;
            slot.name = agent_def.name.clone();
            if let Some(description) = &agent_def.description {
                slot = slot.with_description(description.clone());
            }
            if let Some(ms) = agent_def.timeout_ms {
                slot = slot.with_timeout(Duration::from_millis(ms));
            }
            if !agent_def.enabled {
                slot = slot.disabled();
            }
            config.agents.push(slot);
        }

        if let Some(name) = &def.merge_agent {
            config.merge_agent = Some(self.slot(name).await?);
        }
        if let Some(name) = &def.routing_agent {
            config.routing_agent = Some(self.slot(name).await?);
        }
        if let Some(name) = &def.loop_termination_agent {
            config.loop_termination_agent = Some(self.slot(name).await?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Build a supervisor whose tools are its workers plus any extra tools
    pub async fn build_supervisor(
        &self,
        def: &SupervisorDefinition,
    ) -> Result<ConfiguredAgent, ConfigError> {
        let mut workers = Vec::with_capacity(def.workers.len());
        for worker in &def.workers {
            let agent = match worker {
                WorkerConfig::Reference { agent_ref } => self.build_named(agent_ref).await?,
                WorkerConfig::Inline(inline) => self.build(inline).await?,
            };
            workers.push(agent);
        }

        let mut team = SupervisorTeam::builder()
            .name(def.name.clone())
            .description(def.description.clone())
            .runtime(self.runtime(def.runtime.as_deref())?)
            .workers(workers)
            .tools(self.registry.resolve(&def.tools).await)
            .options(InvocationOptions {
                temperature: def.temperature,
                max_tokens: def.max_tokens,
            });
        if let Some(instruction) = &def.instruction {
            team = team.instruction(instruction.clone());
        }
        team.build()
    }
}
