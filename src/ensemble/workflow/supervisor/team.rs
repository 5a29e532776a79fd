// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::sync::Arc;

use super::agent_tool::AgentTool;
use crate::adk::agent::{Agent, ConfiguredAgent};
use crate::adk::error::ConfigError;
use crate::adk::runtime::{AgentRuntime, InvocationOptions};
use crate::adk::tool::Tool;

pub const DEFAULT_SUPERVISOR_NAME: &str = "supervisor";

/// Assembles a supervisor agent whose tools are its workers.
///
/// The supervisor's own reasoning loop decides which workers to call and
/// how often; nothing here sequences worker calls.
pub struct SupervisorTeam {
    name: String,
    description: String,
    instruction: Option<String>,
    runtime: Option<Arc<dyn AgentRuntime>>,
    workers: Vec<Arc<dyn Agent>>,
    tools: Vec<Arc<dyn Tool>>,
    options: InvocationOptions,
}

impl SupervisorTeam {
    pub fn builder() -> Self {
        Self {
            name: DEFAULT_SUPERVISOR_NAME.to_string(),
            description: String::new(),
            instruction: None,
            runtime: None,
            workers: Vec::new(),
            tools: Vec::new(),
            options: InvocationOptions::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.name = name;
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Explicit instruction; a default one listing the workers is used otherwise
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.instruction = (!instruction.trim().is_empty()).then_some(instruction);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn worker(mut self, worker: Arc<dyn Agent>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn workers(mut self, workers: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        self.workers.extend(workers);
        self
    }

    /// Non-agent tools available next to the workers
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<ConfiguredAgent, ConfigError> {
        let runtime = self
            .runtime
            .ok_or_else(|| ConfigError::MissingRuntime(self.name.clone()))?;
        if self.workers.is_empty() {
            return Err(ConfigError::NoWorkers(self.name));
        }

        let mut seen = HashSet::new();
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for worker in &self.workers {
            let tool: Arc<dyn Tool> = Arc::new(AgentTool::new(worker.clone()));
            if seen.insert(tool.name().to_lowercase()) {
                tools.push(tool);
            } else {
                log::warn!("Supervisor {}: duplicate worker {}", self.name, tool.name());
            }
        }
        for tool in self.tools {
            if seen.insert(tool.name().to_lowercase()) {
                tools.push(tool);
            }
        }

        let instruction = self
            .instruction
            .unwrap_or_else(|| default_instruction(&self.name, &self.workers, &tools));
        let description = if self.description.is_empty() {
            format!("Supervisor coordinating {} worker(s)", self.workers.len())
        } else {
            self.description
        };

        log::info!(
            "Built supervisor {} with {} worker(s) and {} tool(s)",
            self.name,
            self.workers.len(),
            tools.len()
        );
        Ok(
            ConfiguredAgent::new(self.name, description, instruction, runtime, tools)
                .with_options(self.options),
        )
    }
}

fn default_instruction(name: &str, workers: &[Arc<dyn Agent>], tools: &[Arc<dyn Tool>]) -> String {
    let worker_names: HashSet<String> = workers.iter().map(|w| w.name().to_lowercase()).collect();
    let worker_lines = workers
        .iter()
        .map(|w| {
            let description = match w.description().trim() {
                "" => "no description",
                d => d,
            };
            format!("- {}: {}", w.name(), description)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let extra_lines = tools
        .iter()
        .filter(|t| !worker_names.contains(&t.name().to_lowercase()))
        .map(|t| format!("- {}: {}", t.name(), t.description()))
        .collect::<Vec<_>>();

    let mut instruction = format!(
        "You are {}, a supervisor coordinating a team of specialist agents.\n\n\
         Workers you can call as tools:\n{}\n",
        name, worker_lines
    );
    if !extra_lines.is_empty() {
        instruction.push_str(&format!("\nOther tools:\n{}\n", extra_lines.join("\n")));
    }
    instruction.push_str(
        "\nHow to work:\n\
         1. Analyze the user's request.\n\
         2. Decide which workers can help; you may answer directly if none are needed.\n\
         3. Call workers as needed, repeatedly if useful, passing each a clear task.\n\
         4. Synthesize their results into one final answer.",
    );
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::runtime::Invocation;
    use async_trait::async_trait;
    use serde_json::json;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Worker {
        name: &'static str,
        description: &'static str,
        calls: AtomicUsize,
    }

    impl Worker {
        fn new(name: &'static str, description: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                description,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Agent for Worker {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            self.description
        }
        async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} did {}", self.name, input))
        }
    }

    /// Calls every tool whose name appears in the input, then answers
    struct MentionRuntime;

    #[async_trait]
    impl AgentRuntime for MentionRuntime {
        fn id(&self) -> &str {
            "mention"
        }
        async fn invoke(
            &self,
            invocation: Invocation<'_>,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            let mut parts = Vec::new();
            for tool in invocation.tools {
                if invocation.input.contains(tool.name()) {
                    let out = tool.execute(json!({"input": invocation.input})).await?;
                    parts.push(out["output"].as_str().unwrap_or_default().to_string());
                }
            }
            Ok(if parts.is_empty() {
                "answered directly".to_string()
            } else {
                parts.join(" | ")
            })
        }
    }

    #[test]
    fn test_build_requires_runtime_and_workers() {
        let err = SupervisorTeam::builder()
            .worker(Worker::new("a", ""))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingRuntime(_)));

        let err = SupervisorTeam::builder()
            .runtime(Arc::new(MentionRuntime))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::NoWorkers(_)));
    }

    #[test]
    fn test_workers_become_tools() {
        let supervisor = SupervisorTeam::builder()
            .runtime(Arc::new(MentionRuntime))
            .worker(Worker::new("researcher", "Finds facts"))
            .worker(Worker::new("writer", "Writes prose"))
            .build()
            .unwrap();

        assert_eq!(supervisor.name, DEFAULT_SUPERVISOR_NAME);
        assert_eq!(supervisor.tool_names(), vec!["researcher", "writer"]);
        assert_eq!(supervisor.tools[0].description(), "Finds facts");
        assert!(supervisor.instruction.contains("- researcher: Finds facts"));
        assert!(supervisor.instruction.contains("- writer: Writes prose"));
    }

    #[tokio::test]
    async fn test_supervisor_decides_which_workers_run() {
        let researcher = Worker::new("researcher", "Finds facts");
        let writer = Worker::new("writer", "Writes prose");
        let supervisor = SupervisorTeam::builder()
            .runtime(Arc::new(MentionRuntime))
            .worker(researcher.clone())
            .worker(writer.clone())
            .build()
            .unwrap();

        supervisor.run("hello".to_string()).await.unwrap();
        assert_eq!(researcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(writer.calls.load(Ordering::SeqCst), 0);

        let answer = supervisor
            .run("ask the researcher".to_string())
            .await
            .unwrap();
        assert!(answer.starts_with("researcher did"));
        assert_eq!(researcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(writer.calls.load(Ordering::SeqCst), 0);
    }
}
