// SPDX-License-Identifier: MIT

//! Agent composition patterns
//!
//! Patterns work purely on [`Agent`](crate::adk::agent::Agent) handles and
//! are independent of the graph executor. Every run returns a
//! [`WorkflowResult`]; agent failures and timeouts are recorded there.

mod config;
mod invoke;
mod looping;
mod parallel;
mod result;
mod routing;
mod sequential;

pub use config::{
    AgentSlot, PatternConfig, WorkflowPattern, DEFAULT_AGENT_TIMEOUT, DEFAULT_GLOBAL_TIMEOUT,
    DEFAULT_MAX_LOOP_ITERATIONS,
};
pub use looping::LoopExecutor;
pub use parallel::ParallelExecutor;
pub use result::{AgentStepResult, ExecutionStep, StepStatus, WorkflowResult};
pub use routing::RoutingExecutor;
pub use sequential::SequentialExecutor;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[async_trait]
pub trait PatternExecutor: Send + Sync {
    fn pattern(&self) -> WorkflowPattern;

    /// Run the pattern; never fails past this boundary
    async fn execute(&self, input: &str, config: &PatternConfig) -> WorkflowResult;
}

/// Validates a pattern config and dispatches it to its executor
#[derive(Clone)]
pub struct PatternRunner {
    executors: HashMap<WorkflowPattern, Arc<dyn PatternExecutor>>,
}

impl PatternRunner {
    pub fn new() -> Self {
        let mut runner = Self {
            executors: HashMap::new(),
        };
        runner.register(Arc::new(SequentialExecutor));
        runner.register(Arc::new(ParallelExecutor));
        runner.register(Arc::new(RoutingExecutor));
        runner.register(Arc::new(LoopExecutor));
        runner
    }

    pub fn register(&mut self, executor: Arc<dyn PatternExecutor>) {
        self.executors.insert(executor.pattern(), executor);
    }

    pub async fn run(&self, input: &str, config: &PatternConfig) -> WorkflowResult {
        let started = Instant::now();

        let pattern = match config.validate() {
            Ok(pattern) => pattern,
            Err(e) => {
                log::error!("Invalid pattern config '{}': {}", config.name, e);
                return WorkflowResult::failed(config.pattern, format!("Configuration error: {}", e));
            }
        };
        let Some(executor) = self.executors.get(&pattern) else {
            return WorkflowResult::failed(
                Some(pattern),
                format!("no executor registered for pattern {}", pattern),
            );
        };

        log::info!(
            "Running {} pattern '{}' with {} agent(s)",
            pattern,
            config.name,
            config.agents.len()
        );
        let mut result =
            match tokio::time::timeout(config.global_timeout, executor.execute(input, config)).await {
                Ok(result) => result,
                Err(_) => {
                    log::error!(
                        "Pattern '{}' exceeded its {}ms global timeout",
                        config.name,
                        config.global_timeout.as_millis()
                    );
                    WorkflowResult::failed(
                        Some(pattern),
                        format!(
                            "global timeout of {}ms exceeded",
                            config.global_timeout.as_millis()
                        ),
                    )
                }
            };

        result.total_elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Pattern '{}' finished (success: {}, {}ms)",
            config.name,
            result.success,
            result.total_elapsed_ms
        );
        result
    }
}

impl Default for PatternRunner {
    fn default() -> Self {
        Self::new()
    }
}
