// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::config::{PatternConfig, WorkflowPattern};
use super::invoke::invoke_slot;
use super::result::{AgentStepResult, WorkflowResult};
use super::PatternExecutor;

/// Runs agents in declared order, optionally chaining outputs
pub struct SequentialExecutor;

#[async_trait]
impl PatternExecutor for SequentialExecutor {
    fn pattern(&self) -> WorkflowPattern {
        WorkflowPattern::Sequential
    }

    async fn execute(&self, input: &str, config: &PatternConfig) -> WorkflowResult {
        let mut result = WorkflowResult::new(Some(WorkflowPattern::Sequential));
        let mut current = input.to_string();
        let mut last_output: Option<String> = None;
        let mut failure: Option<String> = None;

        for slot in &config.agents {
            if !slot.enabled {
                result.log_step(&slot.name, "skip", "agent disabled");
                result.record(AgentStepResult::skipped(slot));
                continue;
            }
            if failure.is_some() {
                result.record(AgentStepResult::not_attempted(slot));
                continue;
            }

            let agent_input = if config.chain_output {
                current.clone()
            } else {
                input.to_string()
            };
            result.log_step(&slot.name, "invoke", format!("{} chars of input", agent_input.len()));

            let step = invoke_slot(slot, agent_input, config.verbose_logging).await;
            match &step.output {
                Some(output) if step.succeeded() => {
                    current = output.clone();
                    last_output = Some(output.clone());
                }
                _ => {
                    let message = format!("Agent '{}' failed: {}", slot.name, step.error_text());
                    result.log_step(&slot.name, "abort", &message);
                    failure = Some(message);
                }
            }
            result.record(step);
        }

        match (failure, last_output) {
            (Some(message), partial) => {
                result.final_result = partial;
                result.fail(message)
            }
            (None, Some(output)) => result.succeed(output),
            (None, None) => result.fail("no enabled agents"),
        }
    }
}
