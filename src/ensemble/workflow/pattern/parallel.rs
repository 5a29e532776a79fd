// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::config::{AgentSlot, PatternConfig, WorkflowPattern};
use super::invoke::invoke_slot;
use super::result::{AgentStepResult, StepStatus, WorkflowResult};
use super::PatternExecutor;

const DEFAULT_MERGE_PROMPT: &str =
    "Combine the expert contributions below into a single, coherent answer.";

/// Fans the same input out to every enabled agent and merges the results
pub struct ParallelExecutor;

#[async_trait]
impl PatternExecutor for ParallelExecutor {
    fn pattern(&self) -> WorkflowPattern {
        WorkflowPattern::Parallel
    }

    async fn execute(&self, input: &str, config: &PatternConfig) -> WorkflowResult {
        let mut result = WorkflowResult::new(Some(WorkflowPattern::Parallel));

        let enabled: Vec<AgentSlot> = config.enabled_agents().cloned().collect();
        for slot in config.agents.iter().filter(|a| !a.enabled) {
            result.record(AgentStepResult::skipped(slot));
        }
        if enabled.is_empty() {
            return result.fail("no enabled agents");
        }

        for slot in &enabled {
            result.log_step(&slot.name, "invoke", "started concurrently");
        }
        let steps = run_concurrently(&enabled, input, config.verbose_logging).await;

        let contributions: Vec<String> = steps.iter().map(contribution).collect();
        let any_succeeded = steps.iter().any(AgentStepResult::succeeded);
        for step in steps {
            result.record(step);
        }

        if !any_succeeded {
            return result.fail("all agents failed");
        }

        let combined = contributions.join("\n\n");
        let merged = match &config.merge_agent {
            Some(merge) => {
                let prompt = config.merge_prompt.as_deref().unwrap_or(DEFAULT_MERGE_PROMPT);
                let merge_input = format!("{}\n\nResults from each expert:\n\n{}", prompt, combined);
                result.log_step(&merge.name, "merge", format!("{} contributions", contributions.len()));

                let step = invoke_slot(merge, merge_input, config.verbose_logging).await;
                let output = match &step.output {
                    Some(output) if step.succeeded() => output.clone(),
                    _ => {
                        log::warn!(
                            "Merge agent {} failed ({}), concatenating results",
                            merge.name,
                            step.error_text()
                        );
                        result.log_step(&merge.name, "merge_fallback", step.error_text());
                        combined
                    }
                };
                result.record(step);
                output
            }
            None => combined,
        };

        result.succeed(merged)
    }
}

/// Invoke every slot on its own task, keeping declaration order in the output
pub(crate) async fn run_concurrently(
    slots: &[AgentSlot],
    input: &str,
    verbose: bool,
) -> Vec<AgentStepResult> {
    let mut handles = Vec::with_capacity(slots.len());
    for slot in slots {
        let slot = slot.clone();
        let input = input.to_string();
        handles.push(tokio::spawn(
            async move { invoke_slot(&slot, input, verbose).await },
        ));
    }

    let mut steps = Vec::with_capacity(handles.len());
    for (slot, handle) in slots.iter().zip(handles) {
        let step = match handle.await {
            Ok(step) => step,
            Err(e) => AgentStepResult {
                agent_name: slot.name.clone(),
                input: input.to_string(),
                output: None,
                status: StepStatus::Failed,
                error: Some(format!("task failed: {}", e)),
                elapsed_ms: 0,
            },
        };
        steps.push(step);
    }
    steps
}

fn contribution(step: &AgentStepResult) -> String {
    match &step.output {
        Some(output) if step.succeeded() => format!("[{}]\n{}", step.agent_name, output),
        _ => format!("[{}] failed: {}", step.agent_name, step.error_text()),
    }
}
