// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::config::{PatternConfig, WorkflowPattern};
use super::invoke::invoke_slot;
use super::result::{AgentStepResult, WorkflowResult};
use super::PatternExecutor;

const DEFAULT_TERMINATION_PROMPT: &str =
    "You review work in progress and decide whether it is finished.";

/// Repeats one agent until the termination agent answers DONE
pub struct LoopExecutor;

#[async_trait]
impl PatternExecutor for LoopExecutor {
    fn pattern(&self) -> WorkflowPattern {
        WorkflowPattern::Loop
    }

    async fn execute(&self, input: &str, config: &PatternConfig) -> WorkflowResult {
        let mut result = WorkflowResult::new(Some(WorkflowPattern::Loop));
        let Some(checker) = &config.loop_termination_agent else {
            return result.fail("loop pattern requires a termination agent");
        };
        let mut enabled = config.enabled_agents();
        let Some(worker) = enabled.next() else {
            return result.fail("no enabled agents");
        };
        for extra in enabled {
            log::warn!("Loop pattern uses only its first agent; ignoring {}", extra.name);
            result.record(AgentStepResult::skipped(extra));
        }

        let prompt = config
            .loop_termination_prompt
            .as_deref()
            .unwrap_or(DEFAULT_TERMINATION_PROMPT);
        let mut round_input = input.to_string();
        let mut last_output = String::new();

        for round in 1..=config.max_loop_iterations {
            result.log_step(&worker.name, "invoke", format!("round {}", round));
            let step = invoke_slot(worker, round_input.clone(), config.verbose_logging).await;
            let output = step.output.clone().filter(|_| step.succeeded());
            let error = step.error_text();
            result.record(step);
            let Some(output) = output else {
                return result.fail(format!("Agent '{}' failed in round {}: {}", worker.name, round, error));
            };
            last_output = output;

            let check_input = format!(
                "{}\n\nOriginal request:\n{}\n\nLatest output:\n{}\n\n\
                 Reply DONE if the output fully satisfies the request. Otherwise reply CONTINUE \
                 followed by concrete feedback.",
                prompt, input, last_output
            );
            result.log_step(&checker.name, "check", format!("round {}", round));
            let check = invoke_slot(checker, check_input, config.verbose_logging).await;
            let verdict = check.output.clone().filter(|_| check.succeeded());
            let check_error = check.error_text();
            result.record(check);
            let Some(verdict) = verdict else {
                return result.fail(format!(
                    "Termination agent '{}' failed in round {}: {}",
                    checker.name, round, check_error
                ));
            };

            if is_done(&verdict) {
                log::info!("Loop finished after {} round(s)", round);
                result.log_step(&checker.name, "done", format!("round {}", round));
                return result.succeed(last_output);
            }

            let feedback = feedback(&verdict);
            round_input = format!(
                "{}\n\nPrevious output:\n{}\n\nFeedback:\n{}",
                input, last_output, feedback
            );
        }

        log::info!(
            "Loop stopped at the {} round cap",
            config.max_loop_iterations
        );
        result.log_step(&worker.name, "max_iterations", config.max_loop_iterations.to_string());
        if config.max_loop_iterations == 0 {
            return result.fail("max_loop_iterations is 0");
        }
        result.succeed(last_output)
    }
}

fn is_done(verdict: &str) -> bool {
    verdict.trim_start().to_ascii_uppercase().starts_with("DONE")
}

fn feedback(verdict: &str) -> &str {
    let trimmed = verdict.trim();
    match trimmed.get(..8) {
        Some(head) if head.eq_ignore_ascii_case("CONTINUE") => {
            trimmed[8..].trim_start_matches([':', '-', ' ', '\n'])
        }
        _ => trimmed,
    }
}
