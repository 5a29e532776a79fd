// SPDX-License-Identifier: MIT

use std::time::Instant;

use super::config::AgentSlot;
use super::result::{AgentStepResult, StepStatus};

/// Run one agent under its slot timeout.
///
/// A timeout is reported as a failed step, never as an abort of the pattern.
pub(crate) async fn invoke_slot(slot: &AgentSlot, input: String, verbose: bool) -> AgentStepResult {
    if verbose {
        log::info!("Agent {} input: {}", slot.name, input);
    } else {
        log::debug!("Invoking agent {}", slot.name);
    }

    let started = Instant::now();
    let outcome = tokio::time::timeout(slot.timeout, slot.agent.run(input.clone())).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let (status, output, error) = match outcome {
        Ok(Ok(output)) => {
            if verbose {
                log::info!("Agent {} output: {}", slot.name, output);
            }
            (StepStatus::Succeeded, Some(output), None)
        }
        Ok(Err(e)) => {
            log::error!("Agent {} failed: {}", slot.name, e);
            (StepStatus::Failed, None, Some(e.to_string()))
        }
        Err(_) => {
            log::error!(
                "Agent {} timed out after {}ms",
                slot.name,
                slot.timeout.as_millis()
            );
            (
                StepStatus::TimedOut,
                None,
                Some(format!("timed out after {}ms", slot.timeout.as_millis())),
            )
        }
    };

    AgentStepResult {
        agent_name: slot.name.clone(),
        input,
        output,
        status,
        error,
        elapsed_ms,
    }
}
