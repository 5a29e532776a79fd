// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{AgentSlot, WorkflowPattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    TimedOut,
    NotAttempted,
    Skipped,
}

/// Outcome of one agent invocation inside a pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStepResult {
    pub agent_name: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl AgentStepResult {
    pub(crate) fn skipped(slot: &AgentSlot) -> Self {
        Self::inert(slot, StepStatus::Skipped)
    }

    pub(crate) fn not_attempted(slot: &AgentSlot) -> Self {
        Self::inert(slot, StepStatus::NotAttempted)
    }

    fn inert(slot: &AgentSlot, status: StepStatus) -> Self {
        Self {
            agent_name: slot.name.clone(),
            input: String::new(),
            output: None,
            status,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Captured error, or a placeholder when none was recorded
    pub fn error_text(&self) -> String {
        self.error.clone().unwrap_or_else(|| "no output".to_string())
    }
}

/// Audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub step: u32,
    pub agent_name: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// Result of a pattern run; failures are captured here, never thrown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub pattern: Option<WorkflowPattern>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub agent_results: Vec<AgentStepResult>,
    pub steps: Vec<ExecutionStep>,
    pub total_elapsed_ms: u64,
}

impl WorkflowResult {
    pub fn new(pattern: Option<WorkflowPattern>) -> Self {
        Self {
            pattern,
            success: false,
            final_result: None,
            error_message: None,
            agent_results: Vec::new(),
            steps: Vec::new(),
            total_elapsed_ms: 0,
        }
    }

    /// A failed result carrying only an error
    pub fn failed(pattern: Option<WorkflowPattern>, error: impl Into<String>) -> Self {
        Self::new(pattern).fail(error)
    }

    pub(crate) fn record(&mut self, result: AgentStepResult) {
        self.agent_results.push(result);
    }

    pub(crate) fn log_step(
        &mut self,
        agent: &str,
        action: impl Into<String>,
        details: impl Into<String>,
    ) {
        let step = self.steps.len() as u32 + 1;
        self.steps.push(ExecutionStep {
            step,
            agent_name: agent.to_string(),
            action: action.into(),
            timestamp: Utc::now(),
            details: details.into(),
        });
    }

    pub(crate) fn succeed(mut self, output: String) -> Self {
        self.success = true;
        self.final_result = Some(output);
        self.error_message = None;
        self
    }

    pub(crate) fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error.into());
        self
    }

    /// Result for the named agent, if it took part
    pub fn agent(&self, name: &str) -> Option<&AgentStepResult> {
        self.agent_results.iter().find(|r| r.agent_name == name)
    }
}
