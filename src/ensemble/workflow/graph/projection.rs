// SPDX-License-Identifier: MIT

//! Projection of run state into caller-facing results and progress events

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ensemble::workflow::state::StateSnapshot;

/// Which state keys feed the result fields
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResultProjection {
    pub question_key: String,
    pub answer_key: String,
    pub analysis_key: String,
    pub score_key: String,
    pub iteration_key: String,
    pub error_key: String,
}

impl Default for ResultProjection {
    fn default() -> Self {
        Self {
            question_key: "question".to_string(),
            answer_key: "final_answer".to_string(),
            analysis_key: "analysis".to_string(),
            score_key: "quality_score".to_string(),
            iteration_key: "iteration_count".to_string(),
            error_key: "error_message".to_string(),
        }
    }
}

/// Final outcome of a synchronous run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub question: String,
    pub answer: String,
    pub analysis: String,
    pub quality_score: f64,
    pub iteration_count: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Emitted once per completed node
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub node_name: String,
    pub question: String,
    pub current_answer: String,
    pub analysis: String,
    pub quality_score: f64,
    pub iteration_count: u32,
    pub state: StateSnapshot,
}

/// Items of a streaming run; the last one is always terminal
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    Progress(ProgressEvent),
    Completed(ResearchResult),
    Failed {
        node: Option<String>,
        error: String,
        result: ResearchResult,
    },
}

impl GraphEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GraphEvent::Progress(_))
    }
}

impl ResultProjection {
    pub fn result(
        &self,
        state: &StateSnapshot,
        success: bool,
        error: Option<String>,
    ) -> ResearchResult {
        let stored_error = match state.get(&self.error_key) {
            Value::Null => None,
            other => Some(state_text(other)),
        };

        ResearchResult {
            question: state.get_text(&self.question_key),
            answer: state.get_text(&self.answer_key),
            analysis: state.get_text(&self.analysis_key),
            quality_score: state.get_number(&self.score_key),
            iteration_count: state.get_count(&self.iteration_key),
            success,
            error_message: error.or(if success { None } else { stored_error }),
        }
    }

    pub fn progress(&self, node_name: &str, state: StateSnapshot) -> ProgressEvent {
        ProgressEvent {
            node_name: node_name.to_string(),
            question: state.get_text(&self.question_key),
            current_answer: state.get_text(&self.answer_key),
            analysis: state.get_text(&self.analysis_key),
            quality_score: state.get_number(&self.score_key),
            iteration_count: state.get_count(&self.iteration_key),
            state,
        }
    }
}

fn state_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::workflow::state::WorkflowState;
    use serde_json::json;

    fn state() -> StateSnapshot {
        let mut state = WorkflowState::empty();
        state.set("question", json!("What is Rust?"));
        state.set("final_answer", json!("A language"));
        state.set("quality_score", json!(85));
        state.set("iteration_count", json!(2));
        state.snapshot()
    }

    #[test]
    fn test_result_projection() {
        let result = ResultProjection::default().result(&state(), true, None);
        assert_eq!(result.question, "What is Rust?");
        assert_eq!(result.answer, "A language");
        assert_eq!(result.analysis, "");
        assert_eq!(result.quality_score, 85.0);
        assert_eq!(result.iteration_count, 2);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failed_result_carries_error() {
        let result =
            ResultProjection::default().result(&state(), false, Some("node blew up".into()));
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("node blew up"));
    }

    #[test]
    fn test_progress_event_serializes_camel_case() {
        let event = GraphEvent::Progress(ResultProjection::default().progress("synthesis", state()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["nodeName"], "synthesis");
        assert_eq!(json["currentAnswer"], "A language");
        assert_eq!(json["state"]["iteration_count"], 2);
        assert!(!event.is_terminal());
    }
}
