// SPDX-License-Identifier: MIT

//! Route label computation for conditional edges
//!
//! Routers read the current workflow state and never write it.

use serde::{Deserialize, Serialize};

use super::config::END;
use crate::ensemble::workflow::state::WorkflowState;

/// State key written by condition nodes and read by the default router
pub const NEXT_NODE_KEY: &str = "next_node";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouterConfig {
    /// Use the string form of a state value as the label
    StateField {
        #[serde(default = "default_route_key")]
        key: String,
    },
    /// Stop once the score passes or the iteration budget is spent
    QualityGate {
        score_key: String,
        #[serde(default = "default_threshold")]
        threshold: f64,
        iteration_key: String,
        #[serde(default = "default_max_iterations")]
        max_iterations: u32,
        #[serde(default = "default_pass_label")]
        pass_label: String,
        #[serde(default = "default_retry_label")]
        retry_label: String,
    },
}

fn default_route_key() -> String {
    NEXT_NODE_KEY.to_string()
}

fn default_threshold() -> f64 {
    80.0
}

fn default_max_iterations() -> u32 {
    3
}

fn default_pass_label() -> String {
    "end".to_string()
}

fn default_retry_label() -> String {
    "iterate".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::StateField {
            key: default_route_key(),
        }
    }
}

impl RouterConfig {
    pub fn quality_gate(
        score_key: impl Into<String>,
        threshold: f64,
        iteration_key: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self::QualityGate {
            score_key: score_key.into(),
            threshold,
            iteration_key: iteration_key.into(),
            max_iterations,
            pass_label: default_pass_label(),
            retry_label: default_retry_label(),
        }
    }

    /// Compute the route label from the current state
    pub fn route(&self, state: &WorkflowState) -> String {
        match self {
            Self::StateField { key } => match state.get(key) {
                serde_json::Value::Null => END.to_string(),
                serde_json::Value::String(s) if s.trim().is_empty() => END.to_string(),
                serde_json::Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            },
            Self::QualityGate {
                score_key,
                threshold,
                iteration_key,
                max_iterations,
                pass_label,
                retry_label,
            } => {
                let score = state.get_number(score_key);
                let iterations = state.get_number(iteration_key);
                if score >= *threshold || iterations >= f64::from(*max_iterations) {
                    log::info!(
                        "Quality gate passed (score {}, iteration {}/{})",
                        score,
                        iterations,
                        max_iterations
                    );
                    pass_label.clone()
                } else {
                    log::info!(
                        "Quality gate requests another iteration (score {} < {}, iteration {}/{})",
                        score,
                        threshold,
                        iterations,
                        max_iterations
                    );
                    retry_label.clone()
                }
            }
        }
    }

    /// Iteration cap this router enforces, if any
    pub fn max_iterations(&self) -> Option<u32> {
        match self {
            Self::QualityGate { max_iterations, .. } => Some(*max_iterations),
            Self::StateField { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::workflow::state::StateKey;
    use serde_json::json;

    fn state(score: serde_json::Value, iterations: i64) -> WorkflowState {
        let mut state = WorkflowState::new(&[
            StateKey::replace("quality_score"),
            StateKey::replace("iteration_count"),
        ]);
        state.set("quality_score", score);
        state.set("iteration_count", json!(iterations));
        state
    }

    #[test]
    fn test_state_field_router() {
        let router = RouterConfig::default();
        let mut s = WorkflowState::empty();
        assert_eq!(router.route(&s), END);

        s.set(NEXT_NODE_KEY, json!("review"));
        assert_eq!(router.route(&s), "review");
    }

    #[test]
    fn test_quality_gate_threshold() {
        let gate = RouterConfig::quality_gate("quality_score", 80.0, "iteration_count", 3);
        assert_eq!(gate.route(&state(json!(50), 1)), "iterate");
        assert_eq!(gate.route(&state(json!(80), 1)), "end");
        assert_eq!(gate.route(&state(json!("92"), 1)), "end");
    }

    #[test]
    fn test_quality_gate_iteration_cap() {
        let gate = RouterConfig::quality_gate("quality_score", 80.0, "iteration_count", 3);
        assert_eq!(gate.route(&state(json!(10), 2)), "iterate");
        assert_eq!(gate.route(&state(json!(10), 3)), "end");
    }

    #[test]
    fn test_router_deserialize() {
        let router: RouterConfig = serde_yaml::from_str(
            r#"
kind: quality_gate
score_key: quality_score
iteration_key: iteration_count
"#,
        )
        .unwrap();
        assert_eq!(router.max_iterations(), Some(3));
        assert_eq!(
            router,
            RouterConfig::quality_gate("quality_score", 80.0, "iteration_count", 3)
        );
    }
}
