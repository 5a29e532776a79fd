// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::adk::error::{ConfigError, EnsembleError};
use crate::ensemble::workflow::graph::config::NodeConfig;
use crate::ensemble::workflow::graph::node::{
    invalid, parse_params, schema_of, CompileContext, NodeAction, NodeExecutor, CURRENT_NODE_KEY,
};
use crate::ensemble::workflow::state::{first_number, StateSnapshot, StateUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    /// Join non-empty values with newlines
    Merge,
    /// Copy the first input value
    Extract,
    /// Render `key: value` lines
    Format,
    /// Split text into trimmed, non-empty lines
    SplitLines,
    /// Digits only, clamped to 0..=100
    ParseNumber,
    /// Object, else array, else the raw string
    ParseJson,
    /// `PASS` when the value reaches the threshold, else `NEED_IMPROVEMENT`
    ThresholdCheck,
    /// Integer value plus one
    Increment,
}

/// Parameters of a `TRANSFORM_NODE`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TransformNodeParams {
    pub transform_type: TransformType,
    /// State keys read by the transform
    pub input_keys: Vec<String>,
    /// State key receiving the result
    pub output_key: String,
    /// Separator for SPLIT_LINES
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Pass mark for THRESHOLD_CHECK
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Cap on SPLIT_LINES output
    #[serde(default)]
    pub max_items: Option<usize>,
}

fn default_delimiter() -> String {
    "\n".to_string()
}

fn default_threshold() -> f64 {
    80.0
}

pub struct TransformNodeExecutor;

#[async_trait]
impl NodeExecutor for TransformNodeExecutor {
    fn node_type(&self) -> &'static str {
        "TRANSFORM_NODE"
    }

    fn description(&self) -> &'static str {
        "Transform node - reshapes state values without calling a model"
    }

    fn config_schema(&self) -> Value {
        schema_of::<TransformNodeParams>()
    }

    async fn create(
        &self,
        node: &NodeConfig,
        _ctx: &CompileContext,
    ) -> Result<Arc<dyn NodeAction>, ConfigError> {
        // Transform names are case-insensitive
        let mut normalized = node.clone();
        if let Some(Value::String(kind)) = normalized.params.get_mut("transform_type") {
            *kind = kind.trim().to_ascii_uppercase();
        }
        let params: TransformNodeParams = parse_params(&normalized)?;

        if params.input_keys.is_empty() {
            return Err(invalid(node, "input_keys must not be empty"));
        }
        if params.output_key.trim().is_empty() {
            return Err(invalid(node, "output_key must not be empty"));
        }

        Ok(Arc::new(TransformNode {
            node_id: node.id.clone(),
            params,
        }))
    }
}

struct TransformNode {
    node_id: String,
    params: TransformNodeParams,
}

impl TransformNode {
    fn first_key(&self) -> &str {
        &self.params.input_keys[0]
    }

    fn apply(&self, state: &StateSnapshot) -> Value {
        let p = &self.params;
        match p.transform_type {
            TransformType::Merge => Value::String(
                p.input_keys
                    .iter()
                    .map(|k| state.get_text(k))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            TransformType::Extract => state.get(self.first_key()).clone(),
            TransformType::Format => Value::String(
                p.input_keys
                    .iter()
                    .map(|k| format!("{}: {}", k, state.get_text(k)))
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim()
                    .to_string(),
            ),
            TransformType::SplitLines => {
                let text = state.get_text(self.first_key());
                let delimiter = if p.delimiter.is_empty() {
                    "\n"
                } else {
                    p.delimiter.as_str()
                };
                let items = text
                    .split(delimiter)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .take(p.max_items.unwrap_or(usize::MAX))
                    .map(|s| Value::String(s.to_string()))
                    .collect();
                Value::Array(items)
            }
            TransformType::ParseNumber => {
                Value::from(parse_score(&state.get_text(self.first_key())))
            }
            TransformType::ParseJson => {
                let text = state.get_text(self.first_key());
                match serde_json::from_str::<Value>(text.trim()) {
                    Ok(v @ Value::Object(_)) | Ok(v @ Value::Array(_)) => v,
                    _ => Value::String(text),
                }
            }
            TransformType::ThresholdCheck => {
                let value = state.get_number(self.first_key());
                let verdict = if value >= p.threshold {
                    "PASS"
                } else {
                    "NEED_IMPROVEMENT"
                };
                Value::String(verdict.to_string())
            }
            TransformType::Increment => {
                // float counters truncate; the cast saturates
                let current = state.get_number(self.first_key()) as i64;
                Value::from(current.saturating_add(1))
            }
        }
    }
}

/// Score in 0..=100 read from the first number in free text
pub(crate) fn parse_score(text: &str) -> u64 {
    first_number(text).map_or(0, |n| n.min(100.0) as u64)
}

#[async_trait]
impl NodeAction for TransformNode {
    async fn run(&self, state: StateSnapshot) -> Result<StateUpdate, EnsembleError> {
        log::info!(
            "Node {} applying {:?}",
            self.node_id,
            self.params.transform_type
        );
        let result = self.apply(&state);

        Ok(StateUpdate::new()
            .set(self.params.output_key.clone(), result)
            .set(CURRENT_NODE_KEY, Value::String(self.node_id.clone())))
    }
}
