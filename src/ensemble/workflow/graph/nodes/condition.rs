// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adk::error::{ConfigError, EnsembleError};
use crate::ensemble::workflow::graph::config::{NodeConfig, END};
use crate::ensemble::workflow::graph::node::{
    invalid, parse_params, schema_of, CompileContext, NodeAction, NodeExecutor, CURRENT_NODE_KEY,
};
use crate::ensemble::workflow::graph::router::NEXT_NODE_KEY;
use crate::ensemble::workflow::state::{StateSnapshot, StateUpdate};

/// Parameters of a `CONDITION_NODE`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConditionNodeParams {
    /// State field whose value selects the route
    pub condition_field: String,
    /// Field value to route label, e.g. `{"approved": "publish"}`
    pub routes: BTreeMap<String, String>,
    /// Label used when no route matches
    #[serde(default = "default_route")]
    pub default_route: String,
}

fn default_route() -> String {
    END.to_string()
}

pub struct ConditionNodeExecutor;

#[async_trait]
impl NodeExecutor for ConditionNodeExecutor {
    fn node_type(&self) -> &'static str {
        "CONDITION_NODE"
    }

    fn description(&self) -> &'static str {
        "Condition node - picks the next route from a state value"
    }

    fn config_schema(&self) -> Value {
        schema_of::<ConditionNodeParams>()
    }

    async fn create(
        &self,
        node: &NodeConfig,
        _ctx: &CompileContext,
    ) -> Result<Arc<dyn NodeAction>, ConfigError> {
        let params: ConditionNodeParams = parse_params(node)?;
        if params.condition_field.trim().is_empty() {
            return Err(invalid(node, "condition_field must not be empty"));
        }
        if params.routes.is_empty() {
            return Err(invalid(node, "routes must not be empty"));
        }

        Ok(Arc::new(ConditionNode {
            node_id: node.id.clone(),
            params,
        }))
    }
}

struct ConditionNode {
    node_id: String,
    params: ConditionNodeParams,
}

impl ConditionNode {
    fn select(&self, value: &Value) -> String {
        let key = match value {
            Value::Null => {
                log::warn!(
                    "Node {}: condition field '{}' is unset, using default route {}",
                    self.node_id,
                    self.params.condition_field,
                    self.params.default_route
                );
                return self.params.default_route.clone();
            }
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };

        self.params
            .routes
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.params.default_route.clone())
    }
}

#[async_trait]
impl NodeAction for ConditionNode {
    async fn run(&self, state: StateSnapshot) -> Result<StateUpdate, EnsembleError> {
        let next = self.select(state.get(&self.params.condition_field));
        log::info!("Node {} routes to {}", self.node_id, next);

        Ok(StateUpdate::new()
            .set(NEXT_NODE_KEY, Value::String(next))
            .set(CURRENT_NODE_KEY, Value::String(self.node_id.clone())))
    }
}
