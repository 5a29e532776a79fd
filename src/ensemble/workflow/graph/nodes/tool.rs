// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::adk::error::{ConfigError, EnsembleError};
use crate::adk::tool::Tool;
use crate::ensemble::workflow::graph::config::NodeConfig;
use crate::ensemble::workflow::graph::node::{
    parse_params, schema_of, CompileContext, NodeAction, NodeExecutor, CURRENT_NODE_KEY,
};
use crate::ensemble::workflow::state::{StateSnapshot, StateUpdate};

/// Parameters of a `TOOL_NODE`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ToolNodeParams {
    /// Registry name of the tool
    pub tool: String,
    /// State key holding the tool arguments
    #[serde(default)]
    pub input_key: Option<String>,
    /// State key receiving the tool result
    pub output_key: String,
}

pub struct ToolNodeExecutor;

#[async_trait]
impl NodeExecutor for ToolNodeExecutor {
    fn node_type(&self) -> &'static str {
        "TOOL_NODE"
    }

    fn description(&self) -> &'static str {
        "Tool node - calls a registered tool directly"
    }

    fn config_schema(&self) -> Value {
        schema_of::<ToolNodeParams>()
    }

    async fn create(
        &self,
        node: &NodeConfig,
        ctx: &CompileContext,
    ) -> Result<Arc<dyn NodeAction>, ConfigError> {
        let params: ToolNodeParams = parse_params(node)?;
        let tool = ctx
            .tools
            .get(&params.tool)
            .await
            .ok_or_else(|| ConfigError::UnknownTool(params.tool.clone()))?;

        Ok(Arc::new(ToolNode {
            node_id: node.id.clone(),
            params,
            tool,
        }))
    }
}

struct ToolNode {
    node_id: String,
    params: ToolNodeParams,
    tool: Arc<dyn Tool>,
}

#[async_trait]
impl NodeAction for ToolNode {
    async fn run(&self, state: StateSnapshot) -> Result<StateUpdate, EnsembleError> {
        let args = match self.params.input_key.as_deref().map(|k| state.get(k)) {
            None | Some(Value::Null) => json!({}),
            Some(v @ Value::Object(_)) => v.clone(),
            Some(other) => json!({ "input": other }),
        };

        log::info!("Node {} calling tool {}", self.node_id, self.tool.name());
        let output = self
            .tool
            .execute(args)
            .await
            .map_err(|e| EnsembleError::node(&self.node_id, e.to_string()))?;

        Ok(StateUpdate::new()
            .set(self.params.output_key.clone(), output)
            .set(CURRENT_NODE_KEY, Value::String(self.node_id.clone())))
    }
}
