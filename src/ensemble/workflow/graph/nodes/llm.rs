// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::adk::error::{ConfigError, EnsembleError};
use crate::adk::runtime::{AgentRuntime, Invocation, InvocationOptions};
use crate::adk::tool::Tool;
use crate::ensemble::workflow::graph::config::NodeConfig;
use crate::ensemble::workflow::graph::node::{
    invalid, parse_params, schema_of, CompileContext, NodeAction, NodeExecutor, CURRENT_NODE_KEY,
};
use crate::ensemble::workflow::state::{StateSnapshot, StateUpdate};

/// Parameters of an `LLM_NODE`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LlmNodeParams {
    /// State key read as the prompt input
    #[serde(default)]
    pub input_key: Option<String>,
    /// Several state keys, rendered as `key: value` lines
    #[serde(default)]
    pub input_keys: Vec<String>,
    /// State key receiving the model's answer
    pub output_key: String,
    /// Instruction handed to the runtime
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sampling temperature (0-1)
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Registry tool names the runtime may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// Per-invocation timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub struct LlmNodeExecutor;

#[async_trait]
impl NodeExecutor for LlmNodeExecutor {
    fn node_type(&self) -> &'static str {
        "LLM_NODE"
    }

    fn description(&self) -> &'static str {
        "LLM call node - invokes the agent runtime with state input"
    }

    fn config_schema(&self) -> Value {
        schema_of::<LlmNodeParams>()
    }

    async fn create(
        &self,
        node: &NodeConfig,
        ctx: &CompileContext,
    ) -> Result<Arc<dyn NodeAction>, ConfigError> {
        let params: LlmNodeParams = parse_params(node)?;

        if params.output_key.trim().is_empty() {
            return Err(invalid(node, "output_key must not be empty"));
        }
        let has_input = params
            .input_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if !has_input && params.input_keys.is_empty() {
            return Err(invalid(node, "input_key or input_keys is required"));
        }

        let tools = ctx.tools.resolve(&params.tools).await;

        Ok(Arc::new(LlmNode {
            node_id: node.id.clone(),
            options: InvocationOptions {
                temperature: params.temperature,
                max_tokens: params.max_tokens,
            },
            params,
            runtime: ctx.runtime.clone(),
            tools,
        }))
    }
}

struct LlmNode {
    node_id: String,
    params: LlmNodeParams,
    options: InvocationOptions,
    runtime: Arc<dyn AgentRuntime>,
    tools: Vec<Arc<dyn Tool>>,
}

impl LlmNode {
    fn build_input(&self, state: &StateSnapshot) -> String {
        match self.params.input_key.as_deref() {
            Some(key) if !key.trim().is_empty() => state.get_text(key),
            _ => self
                .params
                .input_keys
                .iter()
                .map(|key| format!("{}: {}", key, state.get_text(key)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[async_trait]
impl NodeAction for LlmNode {
    async fn run(&self, state: StateSnapshot) -> Result<StateUpdate, EnsembleError> {
        let input = self.build_input(&state);
        if input.trim().is_empty() {
            log::warn!("Node {} has empty input", self.node_id);
        }
        log::debug!("Node {} input: {}", self.node_id, input);

        let invocation = Invocation {
            instruction: self.params.system_prompt.as_deref().unwrap_or(""),
            tools: &self.tools,
            input: &input,
            options: &self.options,
        };

        let result = match self.params.timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), self.runtime.invoke(invocation))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(EnsembleError::Timeout {
                            agent: self.node_id.clone(),
                            timeout_ms: ms,
                        })
                    }
                }
            }
            None => self.runtime.invoke(invocation).await,
        };

        let answer = result.map_err(|e| EnsembleError::node(&self.node_id, e.to_string()))?;
        log::info!(
            "Node {} produced {} chars",
            self.node_id,
            answer.chars().count()
        );

        Ok(StateUpdate::new()
            .set(self.params.output_key.clone(), Value::String(answer))
            .set(CURRENT_NODE_KEY, Value::String(self.node_id.clone())))
    }
}
