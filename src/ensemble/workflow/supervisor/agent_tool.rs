// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

use crate::adk::agent::Agent;
use crate::adk::tool::Tool;

/// Exposes an agent as a tool another agent's reasoning loop may call.
///
/// Name and description come from the agent itself. Input is
/// `{"input": "..."}` or a bare string; output is `{"output": "..."}`.
pub struct AgentTool {
    agent: Arc<dyn Agent>,
    name: String,
    description: String,
    schema: Value,
}

impl AgentTool {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        let name = agent.name().to_string();
        let description = match agent.description().trim() {
            "" => format!("Call {} to handle the task", name),
            described => described.to_string(),
        };
        let schema = json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": format!("The task or question to hand to {}", name)
                }
            },
            "required": ["input"]
        });

        Self {
            agent,
            name,
            description,
            schema,
        }
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }
}

/// Shorthand for [`AgentTool::new`] behind an `Arc<dyn Tool>`
pub fn as_tool(agent: Arc<dyn Agent>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(agent))
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let task = match input {
            Value::String(s) => s,
            Value::Object(mut map) => match map.remove("input") {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => return Err(format!("{}: missing 'input' argument", self.name).into()),
            },
            other => other.to_string(),
        };

        log::info!("Delegating to worker agent {}", self.name);
        let output = self.agent.run(task).await?;
        Ok(json!({ "output": output }))
    }
}
