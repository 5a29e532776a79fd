// SPDX-License-Identifier: MIT

use super::manager::SharedService;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use serde_json::Value;
use std::error::Error;

/// A tool served by an MCP server.
///
/// Registered under its `server:tool` name; calls go out under the name the
/// server knows it by.
pub struct McpTool {
    service: SharedService,
    name: String,
    remote_name: String,
    description: String,
    schema: Value,
}

impl McpTool {
    pub fn new(
        service: SharedService,
        name: String,
        remote_name: String,
        description: String,
        schema: Value,
    ) -> Self {
        Self {
            service,
            name,
            remote_name,
            description,
            schema,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl Tool for McpTool {
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
        let service = self.service.read().await;

        let arguments = match input {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => return Err(format!("{}: arguments must be an object, got {}", self.name, other).into()),
        };

        log::debug!("Calling MCP tool {}", self.name);
        let result = service
            .call_tool(CallToolRequestParam {
                name: self.remote_name.clone().into(),
                arguments,
            })
            .await?;

        Ok(serde_json::to_value(result)?)
    }
}
