// SPDX-License-Identifier: MIT

//! MCP servers as a tool source
//!
//! Each configured server runs as a child process. Its tools are registered
//! in the [`ToolRegistry`] as `server:tool`, so agents and graph nodes can
//! name them like any other tool.

pub mod manager;
pub mod tool;

use rmcp::model::{ClientCapabilities, ClientInfo, Implementation};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::{ClientHandler, ServiceExt};
use std::error::Error;
use std::sync::Arc;
use tokio::process::Command;

use crate::adk::error::EnsembleError;
use crate::ensemble::workflow::registry::ToolRegistry;
use crate::ensemble::workflow::types::McpServerConfig;
use manager::McpServiceManager;
use tool::McpTool;

pub type McpService = RunningService<RoleClient, BasicClientHandler>;

#[derive(Debug, Clone)]
pub struct BasicClientHandler;

impl ClientHandler for BasicClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
        }
    }
}

/// Connects to an MCP server over the stdio of a spawned child process
pub async fn create_mcp_service(
    command: &str,
    args: &[String],
) -> Result<McpService, Box<dyn Error + Send + Sync>> {
    let mut server_cmd = Command::new(command);
    server_cmd.args(args);

    let transport = TokioChildProcess::new(server_cmd)?;
    let service = BasicClientHandler.serve(transport).await?;
    Ok(service)
}

/// Registry name of a server's tool
pub fn qualified_name(server: &str, tool: &str) -> String {
    format!("{}:{}", server, tool)
}

/// Start (or reuse) a server and register all of its tools; returns the
/// registered names
pub async fn register_server_tools(
    manager: &McpServiceManager,
    config: &McpServerConfig,
    registry: &ToolRegistry,
) -> Result<Vec<String>, EnsembleError> {
    let service = manager.get_or_create_service(config).await?;
    let tools = {
        let service_lock = service.read().await;
        service_lock
            .list_all_tools()
            .await
            .map_err(|e| EnsembleError::runtime(&config.name, e.to_string()))?
    };

    let mut names = Vec::with_capacity(tools.len());
    for tool in tools {
        let name = qualified_name(&config.name, &tool.name);
        let mcp_tool = McpTool::new(
            service.clone(),
            name.clone(),
            tool.name.to_string(),
            tool.description.unwrap_or_default().to_string(),
            serde_json::to_value(&tool.input_schema).unwrap_or_default(),
        );
        registry.register(Arc::new(mcp_tool)).await;
        log::info!("Registered MCP tool: {}", name);
        names.push(name);
    }
    Ok(names)
}

/// Register the tools of every configured server.
///
/// A server that fails to start is logged and skipped; the others still load.
pub async fn register_all(
    manager: &McpServiceManager,
    configs: &[McpServerConfig],
    registry: &ToolRegistry,
) -> usize {
    let mut total = 0;
    for config in configs {
        match register_server_tools(manager, config, registry).await {
            Ok(names) => total += names.len(),
            Err(e) => log::error!("MCP server '{}' unavailable: {}", config.name, e),
        }
    }
    total
}
