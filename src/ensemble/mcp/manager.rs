// SPDX-License-Identifier: MIT

use super::{create_mcp_service, McpService};
use crate::ensemble::workflow::types::McpServerConfig;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedService = Arc<RwLock<McpService>>;

/// Keeps one running service per MCP server name
#[derive(Clone, Default)]
pub struct McpServiceManager {
    services: Arc<RwLock<HashMap<String, SharedService>>>,
}

impl McpServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the service for the given server configuration
    pub async fn get_or_create_service(
        &self,
        config: &McpServerConfig,
    ) -> Result<SharedService, Box<dyn Error + Send + Sync>> {
        if let Some(service) = self.get_service(&config.name).await {
            return Ok(service);
        }

        let mut services = self.services.write().await;
        // Another caller may have started it while we waited for the lock
        if let Some(service) = services.get(&config.name) {
            return Ok(service.clone());
        }

        log::info!(
            "Creating MCP service '{}' with command: {} {:?}",
            config.name,
            config.command,
            config.args
        );
        let service = Arc::new(RwLock::new(
            create_mcp_service(&config.command, &config.args).await?,
        ));
        services.insert(config.name.clone(), service.clone());
        Ok(service)
    }

    pub async fn get_service(&self, name: &str) -> Option<SharedService> {
        let services = self.services.read().await;
        services.get(name).cloned()
    }

    pub async fn server_names(&self) -> Vec<String> {
        let services = self.services.read().await;
        let mut names: Vec<String> = services.keys().cloned().collect();
        names.sort();
        names
    }
}
