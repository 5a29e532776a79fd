// SPDX-License-Identifier: MIT

use crate::adk::tool::Tool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, case-insensitive tool lookup
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_lowercase(), tool);
    }

    /// Look up a tool; `Weather`, `weather_tool` and `WeatherTools` all find `weather`
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        let lowered = name.trim().to_lowercase();
        if let Some(tool) = tools.get(&lowered) {
            return Some(tool.clone());
        }

        let wanted = canonical(&lowered);
        tools
            .iter()
            .find(|(key, _)| canonical(key) == wanted)
            .map(|(_, tool)| tool.clone())
    }

    /// Registered tool names, sorted
    pub async fn list(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<String> = tools.values().map(|t| t.name().to_string()).collect();
        names.sort();
        names
    }

    /// Resolve names to tools, dropping unknown names with a warning and
    /// removing case-insensitive duplicates
    pub async fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<dyn Tool>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            match self.get(name).await {
                Some(tool) => {
                    if seen.insert(tool.name().to_lowercase()) {
                        resolved.push(tool);
                    }
                }
                None => log::warn!("Tool not found: {}", name),
            }
        }

        resolved
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical(name: &str) -> &str {
    let stripped = name
        .strip_suffix("tools")
        .or_else(|| name.strip_suffix("tool"))
        .unwrap_or(name);
    let stripped = stripped.trim_end_matches(['_', '-']);

    match stripped.chars().last() {
        Some(c) if c.is_alphanumeric() => stripped,
        _ => name,
    }
}
