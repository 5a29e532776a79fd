// SPDX-License-Identifier: MIT

//! Agent module - the invocation handle every workflow consumes
//!
//! An [`Agent`] is an opaque, named unit that turns text input into text
//! output. The engine never looks inside; [`ConfiguredAgent`] is the
//! standard implementation that binds an instruction and a tool set to an
//! [`AgentRuntime`](crate::adk::runtime::AgentRuntime).

mod configured;

pub use configured::ConfiguredAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    Chunk(String),
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
    ToolResult {
        name: String,
        result: serde_json::Value,
    },
    Answer(String),
    Error(String),
    Log(String),
}

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Returns what the agent is for; used when the agent is exposed as a tool
    fn description(&self) -> &str {
        ""
    }

    /// Run the agent with the given input
    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Run the agent with streaming events
    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        // Default implementation falls back to run()
        match self.run(input).await {
            Ok(res) => {
                let _ = tx.send(AgentEvent::Answer(res.clone())).await;
                Ok(res)
            }
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                Err(e)
            }
        }
    }
}
