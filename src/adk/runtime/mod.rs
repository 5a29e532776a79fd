// SPDX-License-Identifier: MIT

//! Single-agent invocation port
//!
//! The engine never plans tool calls itself. Given an instruction, a tool
//! set and an input, an [`AgentRuntime`] runs whatever reasoning loop it
//! implements and returns the final text.

mod command;

pub use command::CommandRuntime;

use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sampling options forwarded to the runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// One request to the runtime
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub instruction: &'a str,
    pub tools: &'a [Arc<dyn Tool>],
    pub input: &'a str,
    pub options: &'a InvocationOptions,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Connection identity; compiled graphs are cached per runtime id
    fn id(&self) -> &str;

    async fn invoke(
        &self,
        invocation: Invocation<'_>,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Streaming variant: text chunks go to `chunks` as they are produced,
    /// the full answer is returned at the end.
    async fn invoke_stream(
        &self,
        invocation: Invocation<'_>,
        chunks: mpsc::Sender<String>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let text = self.invoke(invocation).await?;
        let _ = chunks.send(text.clone()).await;
        Ok(text)
    }
}
