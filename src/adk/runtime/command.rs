// SPDX-License-Identifier: MIT

//! Process-backed runtime speaking JSON lines over stdio
//!
//! One child process per invocation. The engine writes a single request
//! line, then serves tool calls until the child sends an answer or an
//! error:
//!
//! ```text
//! -> {"instruction": "...", "input": "...", "tools": [...], "temperature": 0.2}
//! <- {"chunk": "partial text"}
//! <- {"tool_call": {"name": "search", "arguments": {"q": "rust"}}}
//! -> {"tool_result": {"name": "search", "output": {...}}}
//! <- {"answer": "final text"}
//! ```

use super::{AgentRuntime, Invocation, InvocationOptions};
use crate::adk::error::EnsembleError;
use crate::adk::tool::{Tool, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

#[derive(Serialize)]
struct RuntimeRequest<'a> {
    instruction: &'a str,
    input: &'a str,
    tools: Vec<ToolSpec>,
    #[serde(flatten)]
    options: &'a InvocationOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RuntimeMessage {
    Chunk(String),
    ToolCall {
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    Answer(String),
    Error(String),
}

pub struct CommandRuntime {
    id: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Duration,
}

impl CommandRuntime {
    pub fn new(id: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(
        &self,
        invocation: Invocation<'_>,
        chunks: Option<&mpsc::Sender<String>>,
    ) -> Result<String, EnsembleError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EnsembleError::runtime(&self.id, "child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EnsembleError::runtime(&self.id, "child stdout unavailable"))?;

        let request = RuntimeRequest {
            instruction: invocation.instruction,
            input: invocation.input,
            tools: invocation
                .tools
                .iter()
                .map(|t| ToolSpec::of(t.as_ref()))
                .collect(),
            options: invocation.options,
        };
        write_line(&mut stdin, &serde_json::to_value(&request)?).await?;

        let mut lines = BufReader::new(stdout).lines();
        let mut collected = String::new();

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message = match serde_json::from_str::<RuntimeMessage>(trimmed) {
                Ok(message) => message,
                Err(_) => RuntimeMessage::Chunk(line.clone()),
            };

            match message {
                RuntimeMessage::Chunk(text) => {
                    collected.push_str(&text);
                    if let Some(tx) = chunks {
                        let _ = tx.send(text).await;
                    }
                }
                RuntimeMessage::ToolCall { name, arguments } => {
                    log::info!("Runtime {} tool call: {} {}", self.id, name, arguments);
                    let reply = call_tool(invocation.tools, &name, arguments).await;
                    write_line(&mut stdin, &json!({ "tool_result": reply })).await?;
                }
                RuntimeMessage::Answer(text) => return Ok(text),
                RuntimeMessage::Error(message) => {
                    return Err(EnsembleError::runtime(&self.id, message))
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() && collected.is_empty() {
            return Err(EnsembleError::runtime(
                &self.id,
                format!("process exited with {}", status),
            ));
        }
        Ok(collected)
    }
}

async fn write_line(
    stdin: &mut tokio::process::ChildStdin,
    value: &Value,
) -> Result<(), EnsembleError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

async fn call_tool(tools: &[Arc<dyn Tool>], name: &str, arguments: Value) -> Value {
    let Some(tool) = tools.iter().find(|t| t.name() == name) else {
        log::error!("Tool {} not found", name);
        return json!({ "name": name, "error": format!("Tool '{}' not found", name) });
    };

    match tool.execute(arguments).await {
        Ok(output) => json!({ "name": name, "output": output }),
        Err(e) => {
            log::error!("Tool {} failed: {}", name, e);
            json!({ "name": name, "error": e.to_string() })
        }
    }
}

#[async_trait]
impl AgentRuntime for CommandRuntime {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        invocation: Invocation<'_>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        match tokio::time::timeout(self.timeout, self.exchange(invocation, None)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Box::new(EnsembleError::runtime(
                &self.id,
                format!("invocation timed out after {:?}", self.timeout),
            ))),
        }
    }

    async fn invoke_stream(
        &self,
        invocation: Invocation<'_>,
        chunks: mpsc::Sender<String>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        match tokio::time::timeout(self.timeout, self.exchange(invocation, Some(&chunks))).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Box::new(EnsembleError::runtime(
                &self.id,
                format!("invocation timed out after {:?}", self.timeout),
            ))),
        }
    }
}
