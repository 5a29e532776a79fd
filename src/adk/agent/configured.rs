// SPDX-License-Identifier: MIT

//! Configured agent - instruction + tools bound to a runtime
//!
//! The reasoning loop itself lives behind the runtime port; this agent only
//! packages its own identity and configuration into each invocation.

use super::{Agent, AgentEvent};
use crate::adk::runtime::{AgentRuntime, Invocation, InvocationOptions};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct ConfiguredAgent {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub runtime: Arc<dyn AgentRuntime>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub options: InvocationOptions,
}

impl ConfiguredAgent {
    pub fn new(
        name: String,
        description: String,
        instruction: String,
        runtime: Arc<dyn AgentRuntime>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            name,
            description,
            instruction,
            runtime,
            tools,
            options: InvocationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }

    /// Names of the tools this agent may call
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn invocation<'a>(&'a self, input: &'a str) -> Invocation<'a> {
        Invocation {
            instruction: &self.instruction,
            tools: &self.tools,
            input,
            options: &self.options,
        }
    }
}

#[async_trait]
impl Agent for ConfiguredAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        log::info!(
            "Agent {} invoking runtime {} with {} tools",
            self.name,
            self.runtime.id(),
            self.tools.len()
        );
        self.runtime.invoke(self.invocation(&input)).await
    }

    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);

        // chunk_tx moves into the runtime call so the forwarder ends with it
        let invoke = self
            .runtime
            .invoke_stream(self.invocation(&input), chunk_tx);
        let forward = async {
            while let Some(chunk) = chunk_rx.recv().await {
                if tx.send(AgentEvent::Chunk(chunk)).await.is_err() {
                    break;
                }
            }
        };

        let (result, ()) = tokio::join!(invoke, forward);
        match &result {
            Ok(answer) => {
                let _ = tx.send(AgentEvent::Answer(answer.clone())).await;
            }
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_string())).await;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseRuntime;

    #[async_trait]
    impl AgentRuntime for UppercaseRuntime {
        fn id(&self) -> &str {
            "upper"
        }

        async fn invoke(
            &self,
            invocation: Invocation<'_>,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            Ok(format!(
                "{}|{}",
                invocation.instruction,
                invocation.input.to_uppercase()
            ))
        }

        async fn invoke_stream(
            &self,
            invocation: Invocation<'_>,
            chunks: mpsc::Sender<String>,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            for word in invocation.input.split_whitespace() {
                let _ = chunks.send(word.to_uppercase()).await;
            }
            self.invoke(invocation).await
        }
    }

    fn agent() -> ConfiguredAgent {
        ConfiguredAgent::new(
            "shouter".to_string(),
            "Shouts back".to_string(),
            "be loud".to_string(),
            Arc::new(UppercaseRuntime),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_run_passes_instruction_and_input() {
        let result = agent().run("hi there".to_string()).await.unwrap();
        assert_eq!(result, "be loud|HI THERE");
    }

    #[tokio::test]
    async fn test_run_stream_forwards_chunks_then_answer() {
        let (tx, mut rx) = mpsc::channel(16);
        let result = agent().run_stream("a b".to_string(), tx).await.unwrap();
        assert_eq!(result, "be loud|A B");

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(&events[0], AgentEvent::Chunk(c) if c == "A"));
        assert!(matches!(&events[1], AgentEvent::Chunk(c) if c == "B"));
        assert!(matches!(events.last(), Some(AgentEvent::Answer(_))));
    }
}
