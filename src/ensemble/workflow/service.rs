// SPDX-License-Identifier: MIT

//! Orchestration service: compile, cache and execute graph workflows
//!
//! Compiled graphs are cached per connection (agent runtime) and graph id
//! so a connection can drop all of its graphs at once. Each key is compiled
//! at most once, even when concurrent callers race for it.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tokio_stream::wrappers::ReceiverStream;

use super::graph::research::DEEP_RESEARCH_GRAPH;
use super::graph::{
    deep_research_graph, validate, CompileContext, CompiledGraph, GraphCompiler, GraphConfig,
    GraphEvent, NodeExecutorRegistry, ResearchResult, DEFAULT_STREAM_BUFFER,
};
use super::loader::ConfigLoader;
use super::registry::ToolRegistry;
use crate::adk::error::ConfigError;
use crate::adk::runtime::AgentRuntime;

type GraphCell = Arc<OnceCell<Arc<CompiledGraph>>>;

/// Identity of a compiled graph: the connection it was compiled against
/// plus the graph id. Either part may contain any character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub connection: String,
    pub graph: String,
}

impl CacheKey {
    pub fn new(graph_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            connection: connection_id.into(),
            graph: graph_id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connection, self.graph)
    }
}

/// Outcome of a graph execution: the final state, or the failure
#[derive(Debug, Clone, Serialize)]
pub struct GraphExecution {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphExecution {
    pub fn completed(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Result of checking a raw graph config without compiling it
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct OrchestrationService {
    compiler: GraphCompiler,
    executors: NodeExecutorRegistry,
    tools: ToolRegistry,
    cache: RwLock<HashMap<CacheKey, GraphCell>>,
}

impl OrchestrationService {
    pub fn new(executors: NodeExecutorRegistry, tools: ToolRegistry) -> Self {
        Self {
            compiler: GraphCompiler::new(executors.clone()),
            executors,
            tools,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Service with the built-in node types
    pub fn with_defaults(tools: ToolRegistry) -> Self {
        Self::new(NodeExecutorRegistry::with_defaults(), tools)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn cache_key(graph_id: &str, connection_id: &str) -> CacheKey {
        CacheKey::new(graph_id, connection_id)
    }

    fn context(&self, runtime: Arc<dyn AgentRuntime>) -> CompileContext {
        CompileContext {
            runtime,
            tools: self.tools.clone(),
        }
    }

    /// Compile without touching the cache
    pub async fn compile(
        &self,
        config: &GraphConfig,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Result<Arc<CompiledGraph>, ConfigError> {
        let ctx = self.context(runtime);
        Ok(Arc::new(self.compiler.compile(config, &ctx).await?))
    }

    /// Return the cached graph for `key`, compiling it on first use
    pub async fn compile_cached(
        &self,
        key: &CacheKey,
        config: &GraphConfig,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Result<Arc<CompiledGraph>, ConfigError> {
        let cell = {
            let mut cache = self.cache.write().await;
            cache.entry(key.clone()).or_default().clone()
        };

        let result = cell
            .get_or_try_init(|| async {
                log::info!("Compiling graph {} for cache key {}", config.name, key);
                self.compile(config, runtime).await
            })
            .await
            .cloned();

        if result.is_err() {
            let mut cache = self.cache.write().await;
            if cache.get(key).is_some_and(|c| !c.initialized()) {
                cache.remove(key);
            }
        }
        result
    }

    pub async fn cached(&self, key: &CacheKey) -> Option<Arc<CompiledGraph>> {
        let cache = self.cache.read().await;
        cache.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Compile and run once, uncached
    pub async fn execute(
        &self,
        config: &GraphConfig,
        runtime: Arc<dyn AgentRuntime>,
        initial: &Map<String, Value>,
    ) -> GraphExecution {
        match self.compile(config, runtime).await {
            Ok(graph) => Self::execute_graph(&graph, initial).await,
            Err(e) => GraphExecution::failed(format!("Configuration error: {}", e)),
        }
    }

    pub async fn execute_cached(
        &self,
        key: &CacheKey,
        config: &GraphConfig,
        runtime: Arc<dyn AgentRuntime>,
        initial: &Map<String, Value>,
    ) -> GraphExecution {
        match self.compile_cached(key, config, runtime).await {
            Ok(graph) => Self::execute_graph(&graph, initial).await,
            Err(e) => GraphExecution::failed(format!("Configuration error: {}", e)),
        }
    }

    /// Run a graph that must already be cached
    pub async fn execute_from_cache(&self, key: &CacheKey, initial: &Map<String, Value>) -> GraphExecution {
        match self.cached(key).await {
            Some(graph) => Self::execute_graph(&graph, initial).await,
            None => {
                log::warn!("No cached graph for key {}", key);
                GraphExecution::failed(format!("no cached graph for key '{}'", key))
            }
        }
    }

    async fn execute_graph(graph: &Arc<CompiledGraph>, initial: &Map<String, Value>) -> GraphExecution {
        match graph.invoke(initial).await {
            Ok(state) => GraphExecution::completed(state.to_json()),
            Err(failure) => GraphExecution::failed(failure.error.to_string()),
        }
    }

    pub async fn stream(
        &self,
        config: &GraphConfig,
        runtime: Arc<dyn AgentRuntime>,
        initial: Map<String, Value>,
    ) -> Result<ReceiverStream<GraphEvent>, ConfigError> {
        let graph = self.compile(config, runtime).await?;
        Ok(graph.stream(initial, DEFAULT_STREAM_BUFFER))
    }

    pub async fn stream_cached(
        &self,
        key: &CacheKey,
        config: &GraphConfig,
        runtime: Arc<dyn AgentRuntime>,
        initial: Map<String, Value>,
    ) -> Result<ReceiverStream<GraphEvent>, ConfigError> {
        let graph = self.compile_cached(key, config, runtime).await?;
        Ok(graph.stream(initial, DEFAULT_STREAM_BUFFER))
    }

    fn research_key(runtime: &dyn AgentRuntime, max_iterations: u32, threshold: f64) -> CacheKey {
        Self::cache_key(
            &format!("{}_{}_{}", DEEP_RESEARCH_GRAPH, max_iterations, threshold),
            runtime.id(),
        )
    }

    fn question(question: &str) -> Map<String, Value> {
        let mut initial = Map::new();
        initial.insert("question".to_string(), Value::String(question.to_string()));
        initial
    }

    /// Run the built-in deep research graph on a question
    pub async fn research(
        &self,
        runtime: Arc<dyn AgentRuntime>,
        question: &str,
        max_iterations: u32,
        threshold: f64,
    ) -> ResearchResult {
        let key = Self::research_key(runtime.as_ref(), max_iterations, threshold);
        let config = deep_research_graph(max_iterations, threshold);
        match self.compile_cached(&key, &config, runtime).await {
            Ok(graph) => graph.run(&Self::question(question)).await,
            Err(e) => ResearchResult {
                question: question.to_string(),
                answer: String::new(),
                analysis: String::new(),
                quality_score: 0.0,
                iteration_count: 0,
                success: false,
                error_message: Some(format!("Configuration error: {}", e)),
            },
        }
    }

    pub async fn research_stream(
        &self,
        runtime: Arc<dyn AgentRuntime>,
        question: &str,
        max_iterations: u32,
        threshold: f64,
    ) -> Result<ReceiverStream<GraphEvent>, ConfigError> {
        let key = Self::research_key(runtime.as_ref(), max_iterations, threshold);
        let config = deep_research_graph(max_iterations, threshold);
        self.stream_cached(&key, &config, runtime, Self::question(question))
            .await
    }

    /// Drop every graph compiled for a connection
    pub async fn invalidate_connection(&self, connection_id: &str) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|key, _| key.connection != connection_id);
        let removed = before - cache.len();
        log::info!("Invalidated {} cached graph(s) for connection {}", removed, connection_id);
        removed
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        log::info!("Clearing {} cached graph(s)", cache.len());
        cache.clear();
    }

    pub async fn cached_keys(&self) -> Vec<CacheKey> {
        let cache = self.cache.read().await;
        let mut keys: Vec<CacheKey> = cache.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Parse and validate a JSON graph config without compiling it
    pub fn validate_config_json(&self, text: &str) -> ValidationReport {
        let config: GraphConfig = match ConfigLoader::parse_json(text) {
            Ok(config) => config,
            Err(e) => {
                return ValidationReport {
                    valid: false,
                    name: None,
                    node_count: 0,
                    edge_count: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        let error = validate(&config).err().map(|e| e.to_string());
        ValidationReport {
            valid: error.is_none(),
            name: Some(config.name),
            node_count: config.nodes.len(),
            edge_count: config.edges.len(),
            error,
        }
    }

    /// Node type tag to description
    pub fn available_node_types(&self) -> BTreeMap<String, String> {
        self.executors.available_types()
    }

    pub fn node_type_schema(&self, node_type: &str) -> Option<Value> {
        self.executors.config_schema(node_type)
    }
}
