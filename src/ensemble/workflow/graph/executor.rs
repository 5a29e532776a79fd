// SPDX-License-Identifier: MIT

//! Graph execution
//!
//! A [`GraphRun`] owns one run's state and steps through the compiled graph
//! one node at a time. The synchronous API drives it to completion; the
//! streaming API drives it on a spawned task and pushes a progress event
//! after every node, followed by exactly one terminal event.

use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::compiler::{CompiledGraph, Target, Transition};
use super::config::START;
use super::projection::{GraphEvent, ResearchResult, ResultProjection};
use crate::adk::error::EnsembleError;
use crate::ensemble::workflow::state::{StateSnapshot, WorkflowState};

/// Default buffer between the stepping task and a stream consumer
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// A failed run, with the last state every completed node agreed on
#[derive(Debug, Error)]
#[error("{error}")]
pub struct GraphRunError {
    #[source]
    pub error: EnsembleError,
    /// Node that was executing when the run failed
    pub node: Option<String>,
    pub state: WorkflowState,
}

/// One in-flight execution of a compiled graph
pub struct GraphRun {
    graph: Arc<CompiledGraph>,
    state: WorkflowState,
    frontier: VecDeque<String>,
    visits: HashMap<String, u32>,
    reached_end: bool,
    current: Option<String>,
}

impl GraphRun {
    fn new(graph: Arc<CompiledGraph>, overrides: &Map<String, Value>) -> Result<Self, EnsembleError> {
        let mut initial = graph.initial_values.clone();
        for (key, value) in overrides {
            initial.insert(key.clone(), value.clone());
        }
        let state = WorkflowState::with_initial(&graph.state_keys, &initial, graph.unknown_keys)?;

        let mut run = Self {
            graph,
            state,
            frontier: VecDeque::new(),
            visits: HashMap::new(),
            reached_end: false,
            current: None,
        };
        let entry = run.resolve(START)?;
        run.enqueue(entry);
        Ok(run)
    }

    /// Execute the next pending node.
    ///
    /// Returns the id of the node that ran, or `None` once the run reached
    /// END with nothing left to execute.
    pub async fn step(&mut self) -> Result<Option<String>, EnsembleError> {
        let Some(node_id) = self.frontier.pop_front() else {
            if self.reached_end {
                return Ok(None);
            }
            return Err(EnsembleError::RunFailure(format!(
                "graph '{}' stopped without reaching END",
                self.graph.name
            )));
        };
        self.current = Some(node_id.clone());

        let visits = self.visits.entry(node_id.clone()).or_insert(0);
        *visits += 1;
        if *visits > self.graph.max_node_visits {
            return Err(EnsembleError::RunFailure(format!(
                "node '{}' exceeded {} visits",
                node_id, self.graph.max_node_visits
            )));
        }

        let node = self.graph.nodes.get(&node_id).ok_or_else(|| {
            EnsembleError::RunFailure(format!("node '{}' is not part of the graph", node_id))
        })?;

        log::info!("Executing node: {} ({})", node.id, node.node_type);
        let update = node.action.run(self.state.snapshot()).await.map_err(|e| match e {
            EnsembleError::NodeExecution { .. }
            | EnsembleError::Timeout { .. }
            | EnsembleError::Configuration(_) => e,
            other => EnsembleError::node(&node_id, other.to_string()),
        })?;
        self.state.apply(update);

        let next = self.resolve(&node_id)?;
        self.enqueue(next);
        Ok(Some(node_id))
    }

    fn resolve(&mut self, from: &str) -> Result<Vec<String>, EnsembleError> {
        let transition = self.graph.transitions.get(from).ok_or_else(|| {
            EnsembleError::RunFailure(format!("no transition out of '{}'", from))
        })?;

        let targets = match transition {
            Transition::Goto(target) => vec![target.clone()],
            Transition::Fanout(targets) => targets.clone(),
            Transition::Branch { router, routes } => {
                let label = router.route(&self.state);
                log::debug!("Router at {} chose '{}'", from, label);
                let target = routes
                    .get(&label)
                    .ok_or_else(|| EnsembleError::routing(from, &label))?;
                vec![target.clone()]
            }
        };

        let mut nodes = Vec::with_capacity(targets.len());
        for target in targets {
            match target {
                Target::End => self.reached_end = true,
                Target::Node(id) => nodes.push(id),
            }
        }
        Ok(nodes)
    }

    fn enqueue(&mut self, nodes: Vec<String>) {
        for id in nodes {
            if !self.frontier.contains(&id) {
                self.frontier.push_back(id);
            }
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Node currently (or most recently) executing
    pub fn current_node(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn into_state(self) -> WorkflowState {
        self.state
    }
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn max_node_visits(&self) -> u32 {
        self.max_node_visits
    }

    pub fn projection(&self) -> &ResultProjection {
        &self.projection
    }

    /// Start a run; initial values override the graph's declared ones
    pub fn start(self: &Arc<Self>, initial: &Map<String, Value>) -> Result<GraphRun, EnsembleError> {
        GraphRun::new(Arc::clone(self), initial)
    }

    /// Run to END and return the final state
    pub async fn invoke(
        self: &Arc<Self>,
        initial: &Map<String, Value>,
    ) -> Result<WorkflowState, GraphRunError> {
        let mut run = self.start(initial).map_err(|error| GraphRunError {
            error,
            node: None,
            state: WorkflowState::empty(),
        })?;

        loop {
            match run.step().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    log::info!("Graph {} completed", self.name);
                    return Ok(run.into_state());
                }
                Err(error) => {
                    log::error!("Graph {} failed: {}", self.name, error);
                    let node = run.current_node().map(str::to_string);
                    return Err(GraphRunError {
                        error,
                        node,
                        state: run.into_state(),
                    });
                }
            }
        }
    }

    /// Run to END and project the final state into a result
    pub async fn run(self: &Arc<Self>, initial: &Map<String, Value>) -> ResearchResult {
        match self.invoke(initial).await {
            Ok(state) => self.projection.result(&state.snapshot(), true, None),
            Err(failure) => self.projection.result(
                &failure.state.snapshot(),
                false,
                Some(failure.error.to_string()),
            ),
        }
    }

    /// Run on a background task, streaming one event per completed node.
    ///
    /// Dropping the stream stops the run before its next node starts; the
    /// node in flight is abandoned.
    pub fn stream(
        self: &Arc<Self>,
        initial: Map<String, Value>,
        buffer: usize,
    ) -> ReceiverStream<GraphEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let graph = Arc::clone(self);
        tokio::spawn(async move {
            graph.drive(initial, tx).await;
        });
        ReceiverStream::new(rx)
    }

    async fn drive(self: Arc<Self>, initial: Map<String, Value>, tx: mpsc::Sender<GraphEvent>) {
        let mut run = match self.start(&initial) {
            Ok(run) => run,
            Err(e) => {
                let result =
                    self.projection
                        .result(&StateSnapshot::default(), false, Some(e.to_string()));
                let _ = tx
                    .send(GraphEvent::Failed {
                        node: None,
                        error: e.to_string(),
                        result,
                    })
                    .await;
                return;
            }
        };

        loop {
            let step = tokio::select! {
                step = run.step() => step,
                _ = tx.closed() => {
                    log::info!("Stream for graph {} closed by consumer", self.name);
                    return;
                }
            };

            let event = match step {
                Ok(Some(node_id)) => {
                    GraphEvent::Progress(self.projection.progress(&node_id, run.state().snapshot()))
                }
                Ok(None) => {
                    log::info!("Graph {} completed", self.name);
                    let result = self.projection.result(&run.state().snapshot(), true, None);
                    let _ = tx.send(GraphEvent::Completed(result)).await;
                    return;
                }
                Err(e) => {
                    log::error!("Graph {} failed: {}", self.name, e);
                    let result = self.projection.result(
                        &run.state().snapshot(),
                        false,
                        Some(e.to_string()),
                    );
                    let _ = tx
                        .send(GraphEvent::Failed {
                            node: run.current_node().map(str::to_string),
                            error: e.to_string(),
                            result,
                        })
                        .await;
                    return;
                }
            };

            if tx.send(event).await.is_err() {
                log::info!("Stream for graph {} closed by consumer", self.name);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{ConfigError, ErrorKind};
    use crate::adk::runtime::{AgentRuntime, Invocation};
    use crate::ensemble::workflow::graph::compiler::GraphCompiler;
    use crate::ensemble::workflow::graph::config::{EdgeConfig, GraphConfig, NodeConfig, END};
    use crate::ensemble::workflow::graph::node::{CompileContext, NodeExecutorRegistry};
    use crate::ensemble::workflow::graph::router::RouterConfig;
    use crate::ensemble::workflow::registry::ToolRegistry;
    use crate::ensemble::workflow::state::StateKey;
    use async_trait::async_trait;
    use serde_json::json;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    /// Returns `50 + 30 * n` on its n-th call
    struct RisingScores {
        calls: AtomicUsize,
        step: u64,
    }

    #[async_trait]
    impl AgentRuntime for RisingScores {
        fn id(&self) -> &str {
            "rising"
        }
        async fn invoke(
            &self,
            _invocation: Invocation<'_>,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(format!("Score: {}", 50 + self.step * n))
        }
    }

    struct Failing;

    #[async_trait]
    impl AgentRuntime for Failing {
        fn id(&self) -> &str {
            "failing"
        }
        async fn invoke(
            &self,
            _invocation: Invocation<'_>,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("model unavailable".into())
        }
    }

    fn gate_graph() -> GraphConfig {
        GraphConfig::new("gate")
            .key(StateKey::replace("question"))
            .key(StateKey::replace("review"))
            .key(StateKey::replace("quality_score"))
            .key(StateKey::replace("iteration_count").with_default(json!(0)))
            .node(
                NodeConfig::new("review", "LLM_NODE")
                    .param("input_key", json!("question"))
                    .param("output_key", json!("review")),
            )
            .node(
                NodeConfig::new("score", "TRANSFORM_NODE")
                    .param("transform_type", json!("PARSE_NUMBER"))
                    .param("input_keys", json!(["review"]))
                    .param("output_key", json!("quality_score")),
            )
            .node(
                NodeConfig::new("count", "TRANSFORM_NODE")
                    .param("transform_type", json!("INCREMENT"))
                    .param("input_keys", json!(["iteration_count"]))
                    .param("output_key", json!("iteration_count")),
            )
            .edge(EdgeConfig::simple(START, "review"))
            .edge(EdgeConfig::simple("review", "score"))
            .edge(EdgeConfig::simple("score", "count"))
            .edge(
                EdgeConfig::conditional("count", &[("end", END), ("iterate", "review")]).with_router(
                    RouterConfig::quality_gate("quality_score", 80.0, "iteration_count", 3),
                ),
            )
    }

    async fn compile(config: &GraphConfig, runtime: Arc<dyn AgentRuntime>) -> Arc<CompiledGraph> {
        let ctx = CompileContext {
            runtime,
            tools: ToolRegistry::new(),
        };
        Arc::new(
            GraphCompiler::new(NodeExecutorRegistry::with_defaults())
                .compile(config, &ctx)
                .await
                .unwrap(),
        )
    }

    fn rising(step: u64) -> Arc<dyn AgentRuntime> {
        Arc::new(RisingScores {
            calls: AtomicUsize::new(0),
            step,
        })
    }

    fn question() -> Map<String, Value> {
        let mut initial = Map::new();
        initial.insert("question".to_string(), json!("Why is the sky blue?"));
        initial
    }

    // ========================================================================
    // Synchronous runs
    // ========================================================================

    #[tokio::test]
    async fn test_quality_gate_stops_when_threshold_reached() {
        let graph = compile(&gate_graph(), rising(30)).await;
        let state = graph.invoke(&question()).await.unwrap();

        assert_eq!(state.get("iteration_count"), &json!(2));
        assert_eq!(state.get("quality_score"), &json!(80));
        assert_eq!(state.get("current_node"), &json!("count"));
    }

    #[tokio::test]
    async fn test_quality_gate_caps_iterations() {
        let graph = compile(&gate_graph(), rising(0)).await;
        let result = graph.run(&question()).await;

        assert!(result.success);
        assert_eq!(result.iteration_count, 3);
        assert_eq!(result.quality_score, 50.0);
        assert_eq!(result.question, "Why is the sky blue?");
    }

    #[tokio::test]
    async fn test_unrouted_label_is_routing_error() {
        let config = GraphConfig::new("router")
            .key(StateKey::replace("question"))
            .node(
                NodeConfig::new("decide", "CONDITION_NODE")
                    .param("condition_field", json!("question"))
                    .param("routes", json!({"yes": "done"}))
                    .param("default_route", json!("elsewhere")),
            )
            .edge(EdgeConfig::simple(START, "decide"))
            .edge(EdgeConfig::conditional("decide", &[("done", END)]));

        let graph = compile(&config, rising(0)).await;
        let failure = graph.invoke(&question()).await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Routing);
        assert_eq!(failure.node.as_deref(), Some("decide"));
        assert_eq!(failure.state.get("next_node"), &json!("elsewhere"));
    }

    #[tokio::test]
    async fn test_node_failure_keeps_last_good_state() {
        let mut config = gate_graph();
        config.edges.retain(|e| e.from != "count");
        config.edges.push(EdgeConfig::simple("count", END));

        let graph = compile(&config, Arc::new(Failing)).await;
        let failure = graph.invoke(&question()).await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::NodeExecution);
        assert_eq!(failure.node.as_deref(), Some("review"));
        assert_eq!(failure.state.get("question"), &json!("Why is the sky blue?"));
        assert_eq!(failure.state.get("review"), &Value::Null);

        let result = graph.run(&question()).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_unknown_initial_key_rejected() {
        let graph = compile(&gate_graph(), rising(0)).await;
        let mut initial = question();
        initial.insert("bogus".to_string(), json!(1));

        let failure = graph.invoke(&initial).await.unwrap_err();
        assert!(matches!(
            failure.error,
            EnsembleError::Configuration(ConfigError::UnknownInitialKeys(_))
        ));
    }

    #[tokio::test]
    async fn test_visit_guard_stops_runaway_loop() {
        let mut config = GraphConfig::new("spin")
            .key(StateKey::replace("n"))
            .node(
                NodeConfig::new("tick", "TRANSFORM_NODE")
                    .param("transform_type", json!("INCREMENT"))
                    .param("input_keys", json!(["n"]))
                    .param("output_key", json!("n")),
            )
            .edge(EdgeConfig::simple(START, "tick"))
            .edge(EdgeConfig::simple("tick", "tick"));
        config.max_node_visits = Some(4);

        let graph = compile(&config, rising(0)).await;
        let failure = graph.invoke(&Map::new()).await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::RunFailure);
        assert_eq!(failure.state.get("n"), &json!(4));
    }

    #[tokio::test]
    async fn test_fanout_runs_each_target() {
        let config = GraphConfig::new("fan")
            .key(StateKey::append("log"))
            .node(
                NodeConfig::new("a", "TRANSFORM_NODE")
                    .param("transform_type", json!("FORMAT"))
                    .param("input_keys", json!(["current_node"]))
                    .param("output_key", json!("log")),
            )
            .node(
                NodeConfig::new("b", "TRANSFORM_NODE")
                    .param("transform_type", json!("FORMAT"))
                    .param("input_keys", json!(["current_node"]))
                    .param("output_key", json!("log")),
            )
            .edge(EdgeConfig::simple(START, "a"))
            .edge(EdgeConfig::simple(START, "b"))
            .edge(EdgeConfig::simple("a", END))
            .edge(EdgeConfig::simple("b", END));

        let graph = compile(&config, rising(0)).await;
        let state = graph.invoke(&Map::new()).await.unwrap();
        assert_eq!(
            state.get("log"),
            &json!(["current_node:", "current_node: a"])
        );
    }

    // ========================================================================
    // Streaming runs
    // ========================================================================

    #[tokio::test]
    async fn test_stream_emits_progress_then_completion() {
        let graph = compile(&gate_graph(), rising(30)).await;
        let events: Vec<GraphEvent> = graph
            .stream(question(), DEFAULT_STREAM_BUFFER)
            .collect()
            .await;

        // two iterations of three nodes plus the terminal event
        assert_eq!(events.len(), 7);
        assert!(events[..6].iter().all(|e| !e.is_terminal()));
        match &events[0] {
            GraphEvent::Progress(p) => assert_eq!(p.node_name, "review"),
            other => panic!("unexpected event {:?}", other),
        }
        match events.last().unwrap() {
            GraphEvent::Completed(result) => {
                assert!(result.success);
                assert_eq!(result.iteration_count, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_reports_failure_as_terminal_event() {
        let graph = compile(&gate_graph(), Arc::new(Failing)).await;
        let events: Vec<GraphEvent> = graph.stream(question(), 4).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            GraphEvent::Failed { node, result, .. } => {
                assert_eq!(node.as_deref(), Some("review"));
                assert!(!result.success);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_run() {
        let runtime = Arc::new(RisingScores {
            calls: AtomicUsize::new(0),
            step: 0,
        });
        let mut config = gate_graph();
        config.max_node_visits = Some(100);
        if let Some(edge) = config.edges.last_mut() {
            edge.router = Some(RouterConfig::quality_gate(
                "quality_score",
                101.0,
                "iteration_count",
                100,
            ));
        }
        let graph = compile(&config, runtime.clone()).await;

        let mut stream = graph.stream(question(), 1);
        let first = stream.next().await.unwrap();
        assert!(!first.is_terminal());
        drop(stream);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let calls = runtime.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runtime.calls.load(Ordering::SeqCst), calls);
        assert!(calls < 100);
    }
}
