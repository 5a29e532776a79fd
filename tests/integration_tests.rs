// SPDX-License-Identifier: MIT

//! Integration tests for config loading, graph runs, patterns and supervisors
//!
//! These tests verify end-to-end workflow functionality using mock components.

use async_trait::async_trait;
use ensemble_rs::adk::agent::Agent;
use ensemble_rs::adk::error::{ConfigError, EnsembleError, ErrorKind};
use ensemble_rs::adk::runtime::{AgentRuntime, Invocation};
use ensemble_rs::adk::tool::Tool;
use ensemble_rs::ensemble::workflow::agent_factory::AgentFactory;
use ensemble_rs::ensemble::workflow::graph::{
    default_deep_research_graph, validate, GraphConfig, GraphEvent,
};
use ensemble_rs::ensemble::workflow::loader::ConfigLoader;
use ensemble_rs::ensemble::workflow::pattern::{
    AgentSlot, PatternConfig, PatternRunner, StepStatus, WorkflowPattern,
};
use ensemble_rs::ensemble::workflow::registry::ToolRegistry;
use ensemble_rs::ensemble::workflow::service::OrchestrationService;
use ensemble_rs::ensemble::workflow::supervisor::SupervisorTeam;
use ensemble_rs::ensemble::workflow::types::{EngineConfig, PatternDefinition, SupervisorDefinition};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_stream::StreamExt;

// ============================================================================
// Mock Components
// ============================================================================

/// Runtime that answers by instruction and calls tools named in the input
struct ScriptedRuntime {
    reviews: AtomicUsize,
    invocations: AtomicUsize,
}

impl ScriptedRuntime {
    fn new() -> Self {
        Self {
            reviews: AtomicUsize::new(0),
            invocations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        invocation: Invocation<'_>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let instruction = invocation.instruction;

        if instruction.starts_with("You are a research planner") {
            return Ok("What is it?\nWhy does it matter?".to_string());
        }
        if instruction.starts_with("You are a strict reviewer") {
            let round = self.reviews.fetch_add(1, Ordering::SeqCst);
            return Ok(format!("Score: {}\nAdd examples.", 70 + 20 * round));
        }
        if instruction.starts_with("You are a technical writer") {
            return Ok("Rust is a systems language.".to_string());
        }
        if instruction.starts_with("You are a research assistant")
            || instruction.starts_with("You are an analyst")
        {
            return Ok("notes".to_string());
        }

        let mut answers = Vec::new();
        for tool in invocation.tools {
            if invocation.input.contains(tool.name()) {
                let out = tool.execute(json!({"input": invocation.input})).await?;
                answers.push(match out.get("output") {
                    Some(Value::String(s)) => s.clone(),
                    _ => out.to_string(),
                });
            }
        }
        if answers.is_empty() {
            Ok(format!("{}: {}", instruction, invocation.input))
        } else {
            Ok(answers.join(" + "))
        }
    }
}

/// Static schema for MockTool
static MOCK_TOOL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "input": {"type": "string"}
        }
    })
});

/// Mock tool that returns predefined response
struct MockTool {
    name: String,
    description: String,
    response: Value,
}

impl MockTool {
    fn new(name: &str, response: Value) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Mock tool: {}", name),
            response,
        }
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &MOCK_TOOL_SCHEMA
    }

    async fn execute(&self, _input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(self.response.clone())
    }
}

/// Mock agent for testing
struct MockAgent {
    name: String,
    description: String,
    transform: fn(String) -> String,
}

impl MockAgent {
    fn new(name: &str, transform: fn(String) -> String) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Mock agent {}", name),
            transform,
        }
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok((self.transform)(input))
    }
}

struct FailingAgent;

#[async_trait]
impl Agent for FailingAgent {
    fn name(&self) -> &str {
        "failing"
    }

    async fn run(&self, _input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        Err("service unavailable".into())
    }
}

/// Records every input and replies from a fixed script
struct RecordingAgent {
    name: String,
    replies: Vec<&'static str>,
    inputs: Mutex<Vec<String>>,
}

impl RecordingAgent {
    fn new(name: &str, replies: Vec<&'static str>) -> Self {
        Self {
            name: name.to_string(),
            replies,
            inputs: Mutex::new(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut inputs = self.inputs.lock().unwrap();
        inputs.push(input);
        let i = (inputs.len() - 1).min(self.replies.len() - 1);
        Ok(self.replies[i].to_string())
    }
}

fn question(text: &str) -> Map<String, Value> {
    let mut initial = Map::new();
    initial.insert("question".to_string(), json!(text));
    initial
}

// ============================================================================
// Config Loading Tests
// ============================================================================

const ENGINE_YAML: &str = r#"
default_runtime: scripted
agents:
  - name: researcher
    description: Finds facts
    instruction: research
    tools: [lookup]
  - name: writer
    description: Writes prose
    instruction: write
"#;

#[test]
fn test_load_graph_with_camel_case_aliases() {
    let graph: GraphConfig = ConfigLoader::parse_json(
        r#"{
            "name": "review",
            "stateKeys": [{"key": "draft"}, {"key": "notes", "mergeStrategy": "append"}],
            "initialValues": {"draft": ""},
            "nodes": [{"id": "edit", "type": "LLM_NODE", "config": {"input_key": "draft", "output_key": "notes"}}],
            "edges": [{"from": "START", "to": "edit"}, {"from": "edit", "to": "END"}]
        }"#,
    )
    .unwrap();

    assert_eq!(graph.state_keys.len(), 2);
    assert_eq!(graph.nodes[0].node_type, "LLM_NODE");
    validate(&graph).unwrap();
}

#[test]
fn test_deep_research_preset_validates() {
    let graph = default_deep_research_graph();
    validate(&graph).unwrap();
    assert_eq!(graph.nodes.len(), 8);
}

#[test]
fn test_invalid_yaml_returns_malformed() {
    let result = ConfigLoader::parse_yaml::<EngineConfig>("agents: [unclosed");
    assert!(matches!(result, Err(ConfigError::Malformed(_))));
}

// ============================================================================
// Graph Execution Tests
// ============================================================================

#[tokio::test]
async fn test_deep_research_end_to_end() {
    let runtime = Arc::new(ScriptedRuntime::new());
    let service = OrchestrationService::with_defaults(ToolRegistry::new());

    let result = service.research(runtime.clone(), "What is Rust?", 3, 80.0).await;

    assert!(result.success, "{:?}", result.error_message);
    // scores 70 then 90
    assert_eq!(result.iteration_count, 2);
    assert_eq!(result.quality_score, 90.0);
    assert_eq!(result.answer, "Rust is a systems language.");
    assert_eq!(result.question, "What is Rust?");
    assert_eq!(runtime.reviews.load(Ordering::SeqCst), 2);
    assert_eq!(service.cached_keys().await.len(), 1);
}

#[tokio::test]
async fn test_deep_research_stream_progress() {
    let service = OrchestrationService::with_defaults(ToolRegistry::new());
    let events: Vec<GraphEvent> = service
        .research_stream(Arc::new(ScriptedRuntime::new()), "What is Rust?", 3, 80.0)
        .await
        .unwrap()
        .collect()
        .await;

    // 8 nodes in the first round, 6 in the second, then completion
    assert_eq!(events.len(), 15);
    match &events[0] {
        GraphEvent::Progress(progress) => assert_eq!(progress.node_name, "query_decomposition"),
        other => panic!("unexpected first event {:?}", other),
    }
    assert!(events[..14].iter().all(|e| !e.is_terminal()));
    assert!(matches!(&events[14], GraphEvent::Completed(r) if r.iteration_count == 2));
}

#[tokio::test]
async fn test_cache_reuse_across_connections() {
    let service = OrchestrationService::with_defaults(ToolRegistry::new());
    let runtime: Arc<dyn AgentRuntime> = Arc::new(ScriptedRuntime::new());
    let graph = default_deep_research_graph();

    let a = OrchestrationService::cache_key("research", "1");
    let b = OrchestrationService::cache_key("research", "2");
    service.compile_cached(&a, &graph, runtime.clone()).await.unwrap();
    service.compile_cached(&b, &graph, runtime).await.unwrap();

    let first = service.execute_from_cache(&a, &question("Why?")).await;
    assert!(first.success);
    assert_eq!(first.data.unwrap()["final_answer"], json!("Rust is a systems language."));

    service.invalidate_connection("1").await;
    assert!(!service.execute_from_cache(&a, &question("Why?")).await.success);
    assert!(service.execute_from_cache(&b, &question("Why?")).await.success);
}

#[tokio::test]
async fn test_cache_keys_with_underscores_do_not_collide() {
    let service = OrchestrationService::with_defaults(ToolRegistry::new());
    let runtime: Arc<dyn AgentRuntime> = Arc::new(ScriptedRuntime::new());
    let graph = default_deep_research_graph();

    let plain = OrchestrationService::cache_key("deep_research", "team");
    let prefixed = OrchestrationService::cache_key("research", "team_deep");
    service.compile_cached(&plain, &graph, runtime.clone()).await.unwrap();
    service.compile_cached(&prefixed, &graph, runtime).await.unwrap();
    assert_eq!(service.cached_keys().await.len(), 2);

    assert_eq!(service.invalidate_connection("team").await, 1);
    assert!(service.execute_from_cache(&prefixed, &question("Why?")).await.success);
}

// ============================================================================
// Pattern Tests
// ============================================================================

#[tokio::test]
async fn test_sequential_chains_and_stops_on_failure() {
    let config = PatternConfig::new(WorkflowPattern::Sequential)
        .agent(AgentSlot::new(Arc::new(MockAgent::new("draft", |s| format!("{} drafted", s)))))
        .agent(AgentSlot::new(Arc::new(FailingAgent)))
        .agent(AgentSlot::new(Arc::new(MockAgent::new("polish", |s| s))));

    let result = PatternRunner::new().run("essay", &config).await;

    assert!(!result.success);
    assert_eq!(result.final_result.as_deref(), Some("essay drafted"));
    assert_eq!(result.agent_results[1].status, StepStatus::Failed);
    assert_eq!(result.agent_results[2].status, StepStatus::NotAttempted);
}

#[tokio::test]
async fn test_parallel_merges_contributions() {
    let judge = Arc::new(RecordingAgent::new("judge", vec!["verdict"]));
    let config = PatternConfig::new(WorkflowPattern::Parallel)
        .agent(AgentSlot::new(Arc::new(MockAgent::new("optimist", |_| "yes".to_string()))))
        .agent(AgentSlot::new(Arc::new(FailingAgent)))
        .merge_with(AgentSlot::new(judge.clone()), Some("Decide.".to_string()));

    let result = PatternRunner::new().run("ship it?", &config).await;

    assert!(result.success);
    assert_eq!(result.final_result.as_deref(), Some("verdict"));
    let merge_input = &judge.inputs()[0];
    assert!(merge_input.starts_with("Decide.\n\nResults from each expert:\n\n"));
    assert!(merge_input.contains("[optimist]\nyes"));
    assert!(merge_input.contains("[failing] failed: service unavailable"));
}

#[tokio::test]
async fn test_routing_picks_one_agent() {
    let router = Arc::new(RecordingAgent::new("router", vec!["  Writer  "]));
    let config = PatternConfig::new(WorkflowPattern::Routing)
        .agent(AgentSlot::new(Arc::new(MockAgent::new("researcher", |_| "facts".to_string()))))
        .agent(AgentSlot::new(Arc::new(MockAgent::new("writer", |s| format!("poem about {}", s)))))
        .route_with(AgentSlot::new(router.clone()), None);

    let result = PatternRunner::new().run("the sea", &config).await;

    assert!(result.success);
    assert_eq!(result.final_result.as_deref(), Some("poem about the sea"));
    assert!(result.agent("researcher").is_none());
    assert!(router.inputs()[0].contains("- name: writer, description: Mock agent writer"));
}

#[tokio::test]
async fn test_loop_refines_until_done() {
    let worker = Arc::new(RecordingAgent::new("worker", vec!["v1", "v2"]));
    let reviewer = Arc::new(RecordingAgent::new("reviewer", vec!["CONTINUE: too short", "DONE"]));
    let config = PatternConfig::new(WorkflowPattern::Loop)
        .agent(AgentSlot::new(worker.clone()))
        .loop_until(AgentSlot::new(reviewer), None, 5);

    let result = PatternRunner::new().run("write", &config).await;

    assert!(result.success);
    assert_eq!(result.final_result.as_deref(), Some("v2"));
    let second = &worker.inputs()[1];
    assert!(second.contains("Previous output:\nv1"));
    assert!(second.contains("too short"));
}

#[tokio::test]
async fn test_pattern_from_definition() {
    let engine: EngineConfig = ConfigLoader::parse_yaml(ENGINE_YAML).unwrap();
    let registry = ToolRegistry::new();
    let factory =
        AgentFactory::new(&engine, &registry).with_runtime("scripted", Arc::new(ScriptedRuntime::new()));
    let definition: PatternDefinition = ConfigLoader::parse_yaml(
        r#"
pattern: Parallel
name: duo
agents:
  - name: researcher
  - name: writer
"#,
    )
    .unwrap();

    let config = factory.build_pattern(&definition).await.unwrap();
    let result = PatternRunner::new().run("topic", &config).await;

    assert!(result.success);
    assert_eq!(
        result.final_result.as_deref(),
        Some("[researcher]\nresearch: topic\n\n[writer]\nwrite: topic")
    );
}

// ============================================================================
// Supervisor Tests
// ============================================================================

#[tokio::test]
async fn test_supervisor_calls_workers_through_tools() {
    let supervisor = SupervisorTeam::builder()
        .name("lead")
        .runtime(Arc::new(ScriptedRuntime::new()))
        .worker(Arc::new(MockAgent::new("researcher", |s| format!("found {}", s.len()))))
        .worker(Arc::new(MockAgent::new("writer", |_| "prose".to_string())))
        .build()
        .unwrap();

    assert_eq!(supervisor.tool_names(), vec!["researcher", "writer"]);
    let answer = supervisor.run("ask writer".to_string()).await.unwrap();
    assert_eq!(answer, "prose");
}

#[tokio::test]
async fn test_supervisor_from_definition_with_tools() {
    let engine: EngineConfig = ConfigLoader::parse_yaml(ENGINE_YAML).unwrap();
    let registry = ToolRegistry::new();
    registry
        .register(Arc::new(MockTool::new("lookup", json!({"output": "looked up"}))))
        .await;
    let factory =
        AgentFactory::new(&engine, &registry).with_runtime("scripted", Arc::new(ScriptedRuntime::new()));
    let definition: SupervisorDefinition = ConfigLoader::parse_yaml(
        r#"
name: lead
instruction: coordinate
workers:
  - ref: researcher
tools: [lookup, Lookup, missing]
"#,
    )
    .unwrap();

    let supervisor = factory.build_supervisor(&definition).await.unwrap();
    assert_eq!(supervisor.tool_names(), vec!["researcher", "lookup"]);

    // supervisor -> researcher tool -> researcher agent -> lookup tool
    let answer = supervisor
        .run("researcher should lookup".to_string())
        .await
        .unwrap();
    assert_eq!(answer, "looked up + looked up");
}

// ============================================================================
// Error Type Tests
// ============================================================================

#[test]
fn test_error_taxonomy() {
    let config = EnsembleError::from(ConfigError::NoAgents);
    assert_eq!(config.kind(), ErrorKind::Configuration);
    assert!(!config.is_retryable());

    let routing = EnsembleError::routing("gate", "sideways");
    assert_eq!(routing.kind(), ErrorKind::Routing);
    assert!(routing.to_string().contains("sideways"));

    let node = EnsembleError::node("synthesis", "timeout");
    assert_eq!(node.kind(), ErrorKind::NodeExecution);
    assert!(node.is_retryable());
}

#[test]
fn test_error_from_str() {
    let err: EnsembleError = "boom".into();
    assert_eq!(err.kind(), ErrorKind::RunFailure);
    assert_eq!(err.to_string(), "boom");
}
