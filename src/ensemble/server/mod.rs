// SPDX-License-Identifier: MIT

//! HTTP surface: graph validation and execution, pattern runs and cache
//! management, with SSE for streaming graph runs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::ConfigError;
use crate::adk::runtime::AgentRuntime;
use crate::ensemble::workflow::agent_factory::AgentFactory;
use crate::ensemble::workflow::graph::{GraphConfig, GraphEvent};
use crate::ensemble::workflow::pattern::{PatternRunner, WorkflowResult};
use crate::ensemble::workflow::service::{GraphExecution, OrchestrationService};
use crate::ensemble::workflow::types::{EngineConfig, PatternDefinition};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrchestrationService>,
    pub engine: Arc<EngineConfig>,
    runtimes: Arc<HashMap<String, Arc<dyn AgentRuntime>>>,
    patterns: PatternRunner,
}

impl AppState {
    pub fn new(service: Arc<OrchestrationService>, engine: EngineConfig) -> Self {
        Self {
            service,
            engine: Arc::new(engine),
            runtimes: Arc::new(HashMap::new()),
            patterns: PatternRunner::new(),
        }
    }

    /// Serve an in-process runtime under `name`, next to the configured ones
    pub fn with_runtime(mut self, name: impl Into<String>, runtime: Arc<dyn AgentRuntime>) -> Self {
        Arc::make_mut(&mut self.runtimes).insert(name.into(), runtime);
        self
    }

    fn factory(&self) -> AgentFactory<'_> {
        self.runtimes.iter().fold(
            AgentFactory::new(&self.engine, self.service.tools()),
            |factory, (name, runtime)| factory.with_runtime(name.clone(), runtime.clone()),
        )
    }

    fn runtime(&self, name: Option<&str>) -> Result<Arc<dyn AgentRuntime>, ConfigError> {
        self.factory().runtime(name)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/node-types", get(node_types))
        .route("/graphs/validate", post(validate_graph))
        .route("/graphs/run", post(run_graph))
        .route("/graphs/stream", post(stream_graph))
        .route("/patterns/run", post(run_pattern))
        .route("/cache", get(cache_keys).delete(clear_cache))
        .route("/cache/connections/{id}", delete(invalidate_connection))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn node_types(State(state): State<AppState>) -> Json<Value> {
    let types: Vec<Value> = state
        .service
        .available_node_types()
        .into_iter()
        .map(|(tag, description)| {
            json!({
                "type": tag,
                "description": description,
                "schema": state.service.node_type_schema(&tag),
            })
        })
        .collect();
    Json(json!(types))
}

async fn validate_graph(State(state): State<AppState>, body: String) -> Response {
    Json(state.service.validate_config_json(&body)).into_response()
}

#[derive(Deserialize)]
pub struct GraphRunRequest {
    pub config: GraphConfig,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default, alias = "initialValues")]
    pub initial_values: Map<String, Value>,
    /// Graph id to cache under; the runtime id is the connection
    #[serde(default, alias = "cacheKey")]
    pub cache_key: Option<String>,
}

async fn run_graph(State(state): State<AppState>, Json(request): Json<GraphRunRequest>) -> Response {
    let runtime = match state.runtime(request.runtime.as_deref()) {
        Ok(runtime) => runtime,
        Err(e) => return bad_request(e.to_string()),
    };

    let execution: GraphExecution = match &request.cache_key {
        Some(graph_id) => {
            let key = OrchestrationService::cache_key(graph_id, runtime.id());
            state
                .service
                .execute_cached(&key, &request.config, runtime, &request.initial_values)
                .await
        }
        None => {
            state
                .service
                .execute(&request.config, runtime, &request.initial_values)
                .await
        }
    };
    Json(execution).into_response()
}

fn sse_event(event: GraphEvent) -> Result<Event, Infallible> {
    let kind = match &event {
        GraphEvent::Progress(_) => "progress",
        GraphEvent::Completed(_) => "completed",
        GraphEvent::Failed { .. } => "failed",
    };
    Ok(Event::default()
        .event(kind)
        .json_data(&event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
}

async fn stream_graph(
    State(state): State<AppState>,
    Json(request): Json<GraphRunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    let runtime = state
        .runtime(request.runtime.as_deref())
        .map_err(|e| bad_request(e.to_string()))?;

    let events = match &request.cache_key {
        Some(graph_id) => {
            let key = OrchestrationService::cache_key(graph_id, runtime.id());
            state
                .service
                .stream_cached(&key, &request.config, runtime, request.initial_values)
                .await
        }
        None => {
            state
                .service
                .stream(&request.config, runtime, request.initial_values)
                .await
        }
    }
    .map_err(|e| bad_request(format!("Configuration error: {}", e)))?;

    Ok(Sse::new(events.map(sse_event)).keep_alive(KeepAlive::new().interval(Duration::from_secs(1))))
}

#[derive(Deserialize)]
pub struct PatternRunRequest {
    pub definition: PatternDefinition,
    pub input: String,
}

async fn run_pattern(
    State(state): State<AppState>,
    Json(request): Json<PatternRunRequest>,
) -> Json<WorkflowResult> {
    let config = match state.factory().build_pattern(&request.definition).await {
        Ok(config) => config,
        Err(e) => {
            return Json(WorkflowResult::failed(
                request.definition.pattern,
                format!("Configuration error: {}", e),
            ))
        }
    };
    Json(state.patterns.run(&request.input, &config).await)
}

async fn cache_keys(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "keys": state.service.cached_keys().await }))
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.service.clear_cache().await;
    StatusCode::NO_CONTENT
}

async fn invalidate_connection(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let removed = state.service.invalidate_connection(&id).await;
    Json(json!({ "removed": removed }))
}
