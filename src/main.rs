// SPDX-License-Identifier: MIT

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::StreamExt;

use ensemble_rs::adk::agent::Agent;
use ensemble_rs::ensemble::mcp::{self, manager::McpServiceManager};
use ensemble_rs::ensemble::server::{self, AppState};
use ensemble_rs::ensemble::workflow::agent_factory::AgentFactory;
use ensemble_rs::ensemble::workflow::graph::research::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_QUALITY_THRESHOLD,
};
use ensemble_rs::ensemble::workflow::graph::{validate, GraphEvent};
use ensemble_rs::ensemble::workflow::loader::ConfigLoader;
use ensemble_rs::ensemble::workflow::pattern::PatternRunner;
use ensemble_rs::ensemble::workflow::registry::ToolRegistry;
use ensemble_rs::ensemble::workflow::service::OrchestrationService;
use ensemble_rs::ensemble::workflow::types::EngineConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a graph definition without running it
    Validate {
        /// Path to the graph file (YAML or JSON)
        graph: PathBuf,
    },
    /// List the available graph node types
    NodeTypes,
    /// Run a graph workflow
    RunGraph {
        /// Path to the graph file
        graph: PathBuf,

        /// Engine configuration (runtimes, agents, MCP servers)
        #[arg(short, long)]
        config: PathBuf,

        /// Runtime to use instead of the engine default
        #[arg(short, long)]
        runtime: Option<String>,

        /// Initial state value, `key=value`; JSON values are parsed
        #[arg(short, long = "input", value_parser = parse_key_value)]
        inputs: Vec<(String, Value)>,

        /// Print one event per completed node
        #[arg(long)]
        stream: bool,
    },
    /// Answer a question with the built-in deep research graph
    Research {
        question: String,

        #[arg(short, long)]
        config: PathBuf,

        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,

        #[arg(long, default_value_t = DEFAULT_QUALITY_THRESHOLD)]
        threshold: f64,

        #[arg(long)]
        stream: bool,
    },
    /// Run a sequential, parallel, routing or loop pattern
    RunPattern {
        /// Path to the pattern definition
        pattern: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        input: String,
    },
    /// Run a supervisor over its worker agents
    Supervise {
        /// Path to the supervisor definition
        supervisor: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        input: String,
    },
    /// Start the HTTP server
    Serve {
        #[arg(short, long)]
        config: PathBuf,

        /// Address to listen on; overrides the engine config
        #[arg(short, long)]
        bind: Option<String>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

/// Engine config plus a tool registry holding every MCP server's tools
struct Engine {
    config: EngineConfig,
    tools: ToolRegistry,
    _mcp: McpServiceManager,
}

impl Engine {
    async fn load(path: &Path) -> anyhow::Result<Self> {
        let config = ConfigLoader::new()
            .load_engine(path)
            .with_context(|| format!("loading engine config {}", path.display()))?;
        let tools = ToolRegistry::new();
        let mcp = McpServiceManager::new();
        let registered = mcp::register_all(&mcp, &config.mcp_servers, &tools).await;
        if registered > 0 {
            log::info!("Registered {} MCP tool(s)", registered);
        }
        Ok(Self {
            config,
            tools,
            _mcp: mcp,
        })
    }

    fn factory(&self) -> AgentFactory<'_> {
        AgentFactory::new(&self.config, &self.tools)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn print_events(
    mut events: impl tokio_stream::Stream<Item = GraphEvent> + Unpin,
) -> anyhow::Result<bool> {
    let mut success = false;
    while let Some(event) = events.next().await {
        println!("{}", serde_json::to_string(&event)?);
        success = matches!(event, GraphEvent::Completed(_));
    }
    Ok(success)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Validate { graph } => {
            let config = ConfigLoader::new().load_graph(&graph)?;
            validate(&config)?;
            println!(
                "{} is valid: {} node(s), {} edge(s)",
                config.name,
                config.nodes.len(),
                config.edges.len()
            );
        }
        Commands::NodeTypes => {
            let service = OrchestrationService::with_defaults(ToolRegistry::new());
            for (tag, description) in service.available_node_types() {
                println!("{:<16} {}", tag, description);
            }
        }
        Commands::RunGraph {
            graph,
            config,
            runtime,
            inputs,
            stream,
        } => {
            let engine = Engine::load(&config).await?;
            let graph = ConfigLoader::new().load_graph(&graph)?;
            let runtime = engine.factory().runtime(runtime.as_deref())?;
            let initial: Map<String, Value> = inputs.into_iter().collect();
            let service = OrchestrationService::with_defaults(engine.tools.clone());

            if stream {
                let events = service.stream(&graph, runtime, initial).await?;
                if !print_events(events).await? {
                    bail!("graph {} did not complete", graph.name);
                }
            } else {
                let execution = service.execute(&graph, runtime, &initial).await;
                print_json(&execution)?;
                if let Some(error) = execution.error {
                    bail!(error);
                }
            }
        }
        Commands::Research {
            question,
            config,
            max_iterations,
            threshold,
            stream,
        } => {
            let engine = Engine::load(&config).await?;
            let runtime = engine.factory().runtime(None)?;
            let service = OrchestrationService::with_defaults(engine.tools.clone());

            if stream {
                let events = service
                    .research_stream(runtime, &question, max_iterations, threshold)
                    .await?;
                if !print_events(events).await? {
                    bail!("research did not complete");
                }
            } else {
                let result = service
                    .research(runtime, &question, max_iterations, threshold)
                    .await;
                print_json(&result)?;
                if let Some(error) = result.error_message {
                    bail!(error);
                }
            }
        }
        Commands::RunPattern {
            pattern,
            config,
            input,
        } => {
            let engine = Engine::load(&config).await?;
            let definition = ConfigLoader::new().load_pattern(&pattern)?;
            let pattern_config = engine.factory().build_pattern(&definition).await?;

            let result = PatternRunner::new().run(&input, &pattern_config).await;
            print_json(&result)?;
            if !result.success {
                bail!(result
                    .error_message
                    .unwrap_or_else(|| "pattern failed".to_string()));
            }
        }
        Commands::Supervise {
            supervisor,
            config,
            input,
        } => {
            let engine = Engine::load(&config).await?;
            let definition = ConfigLoader::new().load_supervisor(&supervisor)?;
            let agent = engine.factory().build_supervisor(&definition).await?;

            println!("Running supervisor: {}", agent.name());
            let response = agent.run(input).await.map_err(|e| anyhow!(e))?;
            println!("Response: {}", response);
        }
        Commands::Serve { config, bind } => {
            let subscriber = tracing_subscriber::fmt().finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                log::warn!("Tracing subscriber already installed");
            }

            let engine = Engine::load(&config).await?;
            let bind = bind.unwrap_or_else(|| engine.config.server.bind.clone());
            let service = Arc::new(OrchestrationService::with_defaults(engine.tools.clone()));
            let state = AppState::new(service, engine.config.clone());
            server::serve(state, &bind).await.map_err(|e| anyhow!(e))?;
        }
    }

    Ok(())
}
