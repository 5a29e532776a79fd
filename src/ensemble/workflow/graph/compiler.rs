// SPDX-License-Identifier: MIT

//! Graph compilation: validated config to runnable arena
//!
//! Nodes live in a map keyed by id and every source (START included) owns
//! exactly one outgoing transition. Cycles are plain id references, so a
//! back-edge is just another entry in the map.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::config::{EdgeConfig, EdgeKind, GraphConfig, END, START};
use super::node::{CompileContext, NodeAction, NodeExecutorRegistry, CURRENT_NODE_KEY, ERROR_KEY};
use super::projection::ResultProjection;
use super::router::{RouterConfig, NEXT_NODE_KEY};
use super::validator::validate;
use crate::adk::error::ConfigError;
use crate::ensemble::workflow::state::{StateKey, UnknownKeyPolicy};

/// Visit cap for graphs without a quality gate
pub const DEFAULT_MAX_NODE_VISITS: u32 = 25;

/// Node ready for execution
pub struct CompiledNode {
    pub id: String,
    pub name: String,
    pub node_type: String,
    pub(crate) action: Arc<dyn NodeAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Node(String),
    End,
}

impl Target {
    fn parse(id: &str) -> Self {
        if id == END {
            Target::End
        } else {
            Target::Node(id.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Transition {
    /// Single simple edge
    Goto(Target),
    /// Several simple edges, taken one after another
    Fanout(Vec<Target>),
    /// One conditional edge
    Branch {
        router: RouterConfig,
        routes: BTreeMap<String, Target>,
    },
}

/// A validated graph with wired node actions
pub struct CompiledGraph {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) nodes: HashMap<String, CompiledNode>,
    pub(crate) transitions: HashMap<String, Transition>,
    pub(crate) state_keys: Vec<StateKey>,
    pub(crate) initial_values: Map<String, Value>,
    pub(crate) unknown_keys: UnknownKeyPolicy,
    pub(crate) max_node_visits: u32,
    pub(crate) projection: ResultProjection,
}

pub struct GraphCompiler {
    executors: NodeExecutorRegistry,
}

impl GraphCompiler {
    pub fn new(executors: NodeExecutorRegistry) -> Self {
        Self { executors }
    }

    pub async fn compile(
        &self,
        config: &GraphConfig,
        ctx: &CompileContext,
    ) -> Result<CompiledGraph, ConfigError> {
        validate(config)?;
        log::info!(
            "Compiling graph {} ({} nodes, {} edges)",
            config.name,
            config.nodes.len(),
            config.edges.len()
        );

        let mut nodes = HashMap::with_capacity(config.nodes.len());
        for node in &config.nodes {
            let executor =
                self.executors
                    .get(&node.node_type)
                    .ok_or_else(|| ConfigError::UnknownNodeType {
                        node: node.id.clone(),
                        node_type: node.node_type.clone(),
                    })?;
            let action = executor.create(node, ctx).await?;
            nodes.insert(
                node.id.clone(),
                CompiledNode {
                    id: node.id.clone(),
                    name: node.display_name().to_string(),
                    node_type: executor.node_type().to_string(),
                    action,
                },
            );
        }

        let transitions = build_transitions(config)?;

        let mut state_keys = config.state_keys.clone();
        for engine_key in [CURRENT_NODE_KEY, NEXT_NODE_KEY, ERROR_KEY] {
            if !state_keys.iter().any(|k| k.name == engine_key) {
                state_keys.push(StateKey::replace(engine_key));
            }
        }

        let max_node_visits = config.max_node_visits.unwrap_or_else(|| {
            transitions
                .values()
                .filter_map(|t| match t {
                    Transition::Branch { router, .. } => router.max_iterations(),
                    _ => None,
                })
                .max()
                .map(|max| max + 1)
                .unwrap_or(DEFAULT_MAX_NODE_VISITS)
        });

        Ok(CompiledGraph {
            name: config.name.clone(),
            description: config.description.clone(),
            nodes,
            transitions,
            state_keys,
            initial_values: config.initial_values.clone(),
            unknown_keys: config.unknown_initial_keys,
            max_node_visits,
            projection: config.projection.clone(),
        })
    }
}

fn build_transitions(config: &GraphConfig) -> Result<HashMap<String, Transition>, ConfigError> {
    let mut outgoing: HashMap<&str, Vec<&EdgeConfig>> = HashMap::new();
    for edge in &config.edges {
        outgoing.entry(edge.from.as_str()).or_default().push(edge);
    }

    if !outgoing.contains_key(START) {
        return Err(ConfigError::NoEntry);
    }
    if let Some(node) = config
        .nodes
        .iter()
        .find(|n| !outgoing.contains_key(n.id.as_str()))
    {
        return Err(ConfigError::NoOutgoingEdge(node.id.clone()));
    }

    let mut transitions = HashMap::with_capacity(outgoing.len());
    for (from, edges) in outgoing {
        let conditional: Vec<&&EdgeConfig> = edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Conditional)
            .collect();

        let transition = match (conditional.as_slice(), edges.as_slice()) {
            ([edge], [_]) => Transition::Branch {
                router: edge.router.clone().unwrap_or_default(),
                routes: edge
                    .routes
                    .iter()
                    .map(|(label, target)| (label.clone(), Target::parse(target)))
                    .collect(),
            },
            ([], [edge]) => Transition::Goto(Target::parse(edge.to.as_deref().unwrap_or(END))),
            ([], many) => Transition::Fanout(
                many.iter()
                    .map(|e| Target::parse(e.to.as_deref().unwrap_or(END)))
                    .collect(),
            ),
            _ => return Err(ConfigError::MixedEdges(from.to_string())),
        };
        transitions.insert(from.to_string(), transition);
    }

    Ok(transitions)
}
