// SPDX-License-Identifier: MIT

//! Declarative graph workflows: config, validation, compilation and execution

pub mod compiler;
pub mod config;
pub mod executor;
pub mod node;
pub mod nodes;
pub mod projection;
pub mod research;
pub mod router;
pub mod validator;

pub use compiler::{CompiledGraph, CompiledNode, GraphCompiler, DEFAULT_MAX_NODE_VISITS};
pub use config::{EdgeConfig, EdgeKind, GraphConfig, NodeConfig, END, START};
pub use executor::{GraphRun, GraphRunError, DEFAULT_STREAM_BUFFER};
pub use node::{
    normalize_node_type, CompileContext, NodeAction, NodeExecutor, NodeExecutorRegistry,
    CURRENT_NODE_KEY, ERROR_KEY,
};
pub use projection::{GraphEvent, ProgressEvent, ResearchResult, ResultProjection};
pub use research::{deep_research_graph, default_deep_research_graph};
pub use router::{RouterConfig, NEXT_NODE_KEY};
pub use validator::validate;
