// SPDX-License-Identifier: MIT

//! Typed error handling for ensemble-rs
//!
//! Every failure maps onto one of four kinds (see [`ErrorKind`]):
//! configuration problems caught before a run starts, routing failures,
//! node/agent execution failures, and aggregate run failures.

use thiserror::Error;

/// Top-level error type for ensemble-rs
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// Structurally invalid graph, pattern or supervisor declaration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A conditional edge resolved a label that has no route
    #[error("Routing error at node '{node}': no route for label '{label}'")]
    Routing { node: String, label: String },

    /// A node or agent invocation failed
    #[error("Node '{node}' failed: {message}")]
    NodeExecution { node: String, message: String },

    /// An agent invocation exceeded its timeout
    #[error("Agent '{agent}' timed out after {timeout_ms}ms")]
    Timeout { agent: String, timeout_ms: u64 },

    /// The run did not reach END
    #[error("Run failed: {0}")]
    RunFailure(String),

    /// Tool not found during execution
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Errors reported by an agent runtime process
    #[error("Runtime error from {runtime}: {message}")]
    Runtime { runtime: String, message: String },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Declaration errors, raised at validate/build time
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("graph name is missing")]
    MissingName,

    #[error("graph declares no state keys")]
    MissingStateKeys,

    #[error("graph declares no nodes")]
    MissingNodes,

    #[error("duplicate node ids: {}", .0.join(", "))]
    DuplicateNodeIds(Vec<String>),

    #[error("graph declares no edges")]
    MissingEdges,

    #[error("dangling edge endpoints: {}", .0.join("; "))]
    DanglingEdges(Vec<String>),

    #[error("invalid conditional routes: {}", .0.join("; "))]
    InvalidRoutes(Vec<String>),

    #[error("node '{node}' has unknown type '{node_type}'")]
    UnknownNodeType { node: String, node_type: String },

    #[error("node '{node}' has invalid params: {message}")]
    InvalidNodeParams { node: String, message: String },

    #[error("no edge leaves START")]
    NoEntry,

    #[error("node '{0}' has no outgoing edge")]
    NoOutgoingEdge(String),

    #[error("node '{0}' mixes conditional and simple outgoing edges")]
    MixedEdges(String),

    #[error("unknown initial state keys: {}", .0.join(", "))]
    UnknownInitialKeys(Vec<String>),

    #[error("workflow pattern is not set")]
    MissingPattern,

    #[error("unknown workflow pattern: {0}")]
    UnknownPattern(String),

    #[error("at least one agent must be configured")]
    NoAgents,

    #[error("routing pattern requires a routing agent")]
    MissingRoutingAgent,

    #[error("loop pattern requires a termination agent")]
    MissingLoopTermination,

    #[error("supervisor '{0}' requires a runtime")]
    MissingRuntime(String),

    #[error("supervisor '{0}' requires at least one worker")]
    NoWorkers(String),

    #[error("agent reference '{0}' does not exist")]
    UnknownAgentRef(String),

    #[error("runtime '{0}' is not configured")]
    UnknownRuntime(String),

    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Coarse classification used by callers to decide on retries and
/// status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Routing,
    NodeExecution,
    RunFailure,
}

impl EnsembleError {
    /// Create a configuration error from a malformed-input message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(ConfigError::Malformed(message.into()))
    }

    /// Create a node execution error
    pub fn node(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a routing error
    pub fn routing(node: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Routing {
            node: node.into(),
            label: label.into(),
        }
    }

    /// Create a runtime error
    pub fn runtime(runtime: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            runtime: runtime.into(),
            message: message.into(),
        }
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Json(_) | Self::Yaml(_) => ErrorKind::Configuration,
            Self::Routing { .. } => ErrorKind::Routing,
            Self::NodeExecution { .. }
            | Self::Timeout { .. }
            | Self::ToolNotFound { .. }
            | Self::Runtime { .. } => ErrorKind::NodeExecution,
            Self::RunFailure(_) | Self::Io(_) | Self::Other(_) => ErrorKind::RunFailure,
        }
    }

    /// Configuration and routing errors point at a broken declaration and
    /// are never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Routing
        )
    }
}

// Allow conversion from &str for backward compatibility
impl From<&str> for EnsembleError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for EnsembleError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

// Convert from Box<dyn Error> returned by port implementations
impl From<Box<dyn std::error::Error + Send + Sync>> for EnsembleError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<EnsembleError>() {
            Ok(inner) => *inner,
            Err(other) => Self::Other(other.to_string()),
        }
    }
}
