// SPDX-License-Identifier: MIT

//! Built-in node types

mod condition;
mod llm;
mod tool;
mod transform;

pub use condition::{ConditionNodeExecutor, ConditionNodeParams};
pub use llm::{LlmNodeExecutor, LlmNodeParams};
pub use tool::{ToolNodeExecutor, ToolNodeParams};
pub use transform::{TransformNodeExecutor, TransformNodeParams, TransformType};
