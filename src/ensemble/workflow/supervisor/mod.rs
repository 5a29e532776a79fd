// SPDX-License-Identifier: MIT

//! Supervisor pattern: worker agents exposed as tools of one top-level agent

mod agent_tool;
mod team;

pub use agent_tool::{as_tool, AgentTool};
pub use team::{SupervisorTeam, DEFAULT_SUPERVISOR_NAME};
