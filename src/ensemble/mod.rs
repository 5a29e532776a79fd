// SPDX-License-Identifier: MIT

pub mod mcp;
pub mod server;
pub mod workflow;
