// SPDX-License-Identifier: MIT

pub mod agent_factory;
pub mod graph;
pub mod loader;
pub mod pattern;
pub mod registry;
pub mod service;
pub mod state;
pub mod supervisor;
pub mod types;
