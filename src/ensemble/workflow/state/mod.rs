// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateKey` - a declared key and its merge strategy
//! - `WorkflowState` - per-run mutable state applying merge strategies
//! - `StateSnapshot` - immutable view handed to nodes and observers

mod schema;
mod store;

pub use schema::{MergeStrategy, StateKey, UnknownKeyPolicy};
pub use store::{StateSnapshot, StateUpdate, WorkflowState};
pub(crate) use store::first_number;
