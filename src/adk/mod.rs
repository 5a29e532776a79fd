// SPDX-License-Identifier: MIT

pub mod agent;
pub mod error;
pub mod runtime;
pub mod tool;
