// SPDX-License-Identifier: MIT

//! State key declarations

use serde::{Deserialize, Serialize};

/// A declared state key
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StateKey {
    /// Key name
    #[serde(alias = "key")]
    pub name: String,
    /// How writes combine with the current value
    #[serde(default, alias = "mergeStrategy")]
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub description: String,
    /// Value observed before the first write
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl StateKey {
    pub fn replace(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: MergeStrategy::Replace,
            description: String::new(),
            default: None,
        }
    }

    pub fn append(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: MergeStrategy::Append,
            description: String::new(),
            default: None,
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Merge strategies for state writes
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Overwrite the prior value (default)
    #[default]
    #[serde(alias = "REPLACE", alias = "Replace")]
    Replace,
    /// Concatenate onto the existing sequence
    #[serde(alias = "APPEND", alias = "Append")]
    Append,
}

/// What to do with initial values for keys the graph does not declare
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeyPolicy {
    #[default]
    Reject,
    Ignore,
}
