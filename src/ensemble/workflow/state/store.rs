// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::schema::{MergeStrategy, StateKey, UnknownKeyPolicy};
use crate::adk::error::ConfigError;

static NULL: Value = Value::Null;
static EMPTY_LIST: Value = Value::Array(Vec::new());

/// Per-run workflow state with merge strategy support
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    /// Current state values
    fields: HashMap<String, Value>,
    /// Merge strategy for each declared key
    strategies: HashMap<String, MergeStrategy>,
}

impl WorkflowState {
    /// Create a new WorkflowState from declared keys, seeding declared defaults
    pub fn new(keys: &[StateKey]) -> Self {
        let mut fields = HashMap::new();
        let mut strategies = HashMap::new();

        for key in keys {
            if let Some(default) = &key.default {
                fields.insert(key.name.clone(), normalize(key.strategy, default.clone()));
            }
            strategies.insert(key.name.clone(), key.strategy);
        }

        Self { fields, strategies }
    }

    /// Create state and apply an initial-values map
    pub fn with_initial(
        keys: &[StateKey],
        initial: &Map<String, Value>,
        policy: UnknownKeyPolicy,
    ) -> Result<Self, ConfigError> {
        let mut state = Self::new(keys);

        let unknown: Vec<String> = initial
            .keys()
            .filter(|k| !state.is_declared(k))
            .cloned()
            .collect();

        if !unknown.is_empty() {
            match policy {
                UnknownKeyPolicy::Reject => return Err(ConfigError::UnknownInitialKeys(unknown)),
                UnknownKeyPolicy::Ignore => {
                    log::warn!("Ignoring unknown initial state keys: {:?}", unknown)
                }
            }
        }

        for (key, value) in initial {
            if state.is_declared(key) {
                state.set(key, value.clone());
            }
        }

        Ok(state)
    }

    /// Create an empty WorkflowState
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a key after construction; existing declarations win
    pub fn declare(&mut self, key: &str, strategy: MergeStrategy) {
        self.strategies.entry(key.to_string()).or_insert(strategy);
    }

    pub fn is_declared(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    pub fn strategy(&self, key: &str) -> MergeStrategy {
        self.strategies
            .get(key)
            .copied()
            .unwrap_or(MergeStrategy::Replace)
    }

    /// Write a value using the key's merge strategy
    pub fn set(&mut self, key: &str, value: Value) {
        match self.strategy(key) {
            MergeStrategy::Replace => {
                self.fields.insert(key.to_string(), value);
            }
            MergeStrategy::Append => {
                let slot = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                if !slot.is_array() {
                    let previous = std::mem::take(slot);
                    *slot = Value::Array(vec![previous]);
                }
                if let Value::Array(items) = slot {
                    match value {
                        Value::Array(new_items) => items.extend(new_items),
                        other => items.push(other),
                    }
                }
            }
        }
    }

    /// Apply every write of a node's update, in order
    pub fn apply(&mut self, update: StateUpdate) {
        for (key, value) in update.writes {
            self.set(&key, value);
        }
    }

    /// Value or the key's default: `[]` for append keys, `null` otherwise
    pub fn get(&self, key: &str) -> &Value {
        lookup(&self.fields, &self.strategies, key)
    }

    /// Whether a value has been written (or seeded from a default)
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get_text(&self, key: &str) -> String {
        value_to_text(self.get(key))
    }

    pub fn get_number(&self, key: &str) -> f64 {
        value_to_number(self.get(key))
    }

    /// Non-negative integer reading, e.g. an iteration counter
    pub fn get_count(&self, key: &str) -> u32 {
        value_to_count(self.get(key))
    }

    /// Immutable view for handing to nodes and observers
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            fields: Arc::new(self.fields.clone()),
            strategies: Arc::new(self.strategies.clone()),
        }
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        fields_to_json(&self.fields)
    }

    /// Get all written field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

/// Read-only view of a run's state at one point in time
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    fields: Arc<HashMap<String, Value>>,
    strategies: Arc<HashMap<String, MergeStrategy>>,
}

impl StateSnapshot {
    pub fn get(&self, key: &str) -> &Value {
        lookup(&self.fields, &self.strategies, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get_text(&self, key: &str) -> String {
        value_to_text(self.get(key))
    }

    pub fn get_number(&self, key: &str) -> f64 {
        value_to_number(self.get(key))
    }

    /// Non-negative integer reading, e.g. an iteration counter
    pub fn get_count(&self, key: &str) -> u32 {
        value_to_count(self.get(key))
    }

    pub fn to_json(&self) -> Value {
        fields_to_json(&self.fields)
    }
}

impl Serialize for StateSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Ordered writes produced by one node execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    writes: Vec<(String, Value)>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.writes.push((key.into(), value));
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.writes.push((key.into(), value));
    }

    /// Last value written to `key` in this update
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.writes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.writes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn lookup<'a>(
    fields: &'a HashMap<String, Value>,
    strategies: &HashMap<String, MergeStrategy>,
    key: &str,
) -> &'a Value {
    match fields.get(key) {
        Some(value) => value,
        None => match strategies.get(key) {
            Some(MergeStrategy::Append) => &EMPTY_LIST,
            _ => &NULL,
        },
    }
}

fn normalize(strategy: MergeStrategy, value: Value) -> Value {
    match (strategy, value) {
        (MergeStrategy::Append, Value::Array(items)) => Value::Array(items),
        (MergeStrategy::Append, Value::Null) => Value::Array(vec![]),
        (MergeStrategy::Append, other) => Value::Array(vec![other]),
        (MergeStrategy::Replace, other) => other,
    }
}

fn fields_to_json(fields: &HashMap<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

/// Render a state value as prompt text
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Numeric reading of a state value; numbers embedded in text count
pub(crate) fn value_to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<f64>() {
                return n;
            }
            first_number(trimmed).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// First unsigned decimal number in `text`: 85 in "Score: 85/100"
pub(crate) fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in rest.char_indices() {
        if c.is_ascii_digit() {
            end = i + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else {
            break;
        }
    }
    rest[..end].parse().ok()
}

pub(crate) fn value_to_count(value: &Value) -> u32 {
    let n = value_to_number(value);
    if n.is_finite() && n > 0.0 {
        n.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}
