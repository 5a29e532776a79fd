// SPDX-License-Identifier: MIT

//! Config loader - YAML/JSON file loading and parsing
//!
//! Any declarative shape (engine, graph, pattern, supervisor) loads the
//! same way. Parse failures become [`ConfigError::Malformed`] so callers
//! can tell a bad file apart from a failed run.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use super::graph::GraphConfig;
use super::types::{EngineConfig, PatternDefinition, SupervisorDefinition};
use crate::adk::error::{ConfigError, EnsembleError};

/// Source format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.json` is JSON; anything else is read as YAML, which also accepts JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load any configuration document from a file
    pub fn load<T: DeserializeOwned, P: AsRef<Path>>(&self, path: P) -> Result<T, EnsembleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        log::debug!("Loading config from {}", path.display());
        Self::parse(&content, ConfigFormat::from_path(path)).map_err(|e| {
            EnsembleError::Configuration(ConfigError::Malformed(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })
    }

    pub fn parse<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T, ConfigError> {
        match format {
            ConfigFormat::Json => Self::parse_json(content),
            ConfigFormat::Yaml => Self::parse_yaml(content),
        }
    }

    pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn parse_yaml<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn load_engine<P: AsRef<Path>>(&self, path: P) -> Result<EngineConfig, EnsembleError> {
        self.load(path)
    }

    pub fn load_graph<P: AsRef<Path>>(&self, path: P) -> Result<GraphConfig, EnsembleError> {
        self.load(path)
    }

    pub fn load_pattern<P: AsRef<Path>>(&self, path: P) -> Result<PatternDefinition, EnsembleError> {
        self.load(path)
    }

    pub fn load_supervisor<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<SupervisorDefinition, EnsembleError> {
        self.load(path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
