// SPDX-License-Identifier: MIT

//! Daemon configuration
//!
//! Loaded from a YAML file (JSON works too, being a YAML subset):
//!
//! ```yaml
//! evaluator:
//!   func_whitelist: [all, eq]
//!   func_map:
//!     all: and
//!     eq: eq
//! limits:
//!   max_depth: 64
//!   max_nodes: 10000
//! ```

use crate::condition::{builtin_registry, Evaluator, Limits, Registry, BUILTIN_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("function map points to unavailable function: {name:?} -> {target:?}")]
    UnknownMapTarget { name: String, target: String },

    #[error("whitelisted function {0:?} is not exposed by the function map")]
    UnknownWhitelisted(String),

    #[error("limit {0} must be greater than zero")]
    InvalidLimit(&'static str),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub evaluator: EvaluatorConfig,
    pub limits: Limits,
}

/// Which built-in functions are exposed and under what names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Exposed names to enable; empty enables every exposed name
    pub func_whitelist: Vec<String>,
    /// Exposed name to built-in name; empty exposes every built-in under its own name
    pub func_map: BTreeMap<String, String>,
}

impl EvaluatorConfig {
    /// The effective exposed name to built-in name mapping
    pub fn function_map(&self) -> BTreeMap<String, String> {
        if self.func_map.is_empty() {
            BUILTIN_NAMES
                .iter()
                .map(|name| (name.to_string(), name.to_string()))
                .collect()
        } else {
            self.func_map.clone()
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        log::debug!("loaded config from {}", path.display());
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Render the effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let mut effective = self.clone();
        effective.evaluator.func_map = self.evaluator.function_map();
        Ok(serde_yaml::to_string(&effective)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let map = self.evaluator.function_map();

        for (name, target) in &map {
            if !BUILTIN_NAMES.contains(&target.as_str()) {
                return Err(ConfigError::UnknownMapTarget {
                    name: name.clone(),
                    target: target.clone(),
                });
            }
        }

        if let Some(name) = self
            .evaluator
            .func_whitelist
            .iter()
            .find(|name| !map.contains_key(*name))
        {
            return Err(ConfigError::UnknownWhitelisted(name.clone()));
        }

        if self.limits.max_depth == 0 {
            return Err(ConfigError::InvalidLimit("max_depth"));
        }
        if self.limits.max_nodes == 0 {
            return Err(ConfigError::InvalidLimit("max_nodes"));
        }

        Ok(())
    }

    /// Build an evaluator exposing the configured functions
    pub fn build_evaluator(&self) -> Result<Evaluator, ConfigError> {
        self.validate()?;

        let builtins = builtin_registry();
        let whitelist = &self.evaluator.func_whitelist;
        let mut registry = Registry::new();

        for (name, target) in self.evaluator.function_map() {
            if !whitelist.is_empty() && !whitelist.contains(&name) {
                continue;
            }
            let handler = builtins
                .get(&target)
                .ok_or_else(|| ConfigError::UnknownMapTarget {
                    name: name.clone(),
                    target: target.clone(),
                })?;
            registry.add_shared(name, handler);
        }

        log::info!("evaluator exposes: {}", registry.names().join(", "));
        Ok(Evaluator::from_registry(registry).with_limits(&self.limits))
    }
}
