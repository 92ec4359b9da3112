//! Generator settings and the runtime configuration override.
//!
//! [`GeneratorSettings`] is plain data: it is serialized to JSON and handed to
//! the worker process rather than shared, so it must never hold live handles.

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one generation or discovery call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorSettings {
    /// Path to the module metadata image
    pub module_path: PathBuf,
    /// Optional runtime configuration override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_config: Option<PathBuf>,
    /// Extra locations consulted when linking the module's dependencies
    #[serde(default)]
    pub reference_paths: Vec<PathBuf>,
    /// Options passed through unexamined to the document generator
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl GeneratorSettings {
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
            runtime_config: None,
            reference_paths: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_runtime_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_config = Some(path.into());
        self
    }

    pub fn with_reference_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.reference_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The runtime configuration path, treating an empty path as absent.
    pub fn runtime_config(&self) -> Option<&Path> {
        self.runtime_config
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Looks up a string option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

/// Dependency-resolution overrides applied inside one isolation context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Directories searched for dependencies, relative to the base directory
    #[serde(default)]
    pub probing_paths: Vec<PathBuf>,
    /// Explicit module-name to file mappings, checked before any search
    #[serde(default)]
    pub redirects: BTreeMap<String, PathBuf>,
}

impl RuntimeConfig {
    /// Reads a runtime configuration file (YAML or JSON).
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading runtime configuration: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| {
            Error::isolation(format!(
                "failed to read runtime configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        // YAML accepts JSON input as well
        let config: RuntimeConfig = serde_yaml::from_str(&content).map_err(|e| {
            Error::isolation(format!(
                "invalid runtime configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!(
            "Runtime configuration has {} probing paths and {} redirects",
            config.probing_paths.len(),
            config.redirects.len()
        );
        Ok(config)
    }
}
