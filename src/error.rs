//! Typed failures surfaced by the generator.
//!
//! Every variant carries plain data only (paths, names, messages) so that an
//! error raised inside the worker process can be serialized, sent back over the
//! isolation boundary and returned to the caller unchanged.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// What a missing configuration path was supposed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFile {
    Module,
    RuntimeConfig,
}

impl std::fmt::Display for MissingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MissingFile::Module => write!(f, "module"),
            MissingFile::RuntimeConfig => write!(f, "runtime configuration"),
        }
    }
}

/// Error types for the generator
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Error {
    /// The module or runtime configuration file does not exist.
    #[error("the {what} could not be found: {}", path.display())]
    ConfigurationNotFound { what: MissingFile, path: PathBuf },

    /// The module exists but could not be decoded or linked.
    #[error("failed to load module {}: {message}", path.display())]
    ModuleLoadFailure { path: PathBuf, message: String },

    /// A requested entry point matched no type.
    #[error("unable to load type for entry point '{name}': no matching type")]
    EntryPointNotFound { name: String },

    /// A requested entry point matched more than one type.
    #[error("unable to load type for entry point '{name}': ambiguous between {}", candidates.join(", "))]
    AmbiguousEntryPoint {
        name: String,
        candidates: Vec<String>,
    },

    /// The worker process could not be established or died during the call.
    #[error("isolation failure: {message}")]
    IsolationFailure { message: String },

    /// The document generator reported an error.
    #[error("document generation failed: {message}")]
    GenerationFailure { message: String },
}

impl Error {
    pub fn module_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::ModuleLoadFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn isolation(message: impl Into<String>) -> Self {
        Error::IsolationFailure {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Error::GenerationFailure {
            message: message.into(),
        }
    }

    /// The entry-point name this error is attributed to, if any.
    pub fn entry_point(&self) -> Option<&str> {
        match self {
            Error::EntryPointNotFound { name } | Error::AmbiguousEntryPoint { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_missing_path() {
        let err = Error::ConfigurationNotFound {
            what: MissingFile::Module,
            path: PathBuf::from("missing.bin"),
        };
        assert_eq!(
            err.to_string(),
            "the module could not be found: missing.bin"
        );
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let err = Error::AmbiguousEntryPoint {
            name: "UserController".to_string(),
            candidates: vec!["A.UserController".to_string(), "B.UserController".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("'UserController'"));
        assert!(message.contains("A.UserController, B.UserController"));
        assert_eq!(err.entry_point(), Some("UserController"));
    }

    #[test]
    fn test_error_survives_the_wire() {
        let err = Error::module_load("/tmp/shop.module", "dependency 'Web' could not be resolved");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"module_load_failure\""));

        let back: Error = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
