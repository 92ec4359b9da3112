//! Messages exchanged with the worker, one JSON object per line.

use crate::error::{Error, Result};
use crate::settings::GeneratorSettings;
use serde::{Deserialize, Serialize};

/// Version announced in [`Response::Ready`]; caller and worker must agree.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sent by the caller to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Load the module and run entry-point discovery
    ListEntryPoints { settings: GeneratorSettings },
    /// Load the module, resolve the names and generate one document
    Generate {
        entry_points: Vec<String>,
        settings: GeneratorSettings,
    },
}

/// Sent by the worker in answer to exactly one [`Request`], apart from the
/// leading [`Response::Ready`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// First line a worker writes, before reading any request
    Ready { version: String },
    EntryPoints { names: Vec<String> },
    /// Serialized document text
    Document { document: String },
    Failure { error: Error },
}

impl From<Result<Vec<String>>> for Response {
    fn from(result: Result<Vec<String>>) -> Self {
        match result {
            Ok(names) => Response::EntryPoints { names },
            Err(error) => Response::Failure { error },
        }
    }
}

impl From<Result<String>> for Response {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(document) => Response::Document { document },
            Err(error) => Response::Failure { error },
        }
    }
}

/// Encodes a message as a single line, terminator included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| Error::isolation(format!("failed to encode message: {}", e)))?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T> {
    serde_json::from_str(line.trim_end())
        .map_err(|e| Error::isolation(format!("malformed message {:?}: {}", line.trim_end(), e)))
}
