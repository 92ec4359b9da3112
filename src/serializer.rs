//! Serialization module for converting API documents to YAML or JSON format.
//!
//! JSON is also the form a document takes while crossing the isolation
//! boundary: the worker serializes it with [`serialize_json`] and the caller
//! turns it back into an [`ApiDocument`] with [`deserialize_document`].

use crate::error::{Error, Result as GeneratorResult};
use crate::openapi_builder::ApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an API document to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &ApiDocument) -> Result<String> {
    debug!("Serializing API document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize API document to YAML")
}

/// Serializes an API document to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &ApiDocument) -> Result<String> {
    debug!("Serializing API document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize API document to JSON")
}

/// Parses the serialized document text returned by the worker.
///
/// A document that does not parse means the worker answered with something
/// other than what it promised, which is reported as an isolation failure.
pub fn deserialize_document(text: &str) -> GeneratorResult<ApiDocument> {
    debug!("Deserializing API document ({} bytes)", text.len());
    serde_json::from_str(text)
        .map_err(|e| Error::isolation(format!("worker returned an unreadable document: {}", e)))
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
