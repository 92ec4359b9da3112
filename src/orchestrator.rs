//! The externally callable facade.
//!
//! Each call checks the configured paths, starts a fresh worker, sends one
//! request and shuts the worker down again. Nothing is cached between calls.

use crate::error::{Error, MissingFile, Result};
use crate::isolation::protocol::{Request, Response};
use crate::isolation::{IsolationContext, WorkerLauncher};
use crate::openapi_builder::ApiDocument;
use crate::serializer::deserialize_document;
use crate::settings::GeneratorSettings;
use log::{debug, info};
use std::env;
use std::path::{Path, PathBuf};

/// Discovers entry points and generates API documents for one module.
pub struct ModuleApiGenerator {
    settings: GeneratorSettings,
    launcher: WorkerLauncher,
}

impl ModuleApiGenerator {
    /// Uses the worker binary found by [`WorkerLauncher::from_env`].
    ///
    /// Fails with [`Error::IsolationFailure`] when no `openapi-from-module`
    /// binary can be found; programs that ship it elsewhere should use
    /// [`ModuleApiGenerator::with_launcher`].
    pub fn new(settings: GeneratorSettings) -> Result<Self> {
        Ok(Self::with_launcher(settings, WorkerLauncher::from_env()?))
    }

    pub fn with_launcher(settings: GeneratorSettings, launcher: WorkerLauncher) -> Self {
        Self { settings, launcher }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Qualified names of all entry-point types in the module.
    pub fn list_entry_points(&self) -> Result<Vec<String>> {
        let settings = self.prepare()?;
        let request = Request::ListEntryPoints { settings };
        match self.round_trip(&request)? {
            Response::EntryPoints { names } => {
                info!("Found {} entry points", names.len());
                Ok(names)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Generates a document for a single entry point.
    pub fn generate_for_one(&self, name: &str) -> Result<ApiDocument> {
        self.generate_for_many(&[name])
    }

    /// Generates one combined document for all named entry points.
    ///
    /// Every name must resolve to exactly one type; the first one that does
    /// not aborts the call.
    pub fn generate_for_many<S: AsRef<str>>(&self, names: &[S]) -> Result<ApiDocument> {
        let text = self.generate_text(names)?;
        deserialize_document(&text)
    }

    /// Same as [`generate_for_many`](Self::generate_for_many) but returns the
    /// serialized text produced by the worker.
    pub fn generate_text<S: AsRef<str>>(&self, names: &[S]) -> Result<String> {
        let settings = self.prepare()?;
        let request = Request::Generate {
            entry_points: names.iter().map(|n| n.as_ref().to_string()).collect(),
            settings,
        };
        match self.round_trip(&request)? {
            Response::Document { document } => Ok(document),
            other => Err(unexpected(&other)),
        }
    }

    /// Validates the configured paths and anchors them to absolute paths.
    ///
    /// Runs before any worker is started.
    fn prepare(&self) -> Result<GeneratorSettings> {
        let mut settings = self.settings.clone();

        if !settings.module_path.is_file() {
            return Err(Error::ConfigurationNotFound {
                what: MissingFile::Module,
                path: settings.module_path,
            });
        }
        settings.module_path = absolute(&settings.module_path)?;

        if let Some(config) = settings.runtime_config().map(Path::to_path_buf) {
            if !config.is_file() {
                return Err(Error::ConfigurationNotFound {
                    what: MissingFile::RuntimeConfig,
                    path: config,
                });
            }
            settings.runtime_config = Some(absolute(&config)?);
        } else {
            settings.runtime_config = None;
        }

        settings.reference_paths = settings
            .reference_paths
            .iter()
            .map(|p| absolute(p))
            .collect::<Result<_>>()?;

        Ok(settings)
    }

    fn round_trip(&self, request: &Request) -> Result<Response> {
        let settings = match request {
            Request::ListEntryPoints { settings } | Request::Generate { settings, .. } => settings,
        };
        let base_dir = settings
            .module_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut context =
            IsolationContext::open(&self.launcher, &base_dir, settings.runtime_config())?;
        let response = context.call(request)?;
        context.close()?;

        match response {
            Response::Failure { error } => {
                debug!("Worker reported failure: {}", error);
                Err(error)
            }
            response => Ok(response),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()
        .map_err(|e| Error::isolation(format!("cannot determine working directory: {}", e)))?;
    Ok(cwd.join(path))
}

fn unexpected(response: &Response) -> Error {
    Error::isolation(format!("worker sent an unexpected response: {:?}", response))
}

/// Lists the entry-point types of the module at `module_path`.
pub fn list_controller_type_names(
    module_path: impl Into<PathBuf>,
    reference_paths: &[PathBuf],
    launcher: WorkerLauncher,
) -> Result<Vec<String>> {
    let settings =
        GeneratorSettings::new(module_path).with_reference_paths(reference_paths.iter().cloned());
    ModuleApiGenerator::with_launcher(settings, launcher).list_entry_points()
}

/// Generates the serialized document for the given entry points.
pub fn generate_document<S: AsRef<str>>(
    settings: GeneratorSettings,
    entry_points: &[S],
    launcher: WorkerLauncher,
) -> Result<String> {
    ModuleApiGenerator::with_launcher(settings, launcher).generate_text(entry_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    // Never started: every test here fails before a worker would be needed
    fn launcher() -> WorkerLauncher {
        WorkerLauncher::new("/nonexistent/worker")
    }

    #[test]
    fn test_missing_module_fails_before_isolation() {
        let err = list_controller_type_names("missing.bin", &[], launcher()).unwrap_err();
        assert_eq!(
            err,
            Error::ConfigurationNotFound {
                what: MissingFile::Module,
                path: PathBuf::from("missing.bin"),
            }
        );
    }

    #[test]
    fn test_missing_runtime_config_fails_before_isolation() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("App.module");
        fs::write(&module, "name: App\n").unwrap();
        let config = temp_dir.path().join("missing.runtime.yaml");

        let generator = ModuleApiGenerator::with_launcher(
            GeneratorSettings::new(&module).with_runtime_config(&config),
            launcher(),
        );
        let err = generator.generate_for_one("FooController").unwrap_err();
        assert_eq!(
            err,
            Error::ConfigurationNotFound {
                what: MissingFile::RuntimeConfig,
                path: config,
            }
        );
    }

    #[test]
    fn test_empty_runtime_config_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("App.module");
        fs::write(&module, "name: App\n").unwrap();

        let generator = ModuleApiGenerator::with_launcher(
            GeneratorSettings::new(&module).with_runtime_config(""),
            launcher(),
        );
        let settings = generator.prepare().unwrap();
        assert_eq!(settings.runtime_config, None);
        assert!(settings.module_path.is_absolute());
    }

    #[test]
    fn test_unstartable_worker_is_isolation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("App.module");
        fs::write(&module, "name: App\n").unwrap();

        let err = list_controller_type_names(&module, &[], launcher()).unwrap_err();
        assert!(matches!(err, Error::IsolationFailure { .. }));
    }
}
