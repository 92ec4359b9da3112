//! The worker side of the isolation boundary.
//!
//! Runs in the child process. Every request gets its own [`ModuleLoader`], so
//! reference paths registered for one request never affect another. Nothing
//! but [`Response`] lines is ever written to stdout, starting with
//! [`Response::Ready`].

use super::protocol::{decode_line, encode_line, Request, Response, PROTOCOL_VERSION};
use crate::detector::EntryPointDetector;
use crate::error::{Error, Result};
use crate::generation::{DocumentGenerator, OperationDocumentGenerator};
use crate::module::{LoadedModule, ModuleLoader};
use crate::settings::{GeneratorSettings, RuntimeConfig};
use crate::type_resolver::TypeResolver;
use log::{debug, info};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Announces readiness, then serves requests from `reader` until it reaches
/// end of input.
///
/// A malformed runtime configuration is answered with a failure for every
/// request, since no context can be established without it.
pub fn serve<R, W>(
    base_dir: &Path,
    runtime_config: Option<&Path>,
    reader: R,
    mut writer: W,
    generator: &dyn DocumentGenerator,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let config = runtime_config.map(RuntimeConfig::load).transpose();

    write_response(
        &mut writer,
        &Response::Ready {
            version: PROTOCOL_VERSION.to_string(),
        },
    )?;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match &config {
            Err(error) => Response::Failure {
                error: error.clone(),
            },
            Ok(config) => match decode_line::<Request>(&line) {
                Ok(request) => handle(base_dir, config.as_ref(), request, generator),
                Err(error) => Response::Failure { error },
            },
        };

        write_response(&mut writer, &response)?;
    }

    debug!("Request stream closed, worker exiting");
    Ok(())
}

fn write_response<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    let encoded = encode_line(response).map_err(io::Error::other)?;
    writer.write_all(encoded.as_bytes())?;
    writer.flush()
}

fn handle(
    base_dir: &Path,
    config: Option<&RuntimeConfig>,
    request: Request,
    generator: &dyn DocumentGenerator,
) -> Response {
    match request {
        Request::ListEntryPoints { settings } => {
            info!("Listing entry points of {}", settings.module_path.display());
            load(base_dir, config, &settings)
                .map(|module| EntryPointDetector::default().detect(&module))
                .into()
        }
        Request::Generate {
            entry_points,
            settings,
        } => {
            info!(
                "Generating document for {:?} from {}",
                entry_points,
                settings.module_path.display()
            );
            generate(base_dir, config, &settings, &entry_points, generator).into()
        }
    }
}

fn load(
    base_dir: &Path,
    config: Option<&RuntimeConfig>,
    settings: &GeneratorSettings,
) -> Result<LoadedModule> {
    let mut loader = ModuleLoader::new(base_dir);
    if let Some(config) = config {
        loader = loader.with_runtime_config(config);
    }
    loader.register_reference_paths(&settings.reference_paths);
    loader.load(&settings.module_path)
}

fn generate(
    base_dir: &Path,
    config: Option<&RuntimeConfig>,
    settings: &GeneratorSettings,
    names: &[String],
    generator: &dyn DocumentGenerator,
) -> Result<String> {
    let module = load(base_dir, config, settings)?;
    let entry_points = TypeResolver::new(&module).resolve(names)?;
    generator
        .generate(&module, &entry_points, settings)
        .map_err(|e| match e {
            Error::GenerationFailure { .. } => e,
            other => Error::generation(other.to_string()),
        })
}

/// Entry point of the `worker` subcommand: serves stdin/stdout with the
/// default document generator.
pub fn run_worker(base_dir: PathBuf, runtime_config: Option<PathBuf>) -> io::Result<()> {
    info!("Worker started in {}", base_dir.display());
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(
        &base_dir,
        runtime_config.as_deref(),
        stdin.lock(),
        stdout.lock(),
        &OperationDocumentGenerator,
    )
}
