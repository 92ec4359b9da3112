use crate::isolation::worker::run_worker;
use crate::isolation::WorkerLauncher;
use crate::orchestrator::ModuleApiGenerator;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::settings::GeneratorSettings;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// OpenAPI from Module - Generate OpenAPI documentation from compiled module metadata
#[derive(Parser, Debug)]
#[command(name = "openapi-from-module")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the controller types found in a module
    List(ModuleArgs),

    /// Generate an OpenAPI document for some or all controllers
    Generate {
        #[command(flatten)]
        module: ModuleArgs,

        /// Controller to include (repeatable); all discovered controllers if omitted
        #[arg(short = 'c', long = "controller", value_name = "NAME")]
        controllers: Vec<String>,

        /// Output format (yaml or json)
        #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
        output_format: OutputFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_path: Option<PathBuf>,
    },

    /// Serve inspection requests on stdin/stdout
    #[command(hide = true)]
    Worker {
        #[arg(long = "base-dir", value_name = "DIR")]
        base_dir: PathBuf,

        #[arg(long = "runtime-config", value_name = "FILE")]
        runtime_config: Option<PathBuf>,
    },
}

/// Arguments shared by the `list` and `generate` commands
#[derive(Args, Debug)]
pub struct ModuleArgs {
    /// Path to the module metadata image
    #[arg(value_name = "MODULE")]
    pub module_path: PathBuf,

    /// Directory searched (recursively) for the module's dependencies
    #[arg(short = 'r', long = "reference", value_name = "PATH")]
    pub reference_paths: Vec<PathBuf>,

    /// Runtime configuration override
    #[arg(long = "runtime-config", value_name = "FILE")]
    pub runtime_config: Option<PathBuf>,

    /// Option passed to the document generator (title, version, description, defaultUrlTemplate)
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, String)>,
}

impl ModuleArgs {
    pub fn to_settings(&self) -> GeneratorSettings {
        let mut settings = GeneratorSettings::new(&self.module_path)
            .with_reference_paths(self.reference_paths.iter().cloned());
        if let Some(config) = &self.runtime_config {
            settings = settings.with_runtime_config(config);
        }
        for (key, value) in &self.options {
            settings = settings.with_option(key.clone(), value.clone());
        }
        settings
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

fn parse_option(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Run the selected command
pub fn run(args: CliArgs) -> Result<()> {
    debug!("Parsed arguments: {:?}", args);

    match args.command {
        Command::Worker {
            base_dir,
            runtime_config,
        } => run_worker(base_dir, runtime_config).context("Worker failed"),
        Command::List(module) => list(&module),
        Command::Generate {
            module,
            controllers,
            output_format,
            output_path,
        } => generate(&module, &controllers, output_format, output_path),
    }
}

fn generator(module: &ModuleArgs) -> Result<ModuleApiGenerator> {
    info!("Module: {}", module.module_path.display());
    for path in &module.reference_paths {
        info!("Reference path: {}", path.display());
    }
    let launcher = WorkerLauncher::from_env()?;
    Ok(ModuleApiGenerator::with_launcher(module.to_settings(), launcher))
}

fn list(module: &ModuleArgs) -> Result<()> {
    let names = generator(module)?.list_entry_points()?;
    if names.is_empty() {
        warn!("No controllers found in {}", module.module_path.display());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn generate(
    module: &ModuleArgs,
    controllers: &[String],
    output_format: OutputFormat,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let generator = generator(module)?;

    let controllers = if controllers.is_empty() {
        info!("No controllers specified, discovering...");
        let discovered = generator.list_entry_points()?;
        if discovered.is_empty() {
            warn!("No controllers found in {}", module.module_path.display());
        }
        discovered
    } else {
        controllers.to_vec()
    };
    info!("Generating document for {} controllers", controllers.len());

    let document = generator.generate_for_many(&controllers)?;
    info!(
        "Document has {} paths and {} operations",
        document.paths.len(),
        document.operations().count()
    );

    info!("Serializing to {:?} format...", output_format);
    let content = match output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    if let Some(output_path) = &output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}
