//! OpenAPI from Module - Command-line tool for generating OpenAPI documentation.
//!
//! Reads the compiled type metadata of a module, finds its controller types and
//! generates an OpenAPI 3.0 document for them. Module inspection happens in a
//! separate worker process started from this same binary.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-module list <MODULE> [-r <PATH>]...
//! openapi-from-module generate <MODULE> [-c <NAME>]... [-f yaml|json] [-o <FILE>]
//! ```
//!
//! # Examples
//!
//! List controllers, resolving dependencies from a package directory:
//! ```bash
//! openapi-from-module list bin/Shop.Api.module -r ~/.packages
//! ```
//!
//! Generate JSON documentation for two controllers:
//! ```bash
//! openapi-from-module generate bin/Shop.Api.module -c Orders -c Users -f json -o openapi.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_module::cli::{self, CliArgs, Command};

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Worker logs go to stderr, which the parent process inherits
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let is_worker = matches!(args.command, Command::Worker { .. });
    if !is_worker {
        info!("OpenAPI from Module starting...");
    }

    cli::run(args)?;

    if !is_worker {
        info!("Done");
    }
    Ok(())
}
