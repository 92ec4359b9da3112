//! OpenAPI from Module - OpenAPI documents from compiled module metadata.
//!
//! This library generates OpenAPI 3.0 documentation for a module without access
//! to its source. It reads the module's metadata image (its type table), finds
//! the controller types with a structural heuristic and turns their operations
//! into an API document.
//!
//! Module inspection always happens in a separate worker process so that a
//! broken or incompatible module cannot take the caller down with it. The
//! worker is the `openapi-from-module` binary built from this crate; programs
//! embedding the library point a [`isolation::WorkerLauncher`] at it.
//!
//! # Architecture
//!
//! 1. [`orchestrator`] - Public facade; validates paths and drives one worker per call
//! 2. [`isolation`] - Worker process lifecycle and the line-based request protocol
//! 3. [`module`] - Loads metadata images and links their dependencies
//! 4. [`detector`] - Finds controller types by name suffix and ancestry
//! 5. [`type_resolver`] - Maps requested names to types, reporting ambiguity
//! 6. [`generation`] - Document generator seam and its OpenAPI implementation
//! 7. [`schema_generator`] - Converts metadata type expressions to schemas
//! 8. [`openapi_builder`] - Constructs the complete OpenAPI document
//! 9. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_module::{
//!     isolation::WorkerLauncher,
//!     orchestrator::ModuleApiGenerator,
//!     serializer::serialize_yaml,
//!     settings::GeneratorSettings,
//! };
//!
//! let settings = GeneratorSettings::new("bin/Shop.Api.module")
//!     .with_reference_paths(["packages"])
//!     .with_option("title", "Shop API");
//! let launcher = WorkerLauncher::new("/usr/local/bin/openapi-from-module");
//! let generator = ModuleApiGenerator::with_launcher(settings, launcher);
//!
//! let controllers = generator.list_entry_points().unwrap();
//! let document = generator.generate_for_many(&controllers).unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod detector;
pub mod error;
pub mod generation;
pub mod isolation;
pub mod module;
pub mod openapi_builder;
pub mod orchestrator;
pub mod schema_generator;
pub mod serializer;
pub mod settings;
pub mod type_resolver;

pub use error::{Error, Result};
pub use orchestrator::{generate_document, list_controller_type_names, ModuleApiGenerator};
pub use settings::GeneratorSettings;
