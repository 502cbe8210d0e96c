//! grcov-ci Library
//!
//! Prepares the inputs for grcov inside a CI job and runs it:
//! - Finds the coverage files a multi-crate project produced and zips them
//! - Merges raw arguments, the project YAML file and CI facts
//! - Builds a grcov command line for the installed grcov release

pub mod artifacts;
pub mod config;
pub mod error;
pub mod invocation;
pub mod pipeline;
pub mod platform;
pub mod runner;
pub mod telemetry;
pub mod tool;

pub use artifacts::{collect, locate, Archive, ArtifactName, CollectorOptions};
pub use config::{resolve, Environment, MergedConfig};
pub use error::{GrcovCiError, Result};
pub use invocation::{synthesize, synthesize_with, FlagSet, ToolVersion};
pub use pipeline::{CoveragePipeline, PipelineInputs, PipelineMode, PipelineResult};
pub use telemetry::init_tracing;
pub use tool::{CargoInstaller, Grcov, Installer};

/// grcov-ci version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
