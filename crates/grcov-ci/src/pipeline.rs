//! End-to-end coverage report generation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use tracing::info;

use crate::artifacts::{collect, Archive, CollectorOptions};
use crate::config::{resolve, user_config_path, Environment, MergedConfig, SystemFacts};
use crate::error::Result;
use crate::invocation::{synthesize_with, FlagSet};
use crate::platform::set_output;
use crate::tool::{Grcov, Installer};

/// Step output published by the passthrough variant.
pub const OUTPUT_PATH_OUTPUT: &str = "output-path";

/// Step output published by the multi-crate variant.
pub const REPORT_OUTPUT: &str = "report";

/// Which pipeline to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineMode {
    /// Archive the project's coverage files and merge the YAML config.
    Report(CollectorOptions),

    /// Forward the raw arguments with gaps filled from the environment.
    ///
    /// The YAML layer is read only when a config path is given explicitly.
    Passthrough,
}

impl PipelineMode {
    pub fn output_name(&self) -> &'static str {
        match self {
            PipelineMode::Report(_) => REPORT_OUTPUT,
            PipelineMode::Passthrough => OUTPUT_PATH_OUTPUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// Raw grcov argument string, as typed by the user.
    pub raw_args: String,

    /// YAML config override; relative paths are joined onto the workspace.
    pub config_path: Option<PathBuf>,

    pub mode: PipelineMode,
}

/// Result of a complete pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Arguments grcov was invoked with.
    pub args: Vec<String>,

    /// Absolute path of the generated report.
    pub output_path: PathBuf,

    /// Archive handed to grcov, multi-crate variant only.
    pub archive: Option<Archive>,

    pub duration_ms: u64,
}

/// Coverage pipeline orchestrator.
pub struct CoveragePipeline;

impl CoveragePipeline {
    /// Run every stage in order and publish the report location.
    ///
    /// The first failing stage aborts the run.
    pub async fn run(
        inputs: &PipelineInputs,
        env: &Environment,
        installer: &dyn Installer,
    ) -> anyhow::Result<PipelineResult> {
        let start = Instant::now();

        let archive = match &inputs.mode {
            PipelineMode::Report(options) => {
                let root = SystemFacts::new(env)
                    .workspace()
                    .context("Failed to locate the project root")?;
                info!(root = %root.display(), "Collecting coverage files");
                let archive =
                    collect(&root, options).context("Failed to collect coverage files")?;
                Some(archive)
            }
            PipelineMode::Passthrough => None,
        };

        let config =
            Self::resolve_config(inputs, env).context("Failed to resolve configuration")?;

        let grcov = Grcov::ensure_available(installer, env).await?;
        let version = grcov.version().await;
        match version {
            Some(version) => info!("Using grcov {version}"),
            None => info!("Unable to determine grcov version, assuming a current release"),
        }

        let args = synthesize_with(
            FlagSet::for_version(version),
            &config,
            archive.as_ref().map(|a| a.path.as_path()),
            &config.output_path,
        );
        info!(args = ?args, "Invoking grcov");

        let output_path = grcov.invoke(&args, &config.output_path).await?;

        let output_name = inputs.mode.output_name();
        set_output(env, output_name, &output_path.to_string_lossy())
            .with_context(|| format!("Failed to publish the {output_name} output"))?;

        Ok(PipelineResult {
            args,
            output_path,
            archive,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Merge the raw arguments, the YAML layer and the environment.
    ///
    /// The multi-crate variant falls back to the default YAML location;
    /// passthrough reads YAML only from an explicitly given path.
    pub fn resolve_config(inputs: &PipelineInputs, env: &Environment) -> Result<MergedConfig> {
        let config_path = match (&inputs.mode, inputs.config_path.as_deref()) {
            (PipelineMode::Report(_), path) => Some(user_config_path(env, path)?),
            (PipelineMode::Passthrough, Some(path)) => Some(user_config_path(env, Some(path))?),
            (PipelineMode::Passthrough, None) => None,
        };
        resolve(&inputs.raw_args, config_path.as_deref(), env)
    }
}
