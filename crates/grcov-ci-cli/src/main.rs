//! grcov-ci - grcov runner for GitHub Actions
//!
//! ## Commands
//!
//! - `report`: archive the project's coverage files and generate a report
//! - `run`: run grcov on the given arguments, filling CI defaults

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use grcov_ci::artifacts::{CollectorOptions, DEFAULT_EXTENSIONS};
use grcov_ci::platform::error_command;
use grcov_ci::{CargoInstaller, CoveragePipeline, Environment, PipelineInputs, PipelineMode};

#[derive(Parser)]
#[command(name = "grcov-ci")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate grcov coverage reports in CI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Extra grcov arguments, as one shell-quoted string
    #[arg(
        long,
        global = true,
        env = "INPUT_ARGS",
        default_value = "",
        allow_hyphen_values = true
    )]
    args: String,

    /// YAML config file, relative to the workspace
    #[arg(long, global = true, env = "INPUT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive coverage files of every workspace crate and build a report
    Report {
        /// Build output directory, relative to the workspace
        #[arg(long, default_value = "target")]
        target_dir: PathBuf,

        /// Coverage file extensions to collect
        #[arg(
            long,
            value_delimiter = ',',
            default_values_t = DEFAULT_EXTENSIONS.map(String::from)
        )]
        coverage_ext: Vec<String>,
    },

    /// Run grcov with the given arguments and CI defaults
    Run,
}

impl Cli {
    fn inputs(self) -> PipelineInputs {
        let mode = match self.command {
            Commands::Report {
                target_dir,
                coverage_ext,
            } => PipelineMode::Report(CollectorOptions {
                target_dir,
                extensions: coverage_ext
                    .into_iter()
                    .map(|ext| ext.trim().trim_start_matches('.').to_string())
                    .filter(|ext| !ext.is_empty())
                    .collect(),
                ..CollectorOptions::default()
            }),
            Commands::Run => PipelineMode::Passthrough,
        };

        PipelineInputs {
            raw_args: self.args,
            config_path: self
                .config
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            mode,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    grcov_ci::init_tracing(cli.json, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", error_command(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env = Environment::from_process();
    let inputs = cli.inputs();

    let result = CoveragePipeline::run(&inputs, &env, &CargoInstaller).await?;
    info!(
        duration_ms = result.duration_ms,
        "Coverage report is ready at {}",
        result.output_path.display()
    );
    Ok(())
}
