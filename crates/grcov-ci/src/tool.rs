//! Locating, installing and running the grcov binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{Environment, SystemFacts};
use crate::invocation::ToolVersion;
use crate::platform::LogGroup;
use crate::runner::{CommandRunner, CommandSpec};

pub const GRCOV_BINARY: &str = "grcov";

/// Installs grcov when it is not already available.
///
/// Implementations must leave a runnable binary either on `PATH` or in the
/// cargo bin directory.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, env: &Environment) -> anyhow::Result<()>;
}

/// Installs grcov through cargo.
///
/// Prefers `cargo binstall` when it is on `PATH`, since it downloads a
/// prebuilt release instead of compiling; `GITHUB_TOKEN` is forwarded so
/// those downloads are authenticated.
#[derive(Debug, Clone, Default)]
pub struct CargoInstaller;

#[async_trait]
impl Installer for CargoInstaller {
    async fn install(&self, env: &Environment) -> anyhow::Result<()> {
        let spec = if find_in_path(env, "cargo-binstall").is_some() {
            let spec = CommandSpec::new("cargo binstall", "cargo").args([
                "binstall",
                "--no-confirm",
                GRCOV_BINARY,
            ]);
            match SystemFacts::new(env).token() {
                Some(token) => spec.env("GITHUB_TOKEN", token),
                None => spec,
            }
        } else {
            CommandSpec::new("cargo install", "cargo").args(["install", GRCOV_BINARY])
        };

        CommandRunner::execute(&spec).await?.ensure_success()?;
        Ok(())
    }
}

/// First regular file named `binary` in the `PATH` of `env`.
pub fn find_in_path(env: &Environment, binary: &str) -> Option<PathBuf> {
    let path_var = env.get("PATH")?;
    std::env::split_paths(path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Where `cargo install` puts binaries.
pub fn cargo_bin_dir(env: &Environment) -> Option<PathBuf> {
    if let Some(cargo_home) = env.get("CARGO_HOME") {
        return Some(Path::new(cargo_home).join("bin"));
    }
    env.get("HOME")
        .map(|home| Path::new(home).join(".cargo").join("bin"))
}

/// Handle to a runnable grcov binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grcov {
    path: PathBuf,
}

impl Grcov {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find grcov, installing it first if needed.
    pub async fn ensure_available(
        installer: &dyn Installer,
        env: &Environment,
    ) -> anyhow::Result<Self> {
        if let Some(path) = find_in_path(env, GRCOV_BINARY) {
            debug!("Using grcov at {}", path.display());
            return Ok(Self::new(path));
        }

        info!("grcov is not installed, installing now");
        {
            let _group = LogGroup::start("Install grcov");
            installer
                .install(env)
                .await
                .context("Failed to install grcov")?;
        }

        let fallback = cargo_bin_dir(env).map(|dir| dir.join(GRCOV_BINARY));
        find_in_path(env, GRCOV_BINARY)
            .or_else(|| fallback.clone().filter(|p| p.is_file()))
            .map(Self::new)
            .with_context(|| match fallback {
                Some(path) => format!(
                    "grcov was installed but is neither on PATH nor at {}",
                    path.display()
                ),
                None => "grcov was installed but is not on PATH".to_string(),
            })
    }

    /// Ask the binary for its version; `None` if it cannot tell.
    pub async fn version(&self) -> Option<ToolVersion> {
        let spec = CommandSpec::new("grcov --version", &self.path).args(["--version"]);
        let outcome = CommandRunner::execute(&spec).await.ok()?;
        if !outcome.passed() {
            return None;
        }
        ToolVersion::from_version_output(&outcome.stdout)
    }

    /// Run grcov with `args` and return where the report was written.
    ///
    /// Relative destinations are resolved against the working directory,
    /// which is where grcov writes them.
    pub async fn invoke(&self, args: &[String], destination: &Path) -> anyhow::Result<PathBuf> {
        {
            let _group = LogGroup::start("Execute grcov");
            let spec = CommandSpec::new("grcov", &self.path).args(args.iter().cloned());
            CommandRunner::execute(&spec)
                .await
                .and_then(|outcome| outcome.ensure_success())
                .context("Failed to execute grcov")?;
        }

        let report = if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to resolve the report path")?
                .join(destination)
        };
        info!("Generated coverage report at {}", report.display());
        Ok(report)
    }
}
