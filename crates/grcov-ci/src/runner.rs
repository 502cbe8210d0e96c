//! External command execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

/// A command to run: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Human-readable step name used in logs and errors.
    pub name: String,

    pub program: PathBuf,

    pub args: Vec<String>,

    /// Variables added on top of the inherited environment.
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((name.into(), value.into()));
        self
    }
}

/// Result of running a command to completion.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub name: String,

    /// Exit code, `-1` when the process was killed by a signal.
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,

    pub success: bool,
}

impl CommandOutcome {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Fail with the captured stderr unless the command exited cleanly.
    pub fn ensure_success(self) -> anyhow::Result<Self> {
        if self.passed() {
            return Ok(self);
        }
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            anyhow::bail!("{} exited with code {}", self.name, self.exit_code);
        }
        anyhow::bail!(
            "{} exited with code {}: {}",
            self.name,
            self.exit_code,
            stderr
        )
    }
}

/// Runs commands and waits for them to finish.
pub struct CommandRunner;

impl CommandRunner {
    /// Spawn `spec` and capture its output.
    ///
    /// A non-zero exit is reported in the outcome, not as an error; only
    /// failing to spawn or wait is an error here.
    pub async fn execute(spec: &CommandSpec) -> anyhow::Result<CommandOutcome> {
        let start = Instant::now();
        debug!(program = %spec.program.display(), args = ?spec.args, "spawning {}", spec.name);

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                anyhow::anyhow!(
                    "failed to spawn {} ({}): {e}",
                    spec.name,
                    spec.program.display()
                )
            })?;

        let output = child.wait_with_output().await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        for line in stdout.lines().chain(stderr.lines()) {
            info!("{line}");
        }

        Ok(CommandOutcome {
            name: spec.name.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
            success: output.status.success(),
        })
    }
}
