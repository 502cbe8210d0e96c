//! GitHub Actions workflow commands and step outputs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::debug;
use uuid::Uuid;

use crate::config::system::OUTPUT_FILE_VAR;
use crate::config::Environment;
use crate::error::Result;

/// Publish a named step result for later workflow steps.
///
/// Appends to the file named by `GITHUB_OUTPUT` when the runner provides
/// one, and falls back to the `::set-output` command otherwise.
pub fn set_output(env: &Environment, name: &str, value: &str) -> Result<()> {
    match env.get(OUTPUT_FILE_VAR) {
        Some(file) => {
            let delimiter = format!("ghadelimiter_{}", Uuid::new_v4().simple());
            append_output(Path::new(file), &output_record(name, value, &delimiter))
        }
        None => {
            println!("{}", set_output_command(name, value));
            Ok(())
        }
    }
}

/// One `GITHUB_OUTPUT` record; multi-line values use a heredoc.
pub fn output_record(name: &str, value: &str, delimiter: &str) -> String {
    if value.contains('\n') {
        format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
    } else {
        format!("{name}={value}\n")
    }
}

pub fn set_output_command(name: &str, value: &str) -> String {
    format!("::set-output name={name}::{}", escape_data(value))
}

/// Mark the job as failed with `message` as the reason.
pub fn error_command(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

/// Workflow command data escaping.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn append_output(file: &Path, record: &str) -> Result<()> {
    debug!(file = %file.display(), "appending step output");
    let mut out = OpenOptions::new().create(true).append(true).open(file)?;
    out.write_all(record.as_bytes())?;
    Ok(())
}

/// Collapsible log section, closed on drop.
#[must_use = "the group closes as soon as the guard is dropped"]
pub struct LogGroup {
    _private: (),
}

impl LogGroup {
    pub fn start(title: &str) -> Self {
        println!("::group::{title}");
        Self { _private: () }
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        println!("::endgroup::");
    }
}
