//! Environment-derived facts about the running CI job.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{GrcovCiError, Result};

pub const WORKSPACE_VAR: &str = "GITHUB_WORKSPACE";
pub const COMMIT_SHA_VAR: &str = "GITHUB_SHA";
pub const REF_VAR: &str = "GITHUB_REF";
pub const HEAD_REF_VAR: &str = "GITHUB_HEAD_REF";
pub const SERVICE_NAME_VAR: &str = "GITHUB_WORKFLOW";
pub const RUN_ID_VAR: &str = "GITHUB_RUN_ID";
pub const RUN_NUMBER_VAR: &str = "GITHUB_RUN_NUMBER";
pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const OUTPUT_FILE_VAR: &str = "GITHUB_OUTPUT";

/// Snapshot of environment variables.
///
/// Empty values are treated exactly like unset ones, which is how the CI
/// platform reports inputs that were never provided.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    /// Build an environment from raw OS pairs, dropping any that are not
    /// valid UTF-8.
    pub fn from_os_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Build an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return a copy with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Fetch a variable that the current code path cannot do without.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| GrcovCiError::MissingEnv(name.to_string()))
    }
}

/// Typed, lazily-evaluated view over the CI facts in an [`Environment`].
///
/// Nothing is read up front; a missing variable only fails the run when a
/// caller actually asks for that fact.
#[derive(Debug, Clone, Copy)]
pub struct SystemFacts<'a> {
    env: &'a Environment,
}

impl<'a> SystemFacts<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self { env }
    }

    pub fn workspace(&self) -> Result<PathBuf> {
        self.env.require(WORKSPACE_VAR).map(PathBuf::from)
    }

    pub fn commit_sha(&self) -> Result<&'a str> {
        self.env.require(COMMIT_SHA_VAR)
    }

    pub fn service_name(&self) -> Result<&'a str> {
        self.env.require(SERVICE_NAME_VAR)
    }

    pub fn run_id(&self) -> Result<&'a str> {
        self.env.require(RUN_ID_VAR)
    }

    pub fn run_number(&self) -> Option<&'a str> {
        self.env.get(RUN_NUMBER_VAR)
    }

    /// Branch being built, when the job runs for a branch at all.
    ///
    /// Pull request jobs report the source branch; push jobs report
    /// `refs/heads/<branch>`. Tag and other refs have no branch.
    pub fn branch(&self) -> Option<&'a str> {
        if let Some(head) = self.env.get(HEAD_REF_VAR) {
            return Some(head);
        }
        self.env
            .get(REF_VAR)
            .and_then(|r| r.strip_prefix("refs/heads/"))
            .filter(|b| !b.is_empty())
    }

    pub fn token(&self) -> Option<&'a str> {
        self.env.get(TOKEN_VAR)
    }

    /// Resolve a path given by the caller against the workspace root.
    ///
    /// Absolute paths never need the workspace, so they do not require it.
    pub fn in_workspace(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.workspace()?.join(path))
        }
    }
}
