//! Project-local YAML overrides for grcov options.
//!
//! Every key is optional and unknown keys are ignored. Values are taken as
//! written: an `output-type` grcov does not know is still forwarded, and
//! grcov gets to reject it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};

/// Default location of the YAML file, relative to the workspace.
pub const DEFAULT_CONFIG_PATH: &str = ".github/actions-rs/grcov.yml";

/// Renamed keys that are still honored: `(legacy, current)`.
pub const DEPRECATED_KEYS: [(&str, &str); 2] = [
    ("output-file", "output-path"),
    ("ignore-missing-files", "ignore-not-existing"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    pub branch: bool,
    pub ignore_not_existing: bool,
    pub llvm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path_mapping: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excl_br_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excl_br_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excl_br_stop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excl_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excl_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excl_stop: Option<String>,
}

/// A legacy key that was found and used in place of its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deprecation {
    pub legacy: &'static str,
    pub current: &'static str,
}

impl fmt::Display for Deprecation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Configuration option `{}` is deprecated; please replace it with `{}`.",
            self.legacy, self.current
        )
    }
}

/// Outcome of loading the YAML file.
///
/// A missing or broken file never fails the run; it degrades to an empty
/// user layer and the caller decides how loudly to say so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLoad {
    Loaded {
        config: UserConfig,
        deprecations: Vec<Deprecation>,
    },
    Degraded {
        path: PathBuf,
        reason: String,
    },
}

impl UserLoad {
    pub fn config(&self) -> UserConfig {
        match self {
            UserLoad::Loaded { config, .. } => config.clone(),
            UserLoad::Degraded { .. } => UserConfig::default(),
        }
    }
}

pub fn load(path: &Path) -> UserLoad {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            return UserLoad::Degraded {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    };

    match parse(&contents) {
        Ok((config, deprecations)) => UserLoad::Loaded {
            config,
            deprecations,
        },
        Err(reason) => UserLoad::Degraded {
            path: path.to_path_buf(),
            reason,
        },
    }
}

/// Parse YAML text into a [`UserConfig`].
///
/// An empty document is an empty configuration. Anything other than a
/// mapping at the top level is rejected.
pub fn parse(contents: &str) -> Result<(UserConfig, Vec<Deprecation>), String> {
    let document: Value = serde_yaml_ng::from_str(contents).map_err(|e| e.to_string())?;
    let mapping = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        other => {
            return Err(format!(
                "expected a mapping at the top level, found {}",
                kind(&other)
            ))
        }
    };

    let mut deprecations = Vec::new();
    let mut get = |current| lookup(&mapping, current, &mut deprecations);

    let config = UserConfig {
        branch: flag(get("branch")),
        ignore_not_existing: flag(get("ignore-not-existing")),
        llvm: flag(get("llvm")),
        filter: text(get("filter")),
        ignore: list(get("ignore")),
        output_type: text(get("output-type")),
        path_mapping: list(get("path-mapping")),
        prefix_dir: text(get("prefix-dir")),
        output_path: text(get("output-path")),
        excl_br_line: text(get("excl-br-line")),
        excl_br_start: text(get("excl-br-start")),
        excl_br_stop: text(get("excl-br-stop")),
        excl_line: text(get("excl-line")),
        excl_start: text(get("excl-start")),
        excl_stop: text(get("excl-stop")),
    };

    Ok((config, deprecations))
}

/// Find `current`, falling back to its legacy spelling.
fn lookup<'m>(
    mapping: &'m Mapping,
    current: &'static str,
    deprecations: &mut Vec<Deprecation>,
) -> Option<&'m Value> {
    if let Some(value) = mapping.get(current) {
        return Some(value);
    }
    let legacy = DEPRECATED_KEYS
        .iter()
        .find(|(_, c)| *c == current)
        .map(|(l, _)| *l)?;
    let value = mapping.get(legacy)?;
    deprecations.push(Deprecation { legacy, current });
    Some(value)
}

fn flag(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        _ => Vec::new(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
