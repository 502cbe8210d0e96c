//! Configuration resolution.
//!
//! Three layers feed one [`MergedConfig`], highest precedence first:
//!
//! 1. options present in the raw argument string,
//! 2. the project YAML file,
//! 3. CI environment facts, used only to fill what is still missing.
//!
//! Environment facts are read lazily, so a missing variable only fails the
//! run when it was actually needed to fill a gap.

pub mod args;
pub mod system;
pub mod user;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
pub use args::{scan, tokenize, Flag, FlagScan};
pub use system::{Environment, SystemFacts};
pub use user::{Deprecation, UserConfig, UserLoad, DEFAULT_CONFIG_PATH};

/// grcov's own default output type.
pub const DEFAULT_OUTPUT_TYPE: &str = "lcov";

/// Basename used for the default report of non-lcov output types.
pub const GENERIC_REPORT_NAME: &str = "coverage";

/// The six line/branch exclusion markers grcov understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Exclusions {
    pub excl_br_line: Option<String>,
    pub excl_br_start: Option<String>,
    pub excl_br_stop: Option<String>,
    pub excl_line: Option<String>,
    pub excl_start: Option<String>,
    pub excl_stop: Option<String>,
}

/// Fully merged grcov configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedConfig {
    pub branch: bool,
    pub ignore_not_existing: bool,
    pub llvm: bool,
    pub commit_sha: String,
    pub filter: Option<String>,
    pub ignore: Vec<String>,
    pub path_mapping: Vec<String>,
    pub output_path: PathBuf,
    pub output_type: Option<String>,
    pub prefix_dir: Option<String>,
    pub exclusions: Exclusions,
    pub service_name: String,
    pub service_job_id: String,
    pub service_number: Option<String>,
    pub vcs_branch: Option<String>,
    pub source_dir: String,
    /// Raw tokens that are not grcov options this crate understands.
    pub passthrough: Vec<String>,
}

impl MergedConfig {
    /// Output type grcov will actually use.
    pub fn effective_output_type(&self) -> &str {
        self.output_type.as_deref().unwrap_or(DEFAULT_OUTPUT_TYPE)
    }
}

/// Where the YAML file lives: `override_path` relative to the workspace, or
/// the default location when no override is given.
pub fn user_config_path(env: &Environment, override_path: Option<&Path>) -> Result<PathBuf> {
    let facts = SystemFacts::new(env);
    match override_path {
        Some(path) => facts.in_workspace(path),
        None => facts.in_workspace(Path::new(DEFAULT_CONFIG_PATH)),
    }
}

/// Load the YAML layer, logging degraded mode and deprecations.
pub fn load_user_config(path: &Path) -> UserConfig {
    let loaded = user::load(path);
    match &loaded {
        UserLoad::Loaded { deprecations, .. } => {
            for deprecation in deprecations {
                warn!("{deprecation}");
            }
        }
        UserLoad::Degraded { path, reason } => {
            info!(
                "Unable to load grcov config from {}, falling back to defaults: {reason}",
                path.display()
            );
        }
    }
    loaded.config()
}

/// Merge the raw argument string, an optional YAML file and the environment.
///
/// Passing `None` for `config_path` skips the YAML layer entirely.
pub fn resolve(
    raw_args: &str,
    config_path: Option<&Path>,
    env: &Environment,
) -> Result<MergedConfig> {
    let tokens = tokenize(raw_args)?;
    let scanned = scan(&tokens)?;
    let user = config_path.map(load_user_config).unwrap_or_default();

    if let Ok(json) = serde_json::to_string(&user) {
        debug!("User configuration: {json}");
    }

    let merged = merge(scanned, user, env)?;
    if let Ok(json) = serde_json::to_string(&merged) {
        debug!("Merged configuration: {json}");
    }
    Ok(merged)
}

/// Combine already-parsed layers.
pub fn merge(scanned: FlagScan, user: UserConfig, env: &Environment) -> Result<MergedConfig> {
    let facts = SystemFacts::new(env);

    let commit_sha = match scanned.commit_sha {
        Some(sha) => sha,
        None => facts.commit_sha()?.to_string(),
    };
    let service_name = match scanned.service_name {
        Some(name) => name,
        None => facts.service_name()?.to_string(),
    };
    let service_job_id = match scanned.service_job_id {
        Some(id) => id,
        None => facts.run_id()?.to_string(),
    };
    let source_dir = match scanned.source_dir {
        Some(dir) => dir,
        None => facts.workspace()?.to_string_lossy().into_owned(),
    };
    let service_number = scanned
        .service_number
        .or_else(|| facts.run_number().map(str::to_string));
    let vcs_branch = scanned
        .vcs_branch
        .or_else(|| facts.branch().map(str::to_string));

    let output_type = scanned.output_type.or(user.output_type);
    let output_path = match scanned.output_path.or(user.output_path) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = default_output_path(
                output_type.as_deref().unwrap_or(DEFAULT_OUTPUT_TYPE),
                &commit_sha,
            );
            info!(
                "--output-path parameter is missing, coverage data will be stored at {}",
                path.display()
            );
            path
        }
    };

    Ok(MergedConfig {
        branch: scanned.branch || user.branch,
        ignore_not_existing: scanned.ignore_not_existing || user.ignore_not_existing,
        llvm: scanned.llvm || user.llvm,
        commit_sha,
        filter: scanned.filter.or(user.filter),
        ignore: prefer(scanned.ignore, user.ignore),
        path_mapping: prefer(scanned.path_mapping, user.path_mapping),
        output_path,
        output_type,
        prefix_dir: scanned.prefix_dir.or(user.prefix_dir),
        exclusions: Exclusions {
            excl_br_line: scanned.excl_br_line.or(user.excl_br_line),
            excl_br_start: scanned.excl_br_start.or(user.excl_br_start),
            excl_br_stop: scanned.excl_br_stop.or(user.excl_br_stop),
            excl_line: scanned.excl_line.or(user.excl_line),
            excl_start: scanned.excl_start.or(user.excl_start),
            excl_stop: scanned.excl_stop.or(user.excl_stop),
        },
        service_name,
        service_job_id,
        service_number,
        vcs_branch,
        source_dir,
        passthrough: scanned.passthrough,
    })
}

/// Default report location in the temp directory.
///
/// lcov reports embed the commit so parallel jobs on one host do not
/// collide; other output types get a fixed basename.
pub fn default_output_path(output_type: &str, commit_sha: &str) -> PathBuf {
    let name = if output_type == DEFAULT_OUTPUT_TYPE {
        format!("lcov-{commit_sha}.info")
    } else {
        GENERIC_REPORT_NAME.to_string()
    };
    std::env::temp_dir().join(name)
}

fn prefer(explicit: Vec<String>, fallback: Vec<String>) -> Vec<String> {
    if explicit.is_empty() {
        fallback
    } else {
        explicit
    }
}

#[cfg(test)]
mod tests {
    use super::system::*;
    use super::*;
    use crate::error::GrcovCiError;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn ci_env() -> Environment {
        Environment::from_pairs([
            (WORKSPACE_VAR, "/home/runner/work/app"),
            (COMMIT_SHA_VAR, "deadbeef"),
            (SERVICE_NAME_VAR, "CI"),
            (RUN_ID_VAR, "42"),
        ])
    }

    fn write_yaml(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grcov.yml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_explicit_values_are_not_overridden() {
        let config = resolve("-o report.info --commit-sha abc123", None, &ci_env()).unwrap();
        assert_eq!(config.output_path, PathBuf::from("report.info"));
        assert_eq!(config.commit_sha, "abc123");
        assert_eq!(config.service_name, "CI");
        assert_eq!(config.service_job_id, "42");
        assert_eq!(config.source_dir, "/home/runner/work/app");
    }

    #[test]
    fn test_default_lcov_path_embeds_commit() {
        let config = resolve("", None, &ci_env()).unwrap();
        assert_eq!(
            config.output_path.file_name().unwrap(),
            "lcov-deadbeef.info"
        );
        assert!(config.output_path.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_default_path_for_other_output_types() {
        let config = resolve("-t html", None, &ci_env()).unwrap();
        assert_eq!(config.output_path.file_name().unwrap(), "coverage");
        assert_eq!(config.effective_output_type(), "html");
    }

    #[test]
    fn test_yaml_output_type_drives_default_path() {
        let (_dir, path) = write_yaml("output-type: coveralls\n");
        let config = resolve("", Some(&path), &ci_env()).unwrap();
        assert_eq!(config.output_type.as_deref(), Some("coveralls"));
        assert_eq!(config.output_path.file_name().unwrap(), "coverage");
    }

    #[test]
    fn test_explicit_flag_beats_yaml() {
        let (_dir, path) = write_yaml(
            "output-path: from-yaml.info\nfilter: uncovered\nignore:\n  - yaml/*\n",
        );
        let config = resolve(
            "--output-file cli.info --filter covered --ignore cli/*",
            Some(&path),
            &ci_env(),
        )
        .unwrap();
        assert_eq!(config.output_path, PathBuf::from("cli.info"));
        assert_eq!(config.filter.as_deref(), Some("covered"));
        assert_eq!(config.ignore, vec!["cli/*"]);
    }

    #[test]
    fn test_yaml_fills_absent_flags() {
        let (_dir, path) = write_yaml(
            "branch: true\nprefix-dir: /src\nexcl-line: NOCOV\npath-mapping:\n  - a\n  - b\n",
        );
        let config = resolve("", Some(&path), &ci_env()).unwrap();
        assert!(config.branch);
        assert_eq!(config.prefix_dir.as_deref(), Some("/src"));
        assert_eq!(config.exclusions.excl_line.as_deref(), Some("NOCOV"));
        assert_eq!(config.path_mapping, vec!["a", "b"]);
    }

    #[test]
    fn test_legacy_yaml_key_populates_output_path() {
        let (_dir, path) = write_yaml("output-file: ./legacy.info\n");
        let config = resolve("", Some(&path), &ci_env()).unwrap();
        assert_eq!(config.output_path, PathBuf::from("./legacy.info"));
    }

    #[test]
    fn test_missing_yaml_file_is_not_fatal() {
        let dir = tempdir().unwrap();
        let config = resolve("", Some(&dir.path().join("absent.yml")), &ci_env()).unwrap();
        assert_eq!(config.ignore, Vec::<String>::new());
        assert!(!config.branch);
    }

    #[test]
    fn test_missing_fact_is_named() {
        let env = Environment::from_pairs([
            (WORKSPACE_VAR, "/w"),
            (COMMIT_SHA_VAR, "abc"),
            (SERVICE_NAME_VAR, "CI"),
        ]);
        let err = resolve("", None, &env).unwrap_err();
        match err {
            GrcovCiError::MissingEnv(name) => assert_eq!(name, RUN_ID_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_facts_only_required_when_filling_gaps() {
        let raw = "--commit-sha c --service-name s --service-job-id j --source-dir d -o out";
        let config = resolve(raw, None, &Environment::default()).unwrap();
        assert_eq!(config.commit_sha, "c");
        assert_eq!(config.source_dir, "d");
        assert_eq!(config.service_number, None);
        assert_eq!(config.vcs_branch, None);
    }

    #[test]
    fn test_optional_facts_are_filled() {
        let env = ci_env()
            .with(RUN_NUMBER_VAR, "7")
            .with(REF_VAR, "refs/heads/main");
        let config = resolve("", None, &env).unwrap();
        assert_eq!(config.service_number.as_deref(), Some("7"));
        assert_eq!(config.vcs_branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_merged_config_serializes_for_logging() {
        let config = resolve("--llvm -t html", None, &ci_env()).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["llvm"], true);
        assert_eq!(json["output_type"], "html");
        assert_eq!(json["service_job_id"], "42");
    }

    #[test]
    fn test_user_config_path() {
        let env = ci_env();
        assert_eq!(
            user_config_path(&env, None).unwrap(),
            PathBuf::from("/home/runner/work/app/.github/actions-rs/grcov.yml")
        );
        assert_eq!(
            user_config_path(&env, Some(Path::new("ci/grcov.yml"))).unwrap(),
            PathBuf::from("/home/runner/work/app/ci/grcov.yml")
        );
    }

    proptest! {
        #[test]
        fn prop_present_output_flag_is_never_replaced(
            path in "[a-z]{1,12}\\.info",
            yaml_path in "[a-z]{1,12}\\.json",
        ) {
            let (_dir, config_path) = write_yaml(&format!("output-path: {yaml_path}\n"));
            let config = resolve(&format!("-o {path}"), Some(&config_path), &ci_env()).unwrap();
            prop_assert_eq!(config.output_path, PathBuf::from(path));
        }
    }
}
