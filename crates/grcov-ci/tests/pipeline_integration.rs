//! Integration tests for the coverage pipeline against a fake grcov.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use grcov_ci::config::system::{
    COMMIT_SHA_VAR, OUTPUT_FILE_VAR, RUN_ID_VAR, SERVICE_NAME_VAR, WORKSPACE_VAR,
};
use grcov_ci::{
    CollectorOptions, CoveragePipeline, Environment, Installer, PipelineInputs, PipelineMode,
};
use tempfile::TempDir;

const LOCK: &str = r#"
version = 3

[[package]]
name = "my-app"
version = "0.1.0"

[[package]]
name = "serde"
version = "1.0.200"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

struct NoInstall;

#[async_trait]
impl Installer for NoInstall {
    async fn install(&self, _env: &Environment) -> anyhow::Result<()> {
        anyhow::bail!("grcov should already be on PATH")
    }
}

/// A CI job sandbox: project checkout, fake grcov and scratch space.
struct Sandbox {
    project: TempDir,
    bin: TempDir,
    scratch: TempDir,
}

impl Sandbox {
    fn new(grcov_version: &str) -> Self {
        let sandbox = Self {
            project: tempfile::tempdir().unwrap(),
            bin: tempfile::tempdir().unwrap(),
            scratch: tempfile::tempdir().unwrap(),
        };
        sandbox.install_fake_grcov(grcov_version);
        sandbox
    }

    /// Fake grcov: records its arguments next to itself and writes a report.
    fn install_fake_grcov(&self, version: &str) {
        let script = format!(
            r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "grcov {version}"
    exit 0
fi
printf '%s\n' "$@" > "$(dirname "$0")/args.log"
out=""
while [ $# -gt 0 ]; do
    case "$1" in
        --output-path|--output-file) out="$2"; shift ;;
    esac
    shift
done
echo "TN:" > "$out"
"#
        );
        let path = self.bin.path().join("grcov");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn write_project(&self) {
        let root = self.project.path();
        std::fs::write(root.join("Cargo.lock"), LOCK).unwrap();
        std::fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"my-app\"\n\n[[bin]]\nname = \"my-tool\"\n",
        )
        .unwrap();
        let deps = root.join("target/debug/deps");
        std::fs::create_dir_all(&deps).unwrap();
        std::fs::write(deps.join("my_app-0a1b.gcda"), b"app").unwrap();
        std::fs::write(deps.join("my_app-0a1b.gcno"), b"app notes").unwrap();
        std::fs::write(deps.join("my_tool-9f8e.gcda"), b"tool").unwrap();
        std::fs::write(deps.join("serde-1234.gcda"), b"dependency").unwrap();
    }

    fn write_yaml(&self, contents: &str) {
        let dir = self.project.path().join(".github/actions-rs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("grcov.yml"), contents).unwrap();
    }

    fn env(&self) -> Environment {
        Environment::from_pairs([
            ("PATH", self.bin.path().display().to_string()),
            (WORKSPACE_VAR, self.project.path().display().to_string()),
            (COMMIT_SHA_VAR, "deadbeef".to_string()),
            (SERVICE_NAME_VAR, "CI".to_string()),
            (RUN_ID_VAR, "42".to_string()),
            (OUTPUT_FILE_VAR, self.outputs_file().display().to_string()),
        ])
    }

    fn report_path(&self) -> PathBuf {
        self.scratch.path().join("lcov.info")
    }

    fn outputs_file(&self) -> PathBuf {
        self.scratch.path().join("github_output")
    }

    fn recorded_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.bin.path().join("args.log"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn report_inputs(&self, raw_args: String) -> PipelineInputs {
        PipelineInputs {
            raw_args,
            config_path: None,
            mode: PipelineMode::Report(CollectorOptions {
                archive_dir: self.scratch.path().to_path_buf(),
                ..CollectorOptions::default()
            }),
        }
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn archive_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Test: multi-crate report archives project coverage and publishes `report`
#[tokio::test]
async fn test_report_pipeline() {
    let sandbox = Sandbox::new("0.8.19");
    sandbox.write_project();
    sandbox.write_yaml("branch: true\nignore:\n  - \"/*\"\noutput-type: lcov\n");

    let inputs = sandbox.report_inputs(format!("-o {}", sandbox.report_path().display()));
    let result = CoveragePipeline::run(&inputs, &sandbox.env(), &NoInstall)
        .await
        .expect("pipeline failed");

    assert_eq!(result.output_path, sandbox.report_path());
    assert!(result.output_path.is_file(), "grcov should write the report");

    let archive = result.archive.expect("report mode creates an archive");
    assert!(archive.path.starts_with(sandbox.scratch.path()));
    assert_eq!(
        archive_entries(&archive.path),
        vec!["my_app-0a1b.gcda", "my_app-0a1b.gcno", "my_tool-9f8e.gcda"]
    );

    let args = sandbox.recorded_args();
    assert_eq!(args, result.args);
    assert_eq!(args[0], archive.path.display().to_string());
    assert!(args.contains(&"--branch".to_string()));
    assert_eq!(value_after(&args, "--ignore"), Some("/*"));
    assert_eq!(value_after(&args, "--commit-sha"), Some("deadbeef"));
    assert_eq!(value_after(&args, "--service-name"), Some("CI"));
    assert_eq!(value_after(&args, "--service-job-id"), Some("42"));
    assert_eq!(
        value_after(&args, "--output-path"),
        Some(sandbox.report_path().display().to_string().as_str())
    );

    let outputs = std::fs::read_to_string(sandbox.outputs_file()).unwrap();
    assert_eq!(
        outputs,
        format!("report={}\n", sandbox.report_path().display())
    );
}

/// Test: passthrough forwards raw tokens and skips the default YAML file
#[tokio::test]
async fn test_passthrough_pipeline() {
    let sandbox = Sandbox::new("0.8.19");
    sandbox.write_yaml("branch: true\n");

    let inputs = PipelineInputs {
        raw_args: format!(
            "./target/debug/ -s . --llvm -o {}",
            sandbox.report_path().display()
        ),
        config_path: None,
        mode: PipelineMode::Passthrough,
    };
    let result = CoveragePipeline::run(&inputs, &sandbox.env(), &NoInstall)
        .await
        .expect("pipeline failed");

    assert!(result.archive.is_none());
    let args = sandbox.recorded_args();
    assert!(!args.contains(&"--branch".to_string()));
    assert!(args.contains(&"--llvm".to_string()));
    assert_eq!(value_after(&args, "--source-dir"), Some("."));
    assert_eq!(args.last().map(String::as_str), Some("./target/debug/"));

    let outputs = std::fs::read_to_string(sandbox.outputs_file()).unwrap();
    assert_eq!(
        outputs,
        format!("output-path={}\n", sandbox.report_path().display())
    );
}

/// Test: passthrough applies a YAML file named explicitly
#[tokio::test]
async fn test_passthrough_with_explicit_config() {
    let sandbox = Sandbox::new("0.8.19");
    sandbox.write_yaml("branch: true\nprefix-dir: /src\n");

    let inputs = PipelineInputs {
        raw_args: format!("-o {}", sandbox.report_path().display()),
        config_path: Some(PathBuf::from(".github/actions-rs/grcov.yml")),
        mode: PipelineMode::Passthrough,
    };
    CoveragePipeline::run(&inputs, &sandbox.env(), &NoInstall)
        .await
        .expect("pipeline failed");

    let args = sandbox.recorded_args();
    assert!(args.contains(&"--branch".to_string()));
    assert_eq!(value_after(&args, "--prefix-dir"), Some("/src"));
}

/// Test: old grcov releases get the legacy output flag
#[tokio::test]
async fn test_old_grcov_gets_output_file() {
    let sandbox = Sandbox::new("0.5.15");
    sandbox.write_project();

    let inputs = sandbox.report_inputs(format!("-o {}", sandbox.report_path().display()));
    CoveragePipeline::run(&inputs, &sandbox.env(), &NoInstall)
        .await
        .expect("pipeline failed");

    let args = sandbox.recorded_args();
    assert!(args.contains(&"--output-file".to_string()));
    assert!(!args.contains(&"--output-path".to_string()));
    assert!(sandbox.report_path().is_file());
}

/// Test: a project without coverage data fails before grcov runs
#[tokio::test]
async fn test_no_coverage_files() {
    let sandbox = Sandbox::new("0.8.19");
    std::fs::write(sandbox.project.path().join("Cargo.lock"), LOCK).unwrap();
    std::fs::create_dir_all(sandbox.project.path().join("target/debug")).unwrap();

    let inputs = sandbox.report_inputs(String::new());
    let err = CoveragePipeline::run(&inputs, &sandbox.env(), &NoInstall)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to collect coverage files");
    assert!(!sandbox.bin.path().join("args.log").exists());
    assert!(!sandbox.outputs_file().exists());
}
