//! Tokenizing and scanning of the raw grcov argument string.
//!
//! The scan only records which known options the caller supplied and the
//! value they gave. Values are never rewritten; absent options are the ones
//! the resolver later fills in.

use crate::error::{GrcovCiError, Result};

/// Split a user-supplied argument string the way a POSIX shell would.
pub fn tokenize(raw: &str) -> Result<Vec<String>> {
    shell_words::split(raw).map_err(|e| GrcovCiError::Tokenize(e.to_string()))
}

/// grcov options the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Branch,
    IgnoreNotExisting,
    Llvm,
    CommitSha,
    Filter,
    Ignore,
    PathMapping,
    OutputPath,
    OutputType,
    PrefixDir,
    ExclBrLine,
    ExclBrStart,
    ExclBrStop,
    ExclLine,
    ExclStart,
    ExclStop,
    ServiceName,
    ServiceJobId,
    ServiceNumber,
    VcsBranch,
    SourceDir,
}

impl Flag {
    pub const ALL: [Flag; 21] = [
        Flag::Branch,
        Flag::IgnoreNotExisting,
        Flag::Llvm,
        Flag::CommitSha,
        Flag::Filter,
        Flag::Ignore,
        Flag::PathMapping,
        Flag::OutputPath,
        Flag::OutputType,
        Flag::PrefixDir,
        Flag::ExclBrLine,
        Flag::ExclBrStart,
        Flag::ExclBrStop,
        Flag::ExclLine,
        Flag::ExclStart,
        Flag::ExclStop,
        Flag::ServiceName,
        Flag::ServiceJobId,
        Flag::ServiceNumber,
        Flag::VcsBranch,
        Flag::SourceDir,
    ];

    /// Recognize a flag spelling, including short and legacy aliases.
    pub fn from_token(token: &str) -> Option<Flag> {
        let flag = match token {
            "--branch" => Flag::Branch,
            "--ignore-not-existing" => Flag::IgnoreNotExisting,
            "--llvm" => Flag::Llvm,
            "--commit-sha" => Flag::CommitSha,
            "--filter" => Flag::Filter,
            "--ignore" => Flag::Ignore,
            "--path-mapping" => Flag::PathMapping,
            "-o" | "--output-path" | "--output-file" => Flag::OutputPath,
            "-t" | "--output-type" => Flag::OutputType,
            "-p" | "--prefix-dir" => Flag::PrefixDir,
            "--excl-br-line" => Flag::ExclBrLine,
            "--excl-br-start" => Flag::ExclBrStart,
            "--excl-br-stop" => Flag::ExclBrStop,
            "--excl-line" => Flag::ExclLine,
            "--excl-start" => Flag::ExclStart,
            "--excl-stop" => Flag::ExclStop,
            "--service-name" => Flag::ServiceName,
            "--service-job-id" | "--service-job-number" => Flag::ServiceJobId,
            "--service-number" => Flag::ServiceNumber,
            "--vcs-branch" => Flag::VcsBranch,
            "-s" | "--source-dir" => Flag::SourceDir,
            _ => return None,
        };
        Some(flag)
    }

    /// Current long spelling.
    pub fn long(self) -> &'static str {
        match self {
            Flag::Branch => "--branch",
            Flag::IgnoreNotExisting => "--ignore-not-existing",
            Flag::Llvm => "--llvm",
            Flag::CommitSha => "--commit-sha",
            Flag::Filter => "--filter",
            Flag::Ignore => "--ignore",
            Flag::PathMapping => "--path-mapping",
            Flag::OutputPath => "--output-path",
            Flag::OutputType => "--output-type",
            Flag::PrefixDir => "--prefix-dir",
            Flag::ExclBrLine => "--excl-br-line",
            Flag::ExclBrStart => "--excl-br-start",
            Flag::ExclBrStop => "--excl-br-stop",
            Flag::ExclLine => "--excl-line",
            Flag::ExclStart => "--excl-start",
            Flag::ExclStop => "--excl-stop",
            Flag::ServiceName => "--service-name",
            Flag::ServiceJobId => "--service-job-id",
            Flag::ServiceNumber => "--service-number",
            Flag::VcsBranch => "--vcs-branch",
            Flag::SourceDir => "--source-dir",
        }
    }

    pub fn takes_value(self) -> bool {
        !matches!(self, Flag::Branch | Flag::IgnoreNotExisting | Flag::Llvm)
    }
}

/// Options found in one pass over the raw tokens.
///
/// Single-valued options keep the last occurrence; repeatable ones keep
/// every occurrence in order. Tokens that are not known options end up in
/// `passthrough`, untouched and in their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagScan {
    pub branch: bool,
    pub ignore_not_existing: bool,
    pub llvm: bool,
    pub commit_sha: Option<String>,
    pub filter: Option<String>,
    pub ignore: Vec<String>,
    pub path_mapping: Vec<String>,
    pub output_path: Option<String>,
    pub output_type: Option<String>,
    pub prefix_dir: Option<String>,
    pub excl_br_line: Option<String>,
    pub excl_br_start: Option<String>,
    pub excl_br_stop: Option<String>,
    pub excl_line: Option<String>,
    pub excl_start: Option<String>,
    pub excl_stop: Option<String>,
    pub service_name: Option<String>,
    pub service_job_id: Option<String>,
    pub service_number: Option<String>,
    pub vcs_branch: Option<String>,
    pub source_dir: Option<String>,
    pub passthrough: Vec<String>,
}

impl FlagScan {
    pub fn is_present(&self, flag: Flag) -> bool {
        match flag {
            Flag::Branch => self.branch,
            Flag::IgnoreNotExisting => self.ignore_not_existing,
            Flag::Llvm => self.llvm,
            Flag::Ignore => !self.ignore.is_empty(),
            Flag::PathMapping => !self.path_mapping.is_empty(),
            other => self.value(other).is_some(),
        }
    }

    /// Value of a single-valued option, if supplied.
    pub fn value(&self, flag: Flag) -> Option<&str> {
        let slot = match flag {
            Flag::CommitSha => &self.commit_sha,
            Flag::Filter => &self.filter,
            Flag::OutputPath => &self.output_path,
            Flag::OutputType => &self.output_type,
            Flag::PrefixDir => &self.prefix_dir,
            Flag::ExclBrLine => &self.excl_br_line,
            Flag::ExclBrStart => &self.excl_br_start,
            Flag::ExclBrStop => &self.excl_br_stop,
            Flag::ExclLine => &self.excl_line,
            Flag::ExclStart => &self.excl_start,
            Flag::ExclStop => &self.excl_stop,
            Flag::ServiceName => &self.service_name,
            Flag::ServiceJobId => &self.service_job_id,
            Flag::ServiceNumber => &self.service_number,
            Flag::VcsBranch => &self.vcs_branch,
            Flag::SourceDir => &self.source_dir,
            Flag::Branch
            | Flag::IgnoreNotExisting
            | Flag::Llvm
            | Flag::Ignore
            | Flag::PathMapping => return None,
        };
        slot.as_deref()
    }

    fn record(&mut self, flag: Flag, value: String) {
        let slot = match flag {
            Flag::Branch => {
                self.branch = true;
                return;
            }
            Flag::IgnoreNotExisting => {
                self.ignore_not_existing = true;
                return;
            }
            Flag::Llvm => {
                self.llvm = true;
                return;
            }
            Flag::Ignore => {
                self.ignore.push(value);
                return;
            }
            Flag::PathMapping => {
                self.path_mapping.push(value);
                return;
            }
            Flag::CommitSha => &mut self.commit_sha,
            Flag::Filter => &mut self.filter,
            Flag::OutputPath => &mut self.output_path,
            Flag::OutputType => &mut self.output_type,
            Flag::PrefixDir => &mut self.prefix_dir,
            Flag::ExclBrLine => &mut self.excl_br_line,
            Flag::ExclBrStart => &mut self.excl_br_start,
            Flag::ExclBrStop => &mut self.excl_br_stop,
            Flag::ExclLine => &mut self.excl_line,
            Flag::ExclStart => &mut self.excl_start,
            Flag::ExclStop => &mut self.excl_stop,
            Flag::ServiceName => &mut self.service_name,
            Flag::ServiceJobId => &mut self.service_job_id,
            Flag::ServiceNumber => &mut self.service_number,
            Flag::VcsBranch => &mut self.vcs_branch,
            Flag::SourceDir => &mut self.source_dir,
        };
        *slot = Some(value);
    }
}

/// Scan tokens for known options.
///
/// Accepts `--flag value`, `--flag=value` and short options with an
/// attached value (`-o/tmp/lcov.info`). A value-taking flag at the very end
/// of the input is an error naming that flag.
pub fn scan(tokens: &[String]) -> Result<FlagScan> {
    let mut found = FlagScan::default();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        if let Some(flag) = Flag::from_token(token) {
            if flag.takes_value() {
                let value = iter
                    .next()
                    .ok_or_else(|| GrcovCiError::MissingFlagValue {
                        flag: token.clone(),
                    })?;
                found.record(flag, value.clone());
            } else {
                found.record(flag, String::new());
            }
            continue;
        }

        if let Some((flag, value)) = attached_short(token) {
            found.record(flag, value.to_string());
            continue;
        }

        if let Some((name, value)) = token.split_once('=') {
            if let Some(flag) = Flag::from_token(name).filter(|f| f.takes_value()) {
                found.record(flag, value.to_string());
                continue;
            }
        }

        found.passthrough.push(token.clone());
    }

    Ok(found)
}

/// `-o<value>` or `-o=<value>` for the value-taking short options.
fn attached_short(token: &str) -> Option<(Flag, &str)> {
    if token.starts_with("--") {
        return None;
    }
    let flag = Flag::from_token(token.get(..2)?).filter(|f| f.takes_value())?;
    let value = token.get(2..)?;
    let value = value.strip_prefix('=').unwrap_or(value);
    if value.is_empty() {
        return None;
    }
    Some((flag, value))
}
