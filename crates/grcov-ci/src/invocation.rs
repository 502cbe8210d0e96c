//! grcov command-line synthesis.
//!
//! Arguments are always emitted in the same order so that identical
//! configurations produce identical command lines:
//!
//! 1. the input path (archive), when there is one
//! 2. boolean flags that are enabled
//! 3. key/value options that are set, repeatable ones in their given order
//! 4. any tokens the caller passed that are not known options

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::config::{Flag, MergedConfig};

/// A grcov release number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ToolVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the output of `grcov --version`, e.g. `grcov 0.8.19`.
    pub fn from_version_output(output: &str) -> Option<Self> {
        output
            .split_whitespace()
            .find_map(|word| word.trim_start_matches('v').parse().ok())
    }
}

impl FromStr for ToolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s.split(['-', '+']).next().unwrap_or(s);
        let mut parts = core.split('.');
        let mut next = |what: &str| -> Result<u64, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {what} version in {s:?}"))?
                .parse()
                .map_err(|e| format!("invalid {what} version in {s:?}: {e}"))
        };
        let version = ToolVersion::new(next("major")?, next("minor")?, next("patch")?);
        if parts.next().is_some() {
            return Err(format!("unexpected extra version component in {s:?}"));
        }
        Ok(version)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// grcov renamed `--output-file` to `--output-path` in this release.
pub const OUTPUT_PATH_SINCE: ToolVersion = ToolVersion::new(0, 6, 0);

/// Flag spellings understood by a particular grcov release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSet {
    output_path: &'static str,
}

impl FlagSet {
    pub const fn current() -> Self {
        Self {
            output_path: "--output-path",
        }
    }

    /// Spellings for `version`; unknown versions get the current ones.
    pub fn for_version(version: Option<ToolVersion>) -> Self {
        match version {
            Some(v) if v < OUTPUT_PATH_SINCE => Self {
                output_path: "--output-file",
            },
            _ => Self::current(),
        }
    }

    pub fn spelling(&self, flag: Flag) -> &'static str {
        match flag {
            Flag::OutputPath => self.output_path,
            other => other.long(),
        }
    }
}

impl Default for FlagSet {
    fn default() -> Self {
        Self::current()
    }
}

/// Synthesize arguments using current flag spellings.
pub fn synthesize(
    config: &MergedConfig,
    archive: Option<&Path>,
    destination: &Path,
) -> Vec<String> {
    synthesize_with(FlagSet::current(), config, archive, destination)
}

/// Synthesize arguments for a specific flag dialect.
pub fn synthesize_with(
    flags: FlagSet,
    config: &MergedConfig,
    archive: Option<&Path>,
    destination: &Path,
) -> Vec<String> {
    let mut args = ArgList::new(flags);

    if let Some(archive) = archive {
        args.positional(archive.to_string_lossy());
    }

    args.switch(Flag::Branch, config.branch);
    args.switch(Flag::IgnoreNotExisting, config.ignore_not_existing);
    args.switch(Flag::Llvm, config.llvm);

    args.option(Flag::CommitSha, Some(&config.commit_sha));
    args.option(Flag::Filter, config.filter.as_ref());
    for dir in &config.ignore {
        args.option(Flag::Ignore, Some(dir));
    }
    for mapping in &config.path_mapping {
        args.option(Flag::PathMapping, Some(mapping));
    }
    args.option(
        Flag::OutputPath,
        Some(&destination.to_string_lossy().into_owned()),
    );
    args.option(Flag::OutputType, config.output_type.as_ref());
    args.option(Flag::PrefixDir, config.prefix_dir.as_ref());

    let excl = &config.exclusions;
    args.option(Flag::ExclBrLine, excl.excl_br_line.as_ref());
    args.option(Flag::ExclBrStart, excl.excl_br_start.as_ref());
    args.option(Flag::ExclBrStop, excl.excl_br_stop.as_ref());
    args.option(Flag::ExclLine, excl.excl_line.as_ref());
    args.option(Flag::ExclStart, excl.excl_start.as_ref());
    args.option(Flag::ExclStop, excl.excl_stop.as_ref());

    args.option(Flag::ServiceName, Some(&config.service_name));
    args.option(Flag::ServiceJobId, Some(&config.service_job_id));
    args.option(Flag::ServiceNumber, config.service_number.as_ref());
    args.option(Flag::VcsBranch, config.vcs_branch.as_ref());
    args.option(Flag::SourceDir, Some(&config.source_dir));

    for token in &config.passthrough {
        args.positional(token.as_str());
    }

    args.into_inner()
}

struct ArgList {
    flags: FlagSet,
    args: Vec<String>,
}

impl ArgList {
    fn new(flags: FlagSet) -> Self {
        Self {
            flags,
            args: Vec::new(),
        }
    }

    fn positional(&mut self, value: impl Into<String>) {
        self.args.push(value.into());
    }

    fn switch(&mut self, flag: Flag, enabled: bool) {
        if enabled {
            self.args.push(self.flags.spelling(flag).to_string());
        }
    }

    fn option(&mut self, flag: Flag, value: Option<&String>) {
        if let Some(value) = value {
            self.args.push(self.flags.spelling(flag).to_string());
            self.args.push(value.clone());
        }
    }

    fn into_inner(self) -> Vec<String> {
        self.args
    }
}
