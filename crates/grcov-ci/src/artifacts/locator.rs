//! Discovery of the crate and binary names that make up a project.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{GrcovCiError, Result};

/// Name of a buildable unit (library or binary) in the project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name as it appears in emitted build files.
    pub fn normalized(&self) -> String {
        normalize(&self.0)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cargo writes crate names with underscores in output file names.
pub fn normalize(name: &str) -> String {
    name.replace('-', "_")
}

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    bin: Vec<BinTarget>,
}

#[derive(Debug, Deserialize)]
struct BinTarget {
    name: Option<String>,
}

/// Every artifact name relevant to the project rooted at `root`.
///
/// `Cargo.lock` must exist: coverage is collected after the test run, which
/// always writes it. Manifests that fail to parse are skipped, and so is
/// anything under `target_dir` (relative to `root`).
pub fn locate(root: &Path, target_dir: &Path) -> Result<BTreeSet<ArtifactName>> {
    let mut names = workspace_members(root)?;
    names.extend(named_binaries(root, target_dir));
    info!(
        "Found project crates: {}",
        names
            .iter()
            .map(ArtifactName::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(names)
}

/// Packages in `Cargo.lock` without a `source`, i.e. local members.
pub fn workspace_members(root: &Path) -> Result<BTreeSet<ArtifactName>> {
    let path = root.join("Cargo.lock");
    let contents =
        std::fs::read_to_string(&path).map_err(|source| GrcovCiError::LockfileUnreadable {
            path: path.clone(),
            source,
        })?;
    parse_lockfile(&contents).map_err(|message| GrcovCiError::LockfileInvalid { path, message })
}

fn parse_lockfile(contents: &str) -> std::result::Result<BTreeSet<ArtifactName>, String> {
    let lock: Lockfile = toml::from_str(contents).map_err(|e| e.to_string())?;
    Ok(lock
        .package
        .into_iter()
        .filter(|pkg| pkg.source.is_none())
        .map(|pkg| ArtifactName::new(pkg.name))
        .collect())
}

/// Explicit `[[bin]]` names from every `Cargo.toml` under `root`.
///
/// The build output directory and hidden directories are not searched.
pub fn named_binaries(root: &Path, target_dir: &Path) -> BTreeSet<ArtifactName> {
    let mut bins = BTreeSet::new();
    for manifest in manifest_files(root, &root.join(target_dir)) {
        match read_bin_names(&manifest) {
            Ok(names) => bins.extend(names),
            Err(reason) => warn!("Skipping manifest {}: {reason}", manifest.display()),
        }
    }
    debug!("bins found: {bins:?}");
    bins
}

fn manifest_files(root: &Path, target: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/**/Cargo.toml",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let paths = match glob::glob_with(&pattern, options) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Unable to search for manifests under {}: {e}", root.display());
            return Vec::new();
        }
    };

    paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable path while searching manifests: {e}");
                None
            }
        })
        .filter(|path| path.is_file() && !path.starts_with(target) && !is_hidden(root, path))
        .collect()
}

fn is_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|relative| {
            relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        })
        .unwrap_or(false)
}

fn read_bin_names(path: &Path) -> std::result::Result<Vec<ArtifactName>, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let manifest: Manifest = toml::from_str(&contents).map_err(|e| e.to_string())?;
    Ok(manifest
        .bin
        .into_iter()
        .filter_map(|bin| bin.name)
        .map(ArtifactName::new)
        .collect())
}
