//! Collection of coverage data files into a single zip archive.

use std::collections::{BTreeSet, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::locator::{locate, ArtifactName};
use crate::error::{GrcovCiError, Result};

/// Extensions of the files an instrumented build leaves behind.
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["gcda", "gcno"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorOptions {
    /// Build output directory, relative to the project root.
    pub target_dir: PathBuf,
    /// Allowed coverage file extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Directory the archive is created in.
    pub archive_dir: PathBuf,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("target"),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            archive_dir: std::env::temp_dir(),
        }
    }
}

/// A zip archive of coverage files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    /// In-archive entry names, in the order written.
    pub entries: Vec<String>,
}

/// Locate the project's artifacts and bundle their coverage files.
pub fn collect(root: &Path, options: &CollectorOptions) -> Result<Archive> {
    let names = locate(root, &options.target_dir)?;
    let target_dir = root.join(&options.target_dir);
    let files = find_coverage_files(&target_dir, &names, &options.extensions)?;
    if files.is_empty() {
        return Err(GrcovCiError::NoCoverageFiles { target_dir });
    }

    let path = options
        .archive_dir
        .join(format!("coverage-{}.zip", Uuid::new_v4().simple()));
    debug!("Creating an archive with coverage files at {}", path.display());
    let entries = write_archive(&files, &path)?;
    info!("Coverage files archive was created at {}", path.display());

    Ok(Archive { path, entries })
}

/// One `**/<name>*.<ext>` pattern per artifact and extension.
pub fn coverage_patterns(
    target_dir: &Path,
    names: &BTreeSet<ArtifactName>,
    extensions: &[String],
) -> Vec<String> {
    let base = Pattern::escape(&target_dir.to_string_lossy());
    let base = base.as_str();
    names
        .iter()
        .flat_map(|name| {
            let stem = Pattern::escape(&name.normalized());
            extensions
                .iter()
                .map(move |ext| format!("{base}/**/{stem}*.{ext}"))
        })
        .collect()
}

/// Regular files under `target_dir` that belong to one of `names`.
pub fn find_coverage_files(
    target_dir: &Path,
    names: &BTreeSet<ArtifactName>,
    extensions: &[String],
) -> Result<BTreeSet<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut files = BTreeSet::new();
    for pattern in coverage_patterns(target_dir, names, extensions) {
        let paths = glob::glob_with(&pattern, options).map_err(|e| {
            GrcovCiError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            }
        })?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path: {e}"),
            }
        }
    }
    Ok(files)
}

/// Write `files` into a new zip at `destination`, keyed by basename.
///
/// The destination must not exist yet. Later files whose basename is
/// already taken are skipped.
pub fn write_archive(files: &BTreeSet<PathBuf>, destination: &Path) -> Result<Vec<String>> {
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;
    let mut zip = ZipWriter::new(BufWriter::new(output));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for file in files {
        let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !seen.insert(name.clone()) {
            warn!(
                "Skipping {}: an entry named {name} is already archived",
                file.display()
            );
            continue;
        }

        info!("Archiving coverage file: {}", file.display());
        zip.start_file(name.as_str(), options)?;
        let mut input = File::open(file)?;
        std::io::copy(&mut input, &mut zip)?;
        entries.push(name);
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(entries)
}
