//! Coverage artifact discovery and bundling.
//!
//! The locator works out which crate and binary names belong to the
//! project; the collector globs the build output for their coverage files
//! and zips them up for grcov.

pub mod collector;
pub mod locator;

pub use collector::{
    collect, coverage_patterns, find_coverage_files, write_archive, Archive, CollectorOptions,
    DEFAULT_EXTENSIONS,
};
pub use locator::{locate, named_binaries, normalize, workspace_members, ArtifactName};
