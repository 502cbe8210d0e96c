//! Error taxonomy for coverage collection and configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrcovCiError {
    #[error("Environment variable \"{0}\" is not defined")]
    MissingEnv(String),

    #[error("{flag} parameter is missing its value")]
    MissingFlagValue { flag: String },

    #[error("Unable to split arguments: {0}")]
    Tokenize(String),

    #[error(
        "Unable to read {}: {source}. Was `cargo test` executed before collecting coverage?",
        path.display()
    )]
    LockfileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid lock file {}: {message}", path.display())]
    LockfileInvalid { path: PathBuf, message: String },

    #[error(
        "Unable to find any coverage files under {}, was `cargo test` executed with coverage instrumentation enabled?",
        target_dir.display()
    )]
    NoCoverageFiles { target_dir: PathBuf },

    #[error("Invalid coverage file pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for coverage collection and configuration.
pub type Result<T> = std::result::Result<T, GrcovCiError>;
