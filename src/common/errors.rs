//! Run-level error taxonomy.
//!
//! These errors abort a run before anything is dispatched. Failures of a
//! single item never use these types; they travel as `WorkResult` data.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid orientation '{given}'. Must be one of: {valid}")]
    Orientation { given: String, valid: String },

    #[error("File suffix must not be empty")]
    EmptySuffix,

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Dataset directory '{0}' does not exist")]
    MissingRoot(PathBuf),

    #[error("Dataset path '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to read dataset directory '{path}': {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk dataset directory '{root}': {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to start batch runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub type RunResult<T> = std::result::Result<T, RunError>;
