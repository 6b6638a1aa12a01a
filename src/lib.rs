//! Batch normalization of NIfTI volumes.
//!
//! Every file matching a suffix below a dataset root is taken through
//! first-volume extraction, deobliquing and reorientation by an external
//! toolkit (AFNI by default). Files run concurrently in isolated workspaces;
//! one file's failure never affects another, and the run always ends with a
//! `RunSummary`.

pub mod bootstrap;
pub mod cli;
pub mod common;
pub mod config;
pub mod discovery;
pub mod models;
pub mod workflow;

pub use common::errors::{DiscoveryError, RunError, ValidationError};
pub use config::RunConfig;
pub use models::{OrientationCode, RunSummary, WorkItem, WorkResult};
pub use workflow::{
    reporter::{NoopReporter, ProgressReporter},
    run_batch,
    toolkit::{AfniToolkit, Toolkit},
};
