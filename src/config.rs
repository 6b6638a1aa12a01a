//! Run configuration
//!
//! Layers, highest priority first:
//! - command-line flags
//! - `NIFTI_NORMALIZE_*` environment variables (a `.env` file is honoured)
//! - built-in defaults

use std::path::PathBuf;

use log::debug;
use serde::Deserialize;

use crate::common::{CURRENT_NUM_THREADS, DEFAULT_SUFFIX, errors::ValidationError};
use crate::models::OrientationCode;

pub const ENV_PREFIX: &str = "NIFTI_NORMALIZE_";

// ────────────────────────────────────────────────────────────────
// Environment Layer
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvOverrides {
    pub jobs: Option<i64>,
    pub scratch_dir: Option<PathBuf>,
    pub afni_bin: Option<PathBuf>,
    pub suffix: Option<String>,
}

impl EnvOverrides {
    /// Load `.env` (if present) and read the prefixed variables.
    pub fn load() -> Result<Self, ValidationError> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded environment from {:?}", path);
        }
        Self::from_iter(std::env::vars())
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(|err| ValidationError::Config(err.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────
// Run Configuration
// ────────────────────────────────────────────────────────────────

/// Validated settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub dataset: PathBuf,
    pub output: Option<PathBuf>,
    pub orientation: OrientationCode,
    pub jobs: usize,
    pub suffix: String,
    pub scratch_dir: PathBuf,
    pub afni_bin: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            output: None,
            orientation: OrientationCode::default(),
            jobs: *CURRENT_NUM_THREADS,
            suffix: DEFAULT_SUFFIX.to_string(),
            scratch_dir: std::env::temp_dir(),
            afni_bin: None,
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn orientation(mut self, orientation: OrientationCode) -> Self {
        self.orientation = orientation;
        self
    }

    /// Zero or negative requests run one job at a time.
    pub fn jobs(mut self, jobs: i64) -> Self {
        self.jobs = clamp_jobs(jobs);
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    /// Take every value the environment layer sets. Flags applied
    /// afterwards win.
    pub fn apply_env(mut self, env: EnvOverrides) -> Self {
        if let Some(jobs) = env.jobs {
            self.jobs = clamp_jobs(jobs);
        }
        if let Some(suffix) = env.suffix {
            self.suffix = suffix;
        }
        if let Some(scratch_dir) = env.scratch_dir {
            self.scratch_dir = scratch_dir;
        }
        if let Some(afni_bin) = env.afni_bin {
            self.afni_bin = Some(afni_bin);
        }
        self
    }

    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.suffix.trim().is_empty() {
            return Err(ValidationError::EmptySuffix);
        }
        if self.dataset.as_os_str().is_empty() {
            return Err(ValidationError::Config("dataset path must not be empty".into()));
        }
        if let Some(output) = &self.output {
            if output.exists() && !output.is_dir() {
                return Err(ValidationError::Config(format!(
                    "output path {:?} exists and is not a directory",
                    output
                )));
            }
        }
        Ok(self)
    }

    pub fn output_mode(&self) -> String {
        match &self.output {
            Some(output) => output.display().to_string(),
            None => "In-place".to_string(),
        }
    }
}

pub fn clamp_jobs(jobs: i64) -> usize {
    usize::try_from(jobs).unwrap_or(0).max(1)
}
