use clap::Parser;
use std::path::PathBuf;

use crate::{
    common::{DEFAULT_ORIENTATION, errors::ValidationError},
    config::{EnvOverrides, RunConfig},
    models::OrientationCode,
};

const EXAMPLES: &str = "\
Examples:
  nifti-normalize -d /path/to/dataset
  nifti-normalize -d /path/to/dataset -o /path/to/output -j 8
  nifti-normalize -d /path/to/dataset --orient RAS
  nifti-normalize -d /path/to/dataset --no-confirm

Orientation codes (default: LPI):
  L/R = Left/Right, A/P = Anterior/Posterior, I/S = Inferior/Superior
  Examples: LPI, RAS, LAI, etc.";

/// Correct NIfTI headers of T1w files using AFNI
#[derive(Parser, Debug, Clone)]
#[command(name = "nifti-normalize", version, after_help = EXAMPLES)]
pub struct Args {
    /// Path to dataset directory containing T1w files
    #[arg(short = 'd', long)]
    pub dataset: PathBuf,

    /// Output directory (if not specified, files are processed in-place)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Target orientation. Examples: RAS, LAI, RPI, etc.
    #[arg(
        long = "orient",
        visible_alias = "orientation",
        value_name = "ORIENT",
        default_value = DEFAULT_ORIENTATION
    )]
    pub orient: String,

    /// Number of parallel jobs (default: available CPUs)
    #[arg(short = 'j', long, allow_negative_numbers = true)]
    pub jobs: Option<i64>,

    /// Skip confirmation prompt
    #[arg(long)]
    pub no_confirm: bool,

    /// File name suffix to search for (default: T1w.nii.gz)
    #[arg(long)]
    pub suffix: Option<String>,

    /// Directory under which per-file workspaces are created
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Merge defaults, the environment layer and these flags, then validate.
    pub fn into_config(self, env: EnvOverrides) -> Result<RunConfig, ValidationError> {
        let orientation: OrientationCode = self.orient.parse()?;
        let mut config = RunConfig::new(self.dataset)
            .orientation(orientation)
            .apply_env(env);
        if let Some(output) = self.output {
            config = config.output(output);
        }
        if let Some(jobs) = self.jobs {
            config = config.jobs(jobs);
        }
        if let Some(suffix) = self.suffix {
            config = config.suffix(suffix);
        }
        if let Some(scratch_dir) = self.scratch_dir {
            config = config.scratch_dir(scratch_dir);
        }
        config.validate()
    }
}
