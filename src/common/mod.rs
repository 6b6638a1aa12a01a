pub mod errors;

use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};

/// File name suffix searched for when no `--suffix` is given.
pub const DEFAULT_SUFFIX: &str = "T1w.nii.gz";

pub const DEFAULT_ORIENTATION: &str = "LPI";

pub const VALID_ORIENTATIONS: &[&str] = &[
    "RPI", "LPI", "RAI", "LAI", "RPS", "LPS", "RAS", "LAS", //
    "IPR", "IPL", "IAR", "IAL", "SPR", "SPL", "SAR", "SAL", //
    "PIR", "PIL", "AIR", "AIL", "PSR", "PSL", "ASR", "ASL",
];

pub const WORKSPACE_PREFIX: &str = "nifti_normalize";

pub const MAX_WORKSPACE_ATTEMPTS: u32 = 8;

pub const MAX_REMOVE_ATTEMPTS: u64 = 3;

/// Number of errors listed in the results panel before collapsing the rest.
pub const ERROR_DISPLAY_LIMIT: usize = 5;

pub const ERROR_MESSAGE_PREVIEW: usize = 100;

pub static CURRENT_NUM_THREADS: LazyLock<usize> = LazyLock::new(rayon::current_num_threads);

/// Runtime driving the dispatcher. Worker threads only await completions;
/// pipeline work happens on the blocking pool, sized to the job count.
pub fn build_batch_runtime(jobs: usize) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(jobs.max(1))
        .thread_name("batch-dispatch")
        .enable_all()
        .build()
}
