//! Pipeline executor - runs one work item through the three stages
//!
//! Includes:
//! - Stage chaining inside a fresh workspace
//! - Final placement into the item's output path
//! - Conversion of every failure into a `WorkResult`

use anyhow::{Context, Error, anyhow};
use log::{debug, info, warn};
use std::{path::PathBuf, sync::Arc, time::Instant};

use crate::{
    models::{FailureKind, OrientationCode, Stage, WorkItem, WorkResult},
    workflow::{
        placement::place_output,
        toolkit::Toolkit,
        workspace::{Workspace, WorkspaceManager},
    },
};

struct ItemFailure {
    kind: FailureKind,
    error: Error,
}

impl ItemFailure {
    fn new(kind: FailureKind, error: Error) -> Self {
        Self { kind, error }
    }
}

#[derive(Clone)]
pub struct PipelineExecutor {
    toolkit: Arc<dyn Toolkit>,
    workspaces: WorkspaceManager,
    orientation: OrientationCode,
}

impl PipelineExecutor {
    pub fn new(
        toolkit: Arc<dyn Toolkit>,
        workspaces: WorkspaceManager,
        orientation: OrientationCode,
    ) -> Self {
        Self {
            toolkit,
            workspaces,
            orientation,
        }
    }

    /// Outer layer: turn the item's outcome into data. Never returns an error.
    pub fn run(&self, item: &WorkItem) -> WorkResult {
        let start_time = Instant::now();
        match self.execute(item) {
            Ok(()) => {
                info!(duration = &*format!("{:?}", start_time.elapsed());
                    "Normalized {:?}",
                    item.output_path()
                );
                WorkResult::success(item.input_path())
            }
            Err(failure) => {
                let message = format!("{:#}", failure.error);
                warn!(duration = &*format!("{:?}", start_time.elapsed());
                    "Failed {:?}: {}",
                    item.input_path(),
                    message
                );
                WorkResult::error(item.input_path(), failure.kind, message)
            }
        }
    }

    /// Inner layer: workspace lifetime around the stage chain.
    fn execute(&self, item: &WorkItem) -> Result<(), ItemFailure> {
        let workspace = self
            .workspaces
            .acquire()
            .map_err(|err| ItemFailure::new(FailureKind::Setup, err))?;

        let outcome = self
            .run_stages(item, &workspace)
            .and_then(|finished| {
                place_output(&finished, item.output_path())
                    .map_err(|err| ItemFailure::new(FailureKind::Placement, err))
            });

        // Cleanup problems are not processing problems.
        if let Err(err) = workspace.release() {
            warn!("Workspace cleanup for {:?} failed: {:#}", item.input_path(), err);
        }
        outcome
    }

    fn run_stages(&self, item: &WorkItem, workspace: &Workspace) -> Result<PathBuf, ItemFailure> {
        let mut current = item.input_path().to_path_buf();
        for stage in Stage::ALL {
            let output = workspace.file(stage.intermediate_name());
            debug!("Running {} on {:?}", stage, current);

            self.toolkit
                .run_stage(stage, &current, &output, self.orientation)
                .and_then(|()| {
                    if output.is_file() {
                        Ok(())
                    } else {
                        Err(anyhow!("no output file was written at {:?}", output))
                    }
                })
                .with_context(|| format!("{} failed for {:?}", stage, item.input_path()))
                .map_err(|err| ItemFailure::new(FailureKind::Stage(stage), err))?;

            current = output;
        }
        Ok(current)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use std::{
        fs,
        path::Path,
        sync::Mutex,
    };
    use tempfile::TempDir;

    /// Copies input to output and appends the stage name; fails on request.
    #[derive(Default)]
    pub(crate) struct ScriptedToolkit {
        pub fail_at: Option<Stage>,
        pub seen_workspaces: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedToolkit {
        fn step(&self, stage: Stage, input: &Path, output: &Path) -> Result<()> {
            if let Some(parent) = output.parent() {
                self.seen_workspaces.lock().unwrap().push(parent.to_path_buf());
            }
            if self.fail_at == Some(stage) {
                fs::write(output, b"half-written")?;
                bail!("{} exploded", stage);
            }
            let mut data = fs::read(input)?;
            data.extend_from_slice(format!("|{}", stage).as_bytes());
            fs::write(output, data)?;
            Ok(())
        }
    }

    impl Toolkit for ScriptedToolkit {
        fn extract_first_volume(&self, input: &Path, output: &Path) -> Result<()> {
            self.step(Stage::ExtractVolume, input, output)
        }

        fn deoblique(&self, input: &Path, output: &Path) -> Result<()> {
            self.step(Stage::Deoblique, input, output)
        }

        fn reorient(&self, input: &Path, output: &Path, orientation: OrientationCode) -> Result<()> {
            self.step(Stage::Reorient, input, output)?;
            let mut data = fs::read(output)?;
            data.extend_from_slice(format!(":{}", orientation).as_bytes());
            fs::write(output, data)?;
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        data: PathBuf,
        scratch: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let scratch = dir.path().join("scratch");
        fs::create_dir_all(&data).unwrap();
        Fixture {
            data,
            scratch,
            _dir: dir,
        }
    }

    fn executor(toolkit: Arc<ScriptedToolkit>, scratch: &Path) -> PipelineExecutor {
        PipelineExecutor::new(
            toolkit,
            WorkspaceManager::new(scratch),
            "RAS".parse().unwrap(),
        )
    }

    fn scratch_is_empty(scratch: &Path) -> bool {
        fs::read_dir(scratch).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    #[test]
    fn successful_run_replaces_input_in_place() {
        let fx = fixture();
        let input = fx.data.join("sub-01_T1w.nii.gz");
        fs::write(&input, b"raw").unwrap();

        let toolkit = Arc::new(ScriptedToolkit::default());
        let result = executor(toolkit.clone(), &fx.scratch).run(&WorkItem::in_place(&input));

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(
            fs::read_to_string(&input).unwrap(),
            "raw|volume extraction|deoblique|reorientation:RAS"
        );
        assert!(scratch_is_empty(&fx.scratch));

        // All three stages ran in the same workspace.
        let seen = toolkit.seen_workspaces.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|p| p == &seen[0]));
    }

    #[test]
    fn stage_failure_keeps_input_and_cleans_workspace() {
        let fx = fixture();
        let input = fx.data.join("sub-01_T1w.nii.gz");
        fs::write(&input, b"raw").unwrap();

        let toolkit = Arc::new(ScriptedToolkit {
            fail_at: Some(Stage::Deoblique),
            ..Default::default()
        });
        let result = executor(toolkit, &fx.scratch).run(&WorkItem::in_place(&input));

        assert_eq!(result.failure_kind(), Some(FailureKind::Stage(Stage::Deoblique)));
        assert!(result.error_message().unwrap().contains("deoblique exploded"));
        assert_eq!(fs::read(&input).unwrap(), b"raw");
        assert!(scratch_is_empty(&fx.scratch));
    }

    #[test]
    fn output_root_leaves_input_untouched() {
        let fx = fixture();
        let input = fx.data.join("sub-02_T1w.nii.gz");
        fs::write(&input, b"raw").unwrap();
        let out_root = fx.data.join("derivatives/normalized");

        let item = WorkItem::with_output_root(&input, &out_root);
        let result = executor(Arc::new(ScriptedToolkit::default()), &fx.scratch).run(&item);

        assert!(result.is_success());
        assert_eq!(fs::read(&input).unwrap(), b"raw");
        assert!(out_root.join("sub-02_T1w.nii.gz").is_file());
    }

    #[test]
    fn unwritable_output_is_a_placement_failure() {
        let fx = fixture();
        let input = fx.data.join("sub-03_T1w.nii.gz");
        fs::write(&input, b"raw").unwrap();
        // A regular file where the output directory should be.
        let blocker = fx.data.join("blocked");
        fs::write(&blocker, b"").unwrap();

        let item = WorkItem::with_output_root(&input, &blocker.join("out"));
        let result = executor(Arc::new(ScriptedToolkit::default()), &fx.scratch).run(&item);

        assert_eq!(result.failure_kind(), Some(FailureKind::Placement));
        assert!(scratch_is_empty(&fx.scratch));
    }

    #[test]
    fn missing_input_fails_first_stage() {
        let fx = fixture();
        let item = WorkItem::in_place(fx.data.join("ghost_T1w.nii.gz"));
        let result = executor(Arc::new(ScriptedToolkit::default()), &fx.scratch).run(&item);
        assert_eq!(
            result.failure_kind(),
            Some(FailureKind::Stage(Stage::ExtractVolume))
        );
    }

    #[test]
    fn unusable_scratch_root_is_a_setup_failure() {
        let fx = fixture();
        let input = fx.data.join("sub-04_T1w.nii.gz");
        fs::write(&input, b"raw").unwrap();
        let scratch_file = fx.data.join("scratch-file");
        fs::write(&scratch_file, b"").unwrap();

        let result = executor(Arc::new(ScriptedToolkit::default()), &scratch_file)
            .run(&WorkItem::in_place(&input));
        assert_eq!(result.failure_kind(), Some(FailureKind::Setup));
        assert_eq!(fs::read(&input).unwrap(), b"raw");
    }
}
