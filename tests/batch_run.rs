use anyhow::{Result, bail};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;

use nifti_normalize::{
    DiscoveryError, NoopReporter, OrientationCode, RunConfig, RunError, Toolkit,
    models::{FailureKind, Stage},
    run_batch,
    workflow::reporter::RecordingReporter,
};

/// Stand-in for AFNI: every stage appends a marker to the file contents.
struct MarkerToolkit {
    fail_deoblique_for: Option<&'static str>,
}

impl MarkerToolkit {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            fail_deoblique_for: None,
        })
    }

    fn append(input: &Path, output: &Path, marker: &str) -> Result<()> {
        let mut data = fs::read_to_string(input)?;
        data.push('|');
        data.push_str(marker);
        fs::write(output, data)?;
        Ok(())
    }
}

impl Toolkit for MarkerToolkit {
    fn extract_first_volume(&self, input: &Path, output: &Path) -> Result<()> {
        Self::append(input, output, "3d")
    }

    fn deoblique(&self, input: &Path, output: &Path) -> Result<()> {
        if let Some(name) = self.fail_deoblique_for {
            if fs::read_to_string(input)?.starts_with(name) {
                bail!("3dWarp exited with status 1");
            }
        }
        Self::append(input, output, "deoblique")
    }

    fn reorient(&self, input: &Path, output: &Path, orientation: OrientationCode) -> Result<()> {
        Self::append(input, output, orientation.as_str())
    }
}

struct Fixture {
    _root: TempDir,
    dataset: PathBuf,
    scratch: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let dataset = root.path().join("dataset");
        let scratch = root.path().join("scratch");
        fs::create_dir_all(dataset.join("sub-01").join("anat")).unwrap();
        fs::create_dir_all(dataset.join("sub-02").join("anat")).unwrap();
        fs::create_dir_all(&scratch).unwrap();
        Self {
            _root: root,
            dataset,
            scratch,
        }
    }

    /// Writes a file whose contents start with its subject label.
    fn add(&self, subject: &str) -> PathBuf {
        let path = self
            .dataset
            .join(subject)
            .join("anat")
            .join(format!("{subject}_T1w.nii.gz"));
        fs::write(&path, subject).unwrap();
        path
    }

    fn config(&self) -> RunConfig {
        RunConfig::new(&self.dataset)
            .scratch_dir(&self.scratch)
            .orientation("RAS".parse().unwrap())
            .jobs(2)
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(&self.scratch).unwrap().next().is_none()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn normalizes_every_file_in_place() {
    let fixture = Fixture::new();
    let first = fixture.add("sub-01");
    let second = fixture.add("sub-02");
    fs::write(fixture.dataset.join("sub-01").join("anat").join("notes.txt"), "x").unwrap();

    let mut reporter = RecordingReporter::default();
    let summary = run_batch(&fixture.config(), MarkerToolkit::healthy(), &mut reporter, None)
        .await
        .unwrap();

    assert_eq!((summary.total, summary.succeeded, summary.failed), (2, 2, 0));
    assert!(summary.errors.is_empty());
    assert_eq!(fs::read_to_string(first).unwrap(), "sub-01|3d|deoblique|RAS");
    assert_eq!(fs::read_to_string(second).unwrap(), "sub-02|3d|deoblique|RAS");

    assert_eq!(reporter.started_with, Some(2));
    assert_eq!(reporter.completed.len(), 2);
    assert_eq!(reporter.summary.as_ref(), Some(&summary));
    assert!(fixture.scratch_is_empty());
}

#[tokio::test]
async fn stage_failure_leaves_original_untouched() {
    let fixture = Fixture::new();
    let good = fixture.add("sub-01");
    let bad = fixture.add("sub-02");

    let toolkit = Arc::new(MarkerToolkit {
        fail_deoblique_for: Some("sub-02"),
    });
    let summary = run_batch(&fixture.config(), toolkit, &mut NoopReporter, None)
        .await
        .unwrap();

    assert_eq!((summary.total, summary.succeeded, summary.failed), (2, 1, 1));
    assert_eq!(summary.not_attempted, 0);

    let failure = &summary.errors[0];
    assert_eq!(failure.file_name(), "sub-02_T1w.nii.gz");
    assert_eq!(failure.failure_kind(), Some(FailureKind::Stage(Stage::Deoblique)));
    assert!(failure.error_message().unwrap().contains("3dWarp exited with status 1"));

    assert_eq!(fs::read_to_string(&bad).unwrap(), "sub-02");
    assert_eq!(fs::read_to_string(&good).unwrap(), "sub-01|3d|deoblique|RAS");
    assert!(fixture.scratch_is_empty());
}

#[tokio::test]
async fn output_root_collects_files_by_name() {
    let fixture = Fixture::new();
    let input = fixture.add("sub-01");
    let output_root = fixture.scratch.parent().unwrap().join("derivatives");

    let config = fixture.config().output(&output_root);
    let summary = run_batch(&config, MarkerToolkit::healthy(), &mut NoopReporter, None)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(fs::read_to_string(&input).unwrap(), "sub-01");

    let expected = output_root.join("sub-01_T1w.nii.gz");
    assert_eq!(fs::read_to_string(expected).unwrap(), "sub-01|3d|deoblique|RAS");
}

#[tokio::test]
async fn empty_dataset_is_a_zero_run() {
    let fixture = Fixture::new();
    let mut reporter = RecordingReporter::default();

    let summary = run_batch(&fixture.config(), MarkerToolkit::healthy(), &mut reporter, None)
        .await
        .unwrap();

    assert_eq!(
        (summary.total, summary.succeeded, summary.failed, summary.not_attempted),
        (0, 0, 0, 0)
    );
    assert!(reporter.completed.is_empty());
}

#[tokio::test]
async fn missing_dataset_is_fatal() {
    let fixture = Fixture::new();
    let config = RunConfig::new(fixture.dataset.join("nope")).scratch_dir(&fixture.scratch);

    let err = run_batch(&config, MarkerToolkit::healthy(), &mut NoopReporter, None)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Discovery(DiscoveryError::MissingRoot(_))));
}

#[tokio::test]
async fn summary_report_round_trips_through_json() {
    let fixture = Fixture::new();
    fixture.add("sub-01");
    let toolkit = Arc::new(MarkerToolkit {
        fail_deoblique_for: Some("sub-01"),
    });

    let summary = run_batch(&fixture.config(), toolkit, &mut NoopReporter, None)
        .await
        .unwrap();
    let report = fixture.scratch.join("report.json");
    summary.write_json(&report).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(value["failed"], 1);
    assert_eq!(value["errors"][0]["kind"]["kind"], "stage");
    assert_eq!(value["errors"][0]["kind"]["stage"], "deoblique");
}
