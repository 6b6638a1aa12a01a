use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::work::WorkResult;

/// Final outcome of a batch run.
///
/// `succeeded + failed + not_attempted == total` always holds. `errors`
/// keeps every failed result in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub errors: Vec<WorkResult>,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn empty() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            not_attempted: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn was_interrupted(&self) -> bool {
        self.not_attempted > 0
    }

    /// Write the summary as pretty JSON. The report is staged next to
    /// `path` and renamed into place, so a reader never sees half a file.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let staging = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let written = (|| -> Result<()> {
            let file = File::create(&staging)
                .with_context(|| format!("failed to create report file {:?}", staging))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)
                .context("failed to serialize run summary")?;
            writer.write_all(b"\n")?;
            writer.flush().context("failed to flush run report")?;
            Ok(())
        })();

        let placed = written.and_then(|()| {
            fs::rename(&staging, path)
                .with_context(|| format!("failed to move run report into {:?}", path))
        });
        if placed.is_err() {
            let _ = fs::remove_file(&staging);
        }
        placed
    }
}

fn serialize_secs<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
