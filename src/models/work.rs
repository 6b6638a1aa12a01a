use std::{
    fmt,
    path::{Path, PathBuf},
};

use path_clean::PathClean;
use serde::Serialize;

// ────────────────────────────────────────────────────────────────
// Work Item
// ────────────────────────────────────────────────────────────────

/// One input file and where its normalized version ends up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    input_path: PathBuf,
    output_path: PathBuf,
}

impl WorkItem {
    /// In-place item: the finished file replaces the input.
    pub fn in_place(input_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into().clean();
        Self {
            output_path: input_path.clone(),
            input_path,
        }
    }

    /// Item whose output is `output_root/<basename of input>`.
    pub fn with_output_root(input_path: impl Into<PathBuf>, output_root: &Path) -> Self {
        let input_path = input_path.into().clean();
        let output_path = match input_path.file_name() {
            Some(name) => output_root.join(name),
            None => output_root.to_path_buf(),
        }
        .clean();
        Self {
            input_path,
            output_path,
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_in_place(&self) -> bool {
        self.input_path == self.output_path
    }

    pub fn file_name(&self) -> String {
        display_name(&self.input_path)
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ────────────────────────────────────────────────────────────────
// Stages
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractVolume,
    Deoblique,
    Reorient,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::ExtractVolume, Stage::Deoblique, Stage::Reorient];

    /// Intermediate file written by this stage inside a workspace.
    pub fn intermediate_name(self) -> &'static str {
        match self {
            Stage::ExtractVolume => "temp_3d.nii.gz",
            Stage::Deoblique => "temp_deoblique.nii.gz",
            Stage::Reorient => "temp_final.nii.gz",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ExtractVolume => "volume extraction",
            Stage::Deoblique => "deoblique",
            Stage::Reorient => "reorientation",
        };
        f.write_str(name)
    }
}

// ────────────────────────────────────────────────────────────────
// Work Result
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "stage")]
pub enum FailureKind {
    /// Workspace or output directory could not be prepared.
    Setup,
    Stage(Stage),
    /// Output directory creation or the final move failed.
    Placement,
    /// The execution unit died without reporting.
    WorkerFault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum WorkStatus {
    Success,
    Error { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkResult {
    pub input_path: PathBuf,
    #[serde(flatten)]
    pub status: WorkStatus,
}

impl WorkResult {
    pub fn success(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            status: WorkStatus::Success,
        }
    }

    pub fn error(input_path: impl Into<PathBuf>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            status: WorkStatus::Error {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, WorkStatus::Success)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            WorkStatus::Success => None,
            WorkStatus::Error { message, .. } => Some(message),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            WorkStatus::Success => None,
            WorkStatus::Error { kind, .. } => Some(*kind),
        }
    }

    pub fn file_name(&self) -> String {
        display_name(&self.input_path)
    }
}
