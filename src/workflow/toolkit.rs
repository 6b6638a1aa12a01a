//! External imaging toolkit - the three per-file transformations
//!
//! Includes:
//! - The `Toolkit` seam the pipeline executor calls into
//! - `AfniToolkit`, which shells out to AFNI's `3dcalc`, `3dWarp` and `3dresample`
//! - Availability probing for the startup check

use anyhow::{Context, Result, anyhow};
use log::debug;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::models::{OrientationCode, Stage};

const STDERR_TAIL_CHARS: usize = 2000;

/// Opaque per-file operations. Each call reads `input` and writes `output`
/// or fails; implementations must not touch any other path.
pub trait Toolkit: Send + Sync {
    /// Copy the first 3D volume of a 4D series, unchanged.
    fn extract_first_volume(&self, input: &Path, output: &Path) -> Result<()>;

    /// Drop any oblique transform from the header.
    fn deoblique(&self, input: &Path, output: &Path) -> Result<()>;

    /// Resample into the target axis orientation.
    fn reorient(&self, input: &Path, output: &Path, orientation: OrientationCode) -> Result<()>;

    fn run_stage(
        &self,
        stage: Stage,
        input: &Path,
        output: &Path,
        orientation: OrientationCode,
    ) -> Result<()> {
        match stage {
            Stage::ExtractVolume => self.extract_first_volume(input, output),
            Stage::Deoblique => self.deoblique(input, output),
            Stage::Reorient => self.reorient(input, output, orientation),
        }
    }
}

// ────────────────────────────────────────────────────────────────
// AFNI
// ────────────────────────────────────────────────────────────────

pub const AFNI_PROGRAMS: [&str; 3] = ["3dcalc", "3dWarp", "3dresample"];

#[derive(Debug, Clone, Default)]
pub struct AfniToolkit {
    bin_dir: Option<PathBuf>,
}

impl AfniToolkit {
    pub fn new(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Base command with stdin closed and AFNI's chatter suppressed.
    fn command(&self, name: &str) -> Command {
        let mut cmd = Command::new(self.program(name));
        cmd.env("AFNI_NOSPLASH", "YES")
            .env("AFNI_NO_OBLIQUE_WARNING", "YES")
            .stdin(Stdio::null());
        cmd
    }

    /// Return the first version line of every AFNI program, or why it failed.
    pub fn probe(&self) -> Vec<(&'static str, Result<String>)> {
        AFNI_PROGRAMS
            .iter()
            .map(|name| {
                let result = self
                    .command(name)
                    .arg("-ver")
                    .output()
                    .with_context(|| format!("`{}` is not installed or not in PATH", name))
                    .and_then(|output| {
                        if output.status.success() {
                            let stdout = String::from_utf8_lossy(&output.stdout);
                            Ok(stdout.lines().next().unwrap_or("Unknown version").trim().to_string())
                        } else {
                            Err(anyhow!(
                                "`{}` was found, but `-ver` exited with code {}",
                                name,
                                output.status.code().unwrap_or(-1)
                            ))
                        }
                    });
                (*name, result)
            })
            .collect()
    }
}

fn run_silent(mut cmd: Command, name: &str) -> Result<()> {
    debug!("Running {:?}", cmd);
    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to spawn {}", name))?;

    if output.status.success() {
        return Ok(());
    }
    Err(anyhow!(
        "{} failed with exit code {}: {}",
        name,
        output.status.code().unwrap_or(-1),
        stderr_tail(&output.stderr)
    ))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - STDERR_TAIL_CHARS).collect()
}

fn indexed(path: &Path, index: usize) -> std::ffi::OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push(format!("[{}]", index));
    arg
}

impl Toolkit for AfniToolkit {
    fn extract_first_volume(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.command("3dcalc");
        cmd.arg("-a")
            .arg(indexed(input, 0))
            .args(["-expr", "a", "-prefix"])
            .arg(output);
        run_silent(cmd, "3dcalc")
    }

    fn deoblique(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.command("3dWarp");
        cmd.args(["-deoblique", "-prefix"]).arg(output).arg(input);
        run_silent(cmd, "3dWarp")
    }

    fn reorient(&self, input: &Path, output: &Path, orientation: OrientationCode) -> Result<()> {
        let mut cmd = self.command("3dresample");
        cmd.args([OsStr::new("-orient"), OsStr::new(orientation.as_str())])
            .arg("-prefix")
            .arg(output)
            .arg("-inset")
            .arg(input);
        run_silent(cmd, "3dresample")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_volume_selector_is_appended() {
        let arg = indexed(Path::new("/data/sub-01_T1w.nii.gz"), 0);
        assert_eq!(arg, "/data/sub-01_T1w.nii.gz[0]");
    }

    #[test]
    fn bin_dir_prefixes_program_names() {
        let toolkit = AfniToolkit::new(Some(PathBuf::from("/opt/afni")));
        assert_eq!(toolkit.program("3dWarp"), PathBuf::from("/opt/afni/3dWarp"));
        assert_eq!(AfniToolkit::default().program("3dWarp"), PathBuf::from("3dWarp"));
    }

    #[test]
    fn long_stderr_keeps_the_tail() {
        let noise = "x".repeat(STDERR_TAIL_CHARS + 10) + "FATAL";
        let tail = stderr_tail(noise.as_bytes());
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("FATAL"));
    }

    #[test]
    fn missing_program_fails_with_context() {
        let toolkit = AfniToolkit::new(Some(PathBuf::from("/nonexistent/afni/bin")));
        let err = toolkit
            .deoblique(Path::new("/tmp/in.nii.gz"), Path::new("/tmp/out.nii.gz"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("failed to spawn 3dWarp"));
        assert!(toolkit.probe().iter().all(|(_, result)| result.is_err()));
    }
}
