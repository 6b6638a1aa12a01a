//! Final placement of a finished file
//!
//! The destination is only ever replaced by a `rename`, so a reader sees
//! either the old file or the complete new one. When the workspace lives on
//! another filesystem the file is first copied next to the destination.

use anyhow::{Context, Result};
use log::debug;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use uuid::Uuid;

pub fn place_output(finished: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {:?}", parent))?;
    }

    match fs::rename(finished, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            debug!(
                "{:?} and {:?} are on different filesystems, staging a copy",
                finished, destination
            );
            copy_then_rename(finished, destination)
        }
        Err(err) => Err(err)
            .with_context(|| format!("failed to move {:?} to {:?}", finished, destination)),
    }
}

fn copy_then_rename(finished: &Path, destination: &Path) -> Result<()> {
    let staged = staging_path(destination);
    let result = fs::copy(finished, &staged)
        .with_context(|| format!("failed to copy {:?} to {:?}", finished, staged))
        .and_then(|_| {
            fs::rename(&staged, destination).with_context(|| {
                format!("failed to move {:?} to {:?}", staged, destination)
            })
        });
    if result.is_err() {
        let _ = fs::remove_file(&staged);
    }
    result
}

/// Hidden sibling of `destination` that shares its filesystem.
fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.partial", name, Uuid::new_v4().simple()))
}
