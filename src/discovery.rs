//! Input discovery
//!
//! Walks the dataset root recursively and turns every file whose name ends
//! in the configured suffix into a `WorkItem`.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::common::errors::DiscoveryError;
use crate::models::WorkItem;

/// Absolute paths of all matching files below `root`, sorted.
///
/// Only problems with `root` itself are fatal. Unreadable entries further
/// down, such as dangling symlinks, are logged and skipped.
pub fn find_inputs(root: &Path, suffix: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let metadata = fs::metadata(root).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::MissingRoot(root.to_path_buf()),
        _ => DiscoveryError::Inaccessible {
            path: root.to_path_buf(),
            source: err,
        },
    })?;
    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }
    let root = fs::canonicalize(root).map_err(|err| DiscoveryError::Inaccessible {
        path: root.to_path_buf(),
        source: err,
    })?;

    let start_time = Instant::now();
    let mut inputs = Vec::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() > 0 => {
                warn!("Skipping {:?}: {}", err.path().unwrap_or(root.as_path()), err);
                continue;
            }
            Err(err) => {
                return Err(DiscoveryError::Walk {
                    root: root.clone(),
                    source: err,
                });
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .as_encoded_bytes()
            .ends_with(suffix.as_bytes())
        {
            debug!("Found input {:?}", entry.path());
            inputs.push(entry.into_path());
        }
    }
    inputs.sort();

    info!(duration = &*format!("{:?}", start_time.elapsed());
        "Found {} files matching *{} in {:?}",
        inputs.len(),
        suffix,
        root
    );
    Ok(inputs)
}

/// Build work items, either in place or targeting `output_root`.
pub fn plan_items(inputs: Vec<PathBuf>, output_root: Option<&Path>) -> Vec<WorkItem> {
    inputs
        .into_iter()
        .map(|input| match output_root {
            Some(root) => WorkItem::with_output_root(input, root),
            None => WorkItem::in_place(input),
        })
        .collect()
}
