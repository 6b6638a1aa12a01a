//! Workspace manager - per-item scratch directories
//!
//! Includes:
//! - Collision-free directory naming (`<prefix>_<pid>_<uuid>`)
//! - Scoped release: a `Workspace` removes its directory when dropped
//! - Retried removal; cleanup failures are logged, never returned as item failures

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use uuid::Uuid;

use crate::common::{MAX_REMOVE_ATTEMPTS, MAX_WORKSPACE_ATTEMPTS, WORKSPACE_PREFIX};

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    prefix: String,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: WORKSPACE_PREFIX.to_string(),
        }
    }

    /// Create a fresh, exclusively owned directory under the scratch root.
    ///
    /// `create_dir` fails on an existing path, so two workers can never end
    /// up sharing a directory even if their names collide.
    pub fn acquire(&self) -> Result<Workspace> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create scratch root {:?}", self.root))?;

        for _ in 0..MAX_WORKSPACE_ATTEMPTS {
            let path = self.root.join(self.next_name());
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!("Acquired workspace {:?}", path);
                    return Ok(Workspace {
                        path,
                        released: false,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    warn!("Workspace name collision at {:?}, retrying", path);
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to create workspace {:?}", path));
                }
            }
        }
        bail!(
            "failed to create a unique workspace under {:?} after {} attempts",
            self.root,
            MAX_WORKSPACE_ATTEMPTS
        )
    }

    fn next_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.prefix,
            std::process::id(),
            Uuid::new_v4().simple()
        )
    }
}

/// A scratch directory owned by exactly one work item.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now and report whether that worked.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_with_retry(&self.path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = remove_with_retry(&self.path) {
            warn!("Leaving workspace behind: {:#}", err);
        }
    }
}

fn remove_with_retry(path: &Path) -> Result<()> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match fs::remove_dir_all(path) {
            Ok(()) => {
                debug!("Released workspace {:?}", path);
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) if attempts < MAX_REMOVE_ATTEMPTS => {
                warn!(
                    "Failed removing workspace {:?} (attempt {}), retrying in {}ms: {}",
                    path,
                    attempts,
                    50 * attempts,
                    err
                );
                thread::sleep(Duration::from_millis(50 * attempts));
            }
            Err(err) => {
                return Err(err).context(format!(
                    "failed removing workspace {:?} after {} attempts",
                    path, attempts
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, sync::Arc};
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_and_release_removes() {
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path());

        let workspace = manager.acquire().unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.is_dir());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("{}_{}_", WORKSPACE_PREFIX, std::process::id())));

        fs::write(workspace.file("temp_3d.nii.gz"), b"partial").unwrap();
        workspace.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_directory_with_contents() {
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path());
        let path = {
            let workspace = manager.acquire().unwrap();
            fs::create_dir(workspace.file("nested")).unwrap();
            fs::write(workspace.file("nested/a"), b"x").unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn release_tolerates_already_removed_directory() {
        let scratch = TempDir::new().unwrap();
        let workspace = WorkspaceManager::new(scratch.path()).acquire().unwrap();
        fs::remove_dir_all(workspace.path()).unwrap();
        assert!(workspace.release().is_ok());
    }

    #[test]
    fn concurrent_acquisitions_never_collide() {
        let scratch = TempDir::new().unwrap();
        let manager = Arc::new(WorkspaceManager::new(scratch.path()));
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..8)
                        .map(|_| manager.acquire().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let workspaces: Vec<Workspace> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let unique: HashSet<_> = workspaces.iter().map(|w| w.path().to_path_buf()).collect();
        assert_eq!(unique.len(), 16 * 8);

        drop(workspaces);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_scratch_root_is_created() {
        let scratch = TempDir::new().unwrap();
        let root = scratch.path().join("deep/scratch");
        let workspace = WorkspaceManager::new(&root).acquire().unwrap();
        assert!(workspace.path().starts_with(&root));
    }
}
