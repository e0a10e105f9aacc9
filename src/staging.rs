use std::{
    fs, io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use crate::{
    error::{BootstrapError, Result},
    log::{artifact_cleanup_failed, cleaning_cache},
};

/// The ephemeral directory one launch downloads and unpacks into.
/// Not safe to share between concurrent launches.
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wipes whatever a previous run left behind and recreates the root empty.
    ///
    /// # Errors
    ///
    /// - Stale entries cannot be removed (Permissions)
    /// - The root cannot be created
    pub fn prepare(&self) -> Result<()> {
        let staging_error = |source| BootstrapError::Staging {
            path: self.root.clone(),
            source,
        };

        if self.root.exists() {
            cleaning_cache(&self.root);
            clear_tree(&self.root).map_err(staging_error)?;
        }

        fs::create_dir_all(&self.root).map_err(staging_error)
    }

    /// Ties the lifetime of a temporary file to the returned guard.
    pub fn artifact(&self, file_name: &str) -> ArtifactGuard {
        ArtifactGuard {
            path: self.root.join(file_name),
        }
    }
}

/// Removes a temporary file. Already gone is fine, and so is failing.
pub fn cleanup_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => artifact_cleanup_failed(path, &err),
    }
}

/// Deletes its file when dropped, whether the stage using it succeeded or not.
#[must_use]
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
}

impl ArtifactGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        cleanup_artifact(&self.path);
    }
}

/// Recursive removal that ignores entries vanishing underneath it.
fn clear_tree(root: &Path) -> io::Result<()> {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_not_found(err.io_error()) => continue,
            Err(err) => return Err(err.into()),
        };

        let removed = if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())
        } else {
            fs::remove_file(entry.path())
        };

        match removed {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
            _ => {}
        }
    }

    Ok(())
}

fn is_not_found(err: Option<&io::Error>) -> bool {
    err.is_some_and(|err| err.kind() == io::ErrorKind::NotFound)
}
