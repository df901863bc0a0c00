//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::EngineError;

/// A directory wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Check if anything (file or directory) exists at the path
    pub async fn path_exists(&self) -> bool {
        fs::symlink_metadata(&self.path).await.is_ok()
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), EngineError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), EngineError> {
        if self.path_exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// A sibling directory named after this one plus a suffix,
    /// e.g. `data` -> `data_backup`
    pub fn sibling(&self, suffix: &str) -> Dir {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Dir::new(self.path.with_file_name(format!("{}{}", name, suffix)))
    }

    /// Atomically move this directory to `target` (same filesystem)
    pub async fn rename_to(&self, target: &Dir) -> std::io::Result<()> {
        fs::rename(&self.path, &target.path).await
    }

    /// Verify the process can list and traverse the directory
    pub async fn check_accessible(&self) -> std::io::Result<()> {
        let mut entries = fs::read_dir(&self.path).await?;
        entries.next_entry().await?;
        Ok(())
    }

    /// Recursively copy this directory's contents into `target`, which is
    /// created if missing. Symlinks are recreated, not followed.
    pub async fn copy_into(&self, target: &Dir) -> std::io::Result<()> {
        let mut pending = vec![(self.path.clone(), target.path.clone())];

        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst).await?;
            let mut entries = fs::read_dir(&src).await?;

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let from = entry.path();
                let to = dst.join(entry.file_name());

                if file_type.is_dir() {
                    pending.push((from, to));
                } else if file_type.is_symlink() {
                    copy_symlink(&from, &to).await?;
                } else {
                    fs::copy(&from, &to).await?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    let link = fs::read_link(from).await?;
    fs::symlink(link, to).await
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, _to: &Path) -> std::io::Result<()> {
    tracing::warn!("Skipping symlink {} (unsupported on this platform)", from.display());
    Ok(())
}
