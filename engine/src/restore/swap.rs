//! Data directory swap
//!
//! Three sibling directories take part: the live directory, `<live>_temp_restore`
//! (the staged copy of the restore source) and `<live>_backup` (the previous
//! live content while the swap is in flight). At every point the live path
//! holds either the old or the new content.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::errors::{EngineError, SwapError};
use crate::filesys::dir::Dir;

const STAGING_SUFFIX: &str = "_temp_restore";
const BACKUP_SUFFIX: &str = "_backup";

/// Outcome of moving staged content into the live path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapReport {
    /// New content is live; `had_previous` tells whether old content was replaced
    Replaced { had_previous: bool },

    /// The move failed and was undone
    RolledBack {
        cause: String,
        restored_previous: bool,
    },
}

/// Swaps new content into one live data directory
#[derive(Debug, Clone)]
pub struct DataDirSwap {
    live: Dir,
}

impl DataDirSwap {
    pub fn new(live: Dir) -> Self {
        Self { live }
    }

    pub fn live_dir(&self) -> &Dir {
        &self.live
    }

    pub fn staging_dir(&self) -> Dir {
        self.live.sibling(STAGING_SUFFIX)
    }

    pub fn backup_dir(&self) -> Dir {
        self.live.sibling(BACKUP_SUFFIX)
    }

    /// Check a restore source exists, is a directory and can be listed
    pub async fn validate_source(source: &Path) -> Result<Dir, SwapError> {
        let invalid = |reason: String| SwapError::InvalidSource {
            path: source.to_path_buf(),
            reason,
        };

        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| invalid(format!("not accessible: {}", e)))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }

        let dir = Dir::new(source);
        dir.check_accessible()
            .await
            .map_err(|e| invalid(format!("not readable: {}", e)))?;
        Ok(dir)
    }

    /// Repair the leftovers of a swap interrupted by a crash.
    ///
    /// A backup without a live directory means the move-in never happened,
    /// so the backup becomes live again. A backup next to a live directory
    /// is stale and removed.
    pub async fn recover_interrupted(&self) -> Result<(), EngineError> {
        let backup = self.backup_dir();
        if !backup.path_exists().await {
            return Ok(());
        }

        if self.live.path_exists().await {
            warn!("Removing stale backup {}", backup.path().display());
            backup.delete().await
        } else {
            warn!(
                "Recovering {} from interrupted swap backup",
                self.live.path().display()
            );
            backup.rename_to(&self.live).await?;
            Ok(())
        }
    }

    /// Copy the source into the staging directory. Live data is not touched.
    pub async fn stage(&self, source: &Dir) -> Result<Dir, SwapError> {
        let staging = self.staging_dir();
        let stage_err = |e: std::io::Error| SwapError::Stage {
            path: source.path().to_path_buf(),
            source: e,
        };

        if staging.path_exists().await {
            tokio::fs::remove_dir_all(staging.path())
                .await
                .map_err(stage_err)?;
        }

        if let Err(e) = source.copy_into(&staging).await {
            self.discard_staging().await;
            return Err(stage_err(e));
        }

        info!(
            "Staged restore source {} into {}",
            source.path().display(),
            staging.path().display()
        );
        Ok(staging)
    }

    /// Move `staged` into the live path, keeping the previous content until
    /// the move succeeded and putting it back if it did not.
    pub async fn swap_in(&self, staged: &Dir) -> SwapReport {
        let backup = self.backup_dir();
        let had_previous = self.live.path_exists().await;

        if had_previous {
            if backup.path_exists().await {
                if let Err(e) = backup.delete().await {
                    return SwapReport::RolledBack {
                        cause: format!("stale backup could not be removed: {}", e),
                        restored_previous: true,
                    };
                }
            }
            if let Err(e) = self.live.rename_to(&backup).await {
                // Nothing moved yet, the live directory is intact
                return SwapReport::RolledBack {
                    cause: format!("failed to move live directory aside: {}", e),
                    restored_previous: true,
                };
            }
        }

        match staged.rename_to(&self.live).await {
            Ok(()) => {
                if had_previous {
                    if let Err(e) = backup.delete().await {
                        warn!(
                            "Swap succeeded but backup {} could not be removed: {}",
                            backup.path().display(),
                            e
                        );
                    }
                }
                info!("Swapped new content into {}", self.live.path().display());
                SwapReport::Replaced { had_previous }
            }
            Err(e) => {
                error!(
                    "Failed to move staged content into {}: {}",
                    self.live.path().display(),
                    e
                );
                let restored_previous = self.roll_back(had_previous).await;
                SwapReport::RolledBack {
                    cause: e.to_string(),
                    restored_previous,
                }
            }
        }
    }

    async fn roll_back(&self, had_previous: bool) -> bool {
        if self.live.path_exists().await {
            if let Err(e) = self.live.delete().await {
                error!(
                    "Failed to clear partial live directory {}: {}",
                    self.live.path().display(),
                    e
                );
            }
        }
        if !had_previous {
            return false;
        }

        match self.backup_dir().rename_to(&self.live).await {
            Ok(()) => {
                info!("Restored previous content of {}", self.live.path().display());
                true
            }
            Err(e) => {
                error!(
                    "Failed to restore backup into {}: {}",
                    self.live.path().display(),
                    e
                );
                false
            }
        }
    }

    /// Remove the staging directory, logging failures
    pub async fn discard_staging(&self) {
        if let Err(e) = self.staging_dir().delete().await {
            warn!(
                "Failed to remove staging directory {}: {}",
                self.staging_dir().path().display(),
                e
            );
        }
    }

    /// Full replacement: validate, stage, quiesce the consumer, swap.
    ///
    /// `quiesce` runs only once the source is safely staged; if it fails the
    /// live directory is left alone. The staging directory is always removed.
    pub async fn replace_from<F, Fut>(&self, source: &Path, quiesce: F) -> Result<SwapReport, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), EngineError>>,
    {
        let source = Self::validate_source(source).await?;
        self.recover_interrupted().await?;
        let staged = self.stage(&source).await?;

        if let Err(e) = quiesce().await {
            self.discard_staging().await;
            return Err(e);
        }

        let report = self.swap_in(&staged).await;
        self.discard_staging().await;
        Ok(report)
    }

    /// Turn a rollback into the matching error
    pub fn into_result(&self, report: SwapReport) -> Result<SwapReport, SwapError> {
        match report {
            SwapReport::RolledBack {
                cause,
                restored_previous,
            } => Err(SwapError::RolledBack {
                path: PathBuf::from(self.live.path()),
                cause,
                restored_previous,
            }),
            replaced => Ok(replaced),
        }
    }
}
