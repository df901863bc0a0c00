//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::AppInstance;

/// Mount point of the instance data directory inside its container
pub const CONTAINER_DATA_PATH: &str = "/data";

/// Storage layout for the agent and engine configuration
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/etc/kws")
    }
}

/// Where app instance data directories live
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub data_root: PathBuf,
}

impl DataLayout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// The data directory of an instance, named after its container.
    /// Names with surrounding whitespace are rejected, not trimmed.
    pub fn instance_dir(&self, instance: &AppInstance) -> Result<Dir, EngineError> {
        let name = instance.internal_container_name.as_str();
        if name.is_empty()
            || name.trim() != name
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return Err(EngineError::ValidationError(format!(
                "Invalid container name for data directory: {:?}",
                instance.internal_container_name
            )));
        }
        Ok(Dir::new(self.data_root.join(name)))
    }

    /// Volume binding `host:/data` for an instance directory
    pub fn volume_spec(dir: &Dir) -> String {
        format!("{}:{}", dir.path().display(), CONTAINER_DATA_PATH)
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("/var/lib/kws/app-instances")
    }
}
