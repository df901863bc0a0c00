//! App instance lifecycle status

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Lifecycle status of an app instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    /// Record created, engine has not run yet
    #[default]
    Creating,

    /// Last deploy or restart succeeded
    Running,

    /// Explicitly stopped
    Stopped,

    /// Last operation failed; stays here until the next deploy or restart
    Error,
}

/// Outcome of an engine operation, fed into the status machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Deploy or restart brought the container up
    Deployed,

    /// Stop completed (or nothing was running)
    Stopped,

    /// Any fatal failure
    Failed,
}

impl AppStatus {
    /// Transition on an event.
    ///
    /// Every event is accepted from every state: a failed instance is
    /// recovered by a later deploy, and stop is idempotent. Nothing ever
    /// transitions back into `Creating`.
    pub fn apply(self, event: StatusEvent) -> AppStatus {
        match (self, event) {
            (_, StatusEvent::Deployed) => AppStatus::Running,
            (_, StatusEvent::Stopped) => AppStatus::Stopped,
            (_, StatusEvent::Failed) => AppStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Creating => "creating",
            AppStatus::Running => "running",
            AppStatus::Stopped => "stopped",
            AppStatus::Error => "error",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "creating" => Ok(AppStatus::Creating),
            "running" => Ok(AppStatus::Running),
            "stopped" => Ok(AppStatus::Stopped),
            "error" => Ok(AppStatus::Error),
            other => Err(EngineError::ValidationError(format!(
                "Unknown app instance status: {}",
                other
            ))),
        }
    }
}
