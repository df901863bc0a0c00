//! Deployment module

pub mod engine;
pub mod locks;
pub mod status;
pub mod store;

pub use engine::{Deployment, DeploymentEngine, EngineOptions};
pub use locks::{InstanceGuard, InstanceLocks};
pub use status::{AppStatus, StatusEvent};
pub use store::{InstanceStore, MemoryStore};
