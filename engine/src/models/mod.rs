//! Data model consumed by the deployment engine

pub mod app_instance;
pub mod domain;
pub mod server;

pub use app_instance::AppInstance;
pub use domain::{Domain, DomainAttachment, DomainMapping};
pub use server::Server;
