//! Domain resolution for deployments

pub mod context;
pub mod names;

pub use context::{resolve_domain_context, DomainContext, DomainResolution};
