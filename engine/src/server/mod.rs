//! Agent sidecar HTTP server
//!
//! Exposes the local container runtime to a remote control panel.

pub mod auth;
pub mod handlers;
pub mod serve;
pub mod state;

pub use serve::{router, serve, ServerOptions};
pub use state::AgentState;
