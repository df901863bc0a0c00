//! KWS Deployment Engine Library
//!
//! Drives app instances (an image, a server and a set of domains) to their
//! declared state: DNS records, reverse-proxy routing, containers on local or
//! agent-managed servers, and restore-time data directory replacement.

pub mod deploy;
pub mod dns;
pub mod domains;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod proxy;
pub mod restore;
pub mod runtime;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod utils;
