//! Reverse proxy routing configuration

pub mod labels;

pub use labels::{build_labels, ProxyOptions};
