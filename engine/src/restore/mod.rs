//! Restore-time replacement of an instance's data directory

pub mod swap;

pub use swap::{DataDirSwap, SwapReport};
