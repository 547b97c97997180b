//! Utility functions for the lnstream daemon and its command-line client

pub mod config;
pub mod env_var;
pub mod observability;
pub mod util;

pub use env_var::*;

/// Version string reported by `--git-desc` and the `version` control method
pub const GIT_DESC: &str = concat!("lnstream-v", env!("CARGO_PKG_VERSION"));
