pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod pidfile;
pub mod plugins;

pub use error::{PulseError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version as printed by `pulse version` and in the startup log.
pub fn display_version() -> String {
    format!("v{}", VERSION)
}
