use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::plugins::PluginKind;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("{kind} plugin {name:?} is already registered")]
    DuplicatePlugin { kind: PluginKind, name: String },

    #[error("undefined but requested {kind}: {name}")]
    PluginNotFound { kind: PluginKind, name: String },

    #[error("Error loading config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing config file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Error configuring {kind} plugin {name}: {message}")]
    PluginConfig {
        kind: PluginKind,
        name: String,
        message: String,
    },

    #[error("no config file specified, use --config <file>")]
    NoConfig,

    #[error("no outputs found, did you provide a valid config file?")]
    NoOutputs,

    #[error("no inputs found, did you provide a valid config file?")]
    NoInputs,

    #[error("Agent interval must be positive, found {}", display_duration(.0))]
    NonPositiveInterval(Duration),

    #[error("Failed to connect to output {name}, error was '{message}'")]
    OutputConnect { name: String, message: String },

    #[error("stat identity hash collision: {existing} and {requested} both hash to {hash:#018x}")]
    StatCollision {
        hash: u64,
        existing: String,
        requested: String,
    },

    #[error("{kind} plugin {name} failed: {message}")]
    Plugin {
        kind: PluginKind,
        name: String,
        message: String,
    },

    #[error("{0} and {1}")]
    UsageNotFound(Box<PulseError>, Box<PulseError>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn display_duration(duration: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*duration)
}

pub type Result<T> = std::result::Result<T, PulseError>;
