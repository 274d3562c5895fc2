pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "pulse")]
#[command(author = "Ignoramuss")]
#[command(about = "Pulse, the plugin-driven agent for collecting and reporting metrics", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[arg(long, value_name = "FILE", help = "Configuration file to load")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Gather metrics once, print them to stdout, and exit")]
    pub test: bool,

    #[arg(long, help = "Turn on debug logging")]
    pub debug: bool,

    #[arg(long, help = "Run in quiet mode")]
    pub quiet: bool,

    #[arg(long, value_name = "FILE", help = "File to write our pid to")]
    pub pidfile: Option<PathBuf>,

    #[arg(long, help = "Print available input plugins")]
    pub input_list: bool,

    #[arg(long, help = "Print available output plugins")]
    pub output_list: bool,

    #[arg(
        long,
        value_name = "PLUGIN",
        help = "Print usage for a plugin, ie, 'pulse --usage internal'"
    )]
    pub usage: Option<String>,

    #[arg(
        long,
        value_name = "FILTER",
        help = "Input plugins to enable, separator is :"
    )]
    pub input_filter: Option<String>,

    #[arg(
        long,
        value_name = "FILTER",
        help = "Output plugins to enable, separator is :"
    )]
    pub output_filter: Option<String>,

    #[arg(long, help = "Display the version")]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Print out full sample configuration to stdout")]
    Config,
    #[command(about = "Print the version to stdout")]
    Version,
}
