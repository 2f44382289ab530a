//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tailstat",
    version,
    author = "neur0map",
    about = "Live log-stream statistics with an adaptive sliding window",
    long_about = "Tailstat follows a log file or reads standard input, classifies each entry by \
                  severity and refreshes a windowed summary every second: throughput, severity \
                  mix and the most frequent error messages. The window shrinks under heavy load \
                  and grows when traffic is light."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/tailstat/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a log stream and print live statistics
    Watch {
        /// Follow this file instead of reading standard input
        #[arg(short, long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// Show queue depth and parse diagnostics
        #[arg(short, long)]
        debug: bool,

        /// Print one JSON snapshot per line instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
