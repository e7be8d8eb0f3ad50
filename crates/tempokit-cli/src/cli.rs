//! Command-line interface for tempokit
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Batch tempo detection, time-stretch, conversion and loudness normalization
#[derive(Parser, Debug)]
#[command(name = "tempokit", version, about)]
pub struct Cli {
    /// Path to configuration file (default: ./tempokit.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "PATH", env = "TEMPOKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
///
/// Each processing command runs every operation listed under its section of
/// the configuration file.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Estimate the tempo of every source (`detect_tempo` section)
    DetectTempo,

    /// Time-stretch sources to a tempo or rate range (`timestretch` section)
    Timestretch,

    /// Convert sources to wav or mp3 (`convert` section)
    Convert,

    /// Normalize sources to a target loudness (`normalize` section)
    Normalize,

    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
