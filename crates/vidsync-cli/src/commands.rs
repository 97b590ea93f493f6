use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vidsync")]
#[command(about = "Claim, describe and register video files from a shared watch folder", long_about = None)]
pub struct Cli {
    /// Log at debug level unless TRACING_LEVEL says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Claim and process files until stopped
    Run {
        /// Process at most one file, then exit
        #[arg(long)]
        once: bool,
        /// Stop after this many claim cycles, idle ones included
        #[arg(long, value_name = "N", conflicts_with = "once")]
        max_cycles: Option<usize>,
    },
    /// Show the next file a worker would claim, without claiming it
    Peek,
    /// Probe a single file and print its normalized metadata
    Probe {
        path: PathBuf,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Hash a file and write its MD5 sidecar
    Checksum { path: PathBuf },
    /// Remove the claim marker from a file
    Release { path: PathBuf },
    /// Print configuration values
    PrintConfig,
}
