//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Basal segment reconstruction for insulin pump data.
///
/// Reads a sorted stream of raw dosing events and emits continuous
/// basal-rate segments interleaved with the events it passed through.
#[derive(Debug, Parser)]
#[command(name = "basal", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconstruct basal-rate segments from a device event stream.
    ///
    /// Accepts a JSON array or JSONL, sorted ascending by deviceTime.
    /// Writes JSONL to stdout.
    Reconstruct {
        /// Input file; reads stdin when omitted.
        input: Option<PathBuf>,

        /// Pretty-print the output as a single JSON array.
        #[arg(long)]
        pretty: bool,

        /// Also merge dual-wave bolus halves.
        #[arg(long)]
        boluses: bool,
    },
}
