//! CLI subcommand implementations.

pub mod reconstruct;
