//! # Group Index CLI
//!
//! This is the binary entry point for the `group-index` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging from `--log-level` or `RUST_LOG`.
//! - Executing the appropriate command and reporting its errors.
//!
//! The engine lives in the `group_index` library; the binary only loads a
//! configuration and drives the library against on-disk storage.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
