//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub(crate) struct Args {
    /// Program file. If not specified, reads from stdin.
    #[arg(short, long)]
    pub program: Option<PathBuf>,

    /// Output file. If not specified, writes to stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Skip per-operation decrypt-and-compare diagnostics.
    #[arg(long)]
    pub no_verify: bool,
}
