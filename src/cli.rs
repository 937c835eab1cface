//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use treeget_core::{DEFAULT_PARALLEL, MAX_PARALLEL};

// clap ranges are i64; the engine ceiling is small enough to fit.
#[allow(clippy::cast_possible_wrap)]
const PARALLEL_CEILING: i64 = MAX_PARALLEL as i64;

/// Mirror a remote directory tree onto the local filesystem.
///
/// Treeget walks the tree behind TARGET, recreates its directories under
/// PATH and downloads every file, resuming partial files and skipping
/// complete ones.
#[derive(Parser, Debug)]
#[command(name = "treeget")]
#[command(author, version, about)]
pub struct Args {
    /// Directory URL (identifier in the `#` fragment) or bare identifier; prompted for when omitted
    pub target: Option<String>,

    /// Destination directory (must exist) [default: .]
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    #[arg(
        short = 'n',
        long,
        value_parser = clap::value_parser!(u8).range(1..=PARALLEL_CEILING),
        help = format!("Number of parallel file transfers (1-{MAX_PARALLEL}) [default: {DEFAULT_PARALLEL}]")
    )]
    pub parallel: Option<u8>,

    /// Origin of the listing and file API
    #[arg(short, long)]
    pub server: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}
