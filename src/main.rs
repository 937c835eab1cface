//! CLI entry point for treeget.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use treeget_core::mirror::ROOT_SENTINEL_ID;
use treeget_core::mirror::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, READ_TIMEOUT_SECS};
use treeget_core::{
    BarReporter, DEFAULT_PARALLEL, MirrorConfig, ProgressReporter, RunCoordinator, SilentReporter,
    parse_target,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod terminal;

use app_config::{FileConfig, load_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let no_color = terminal::should_disable_color(
        args.no_color,
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(terminal::default_level(args.quiet, args.verbose), no_color);
    debug!(?args, "CLI arguments parsed");

    let loaded = load_file_config(args.config.as_deref())?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), loaded = loaded.config.is_some(), "config file resolved");
    }
    let file_config = loaded.file_config();

    let raw_target = match args.target.clone() {
        Some(target) => target,
        None => read_target_from_stdin()?,
    };
    let root_id = parse_target(&raw_target)?;

    let dest_root = resolve_destination(args.path.as_deref(), file_config.path.as_deref())?;
    let parallel = args
        .parallel
        .map(usize::from)
        .or(file_config.parallel)
        .unwrap_or(DEFAULT_PARALLEL);

    let config = mirror_config(args.server.clone(), &file_config);
    info!(
        root_id = %root_id,
        dest = %dest_root.display(),
        parallel,
        server = %config.base_url,
        "treeget starting"
    );

    let draw_progress = terminal::should_draw_progress(
        io::stderr().is_terminal(),
        args.quiet,
        args.no_progress,
        terminal::is_dumb_terminal(),
    );
    let reporter: Arc<dyn ProgressReporter> = if draw_progress {
        Arc::new(BarReporter::new())
    } else {
        Arc::new(SilentReporter)
    };

    let stats = RunCoordinator::new(config, reporter)
        .run(&root_id, &dest_root, parallel)
        .await?;

    if stats.failed > 0 {
        warn!(failed = stats.failed, "some files failed, re-run to retry them");
    }
    Ok(())
}

/// Prompts on a terminal; otherwise takes the first non-empty piped line.
fn read_target_from_stdin() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        print!("Enter URL: ");
        io::stdout().flush().context("Failed to write prompt")?;
        let mut line = String::new();
        stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read target from terminal")?;
        return Ok(line);
    }

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read target from stdin")?;
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
    bail!("No target given. Pass a URL or identifier, or pipe one via stdin.")
}

/// CLI path beats config path beats `.`; the result is absolute and must exist.
fn resolve_destination(cli_path: Option<&Path>, config_path: Option<&Path>) -> Result<PathBuf> {
    let path = cli_path.or(config_path).unwrap_or(Path::new("."));
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path '{}'", path.display()))?;
    if !absolute.is_dir() {
        bail!("Invalid path '{}': directory does not exist", absolute.display());
    }
    Ok(absolute)
}

fn mirror_config(cli_server: Option<String>, file_config: &FileConfig) -> MirrorConfig {
    let server = cli_server
        .or_else(|| file_config.server.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    // An empty sentinel in the config file turns the guard off.
    let root_sentinel = match file_config.root_sentinel.as_deref() {
        None => Some(ROOT_SENTINEL_ID.to_string()),
        Some("") => None,
        Some(sentinel) => Some(sentinel.to_string()),
    };

    MirrorConfig::new(server)
        .with_root_sentinel(root_sentinel)
        .with_timeouts(
            Duration::from_secs(
                file_config
                    .connect_timeout_secs
                    .unwrap_or(CONNECT_TIMEOUT_SECS),
            ),
            Duration::from_secs(file_config.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS)),
        )
}
