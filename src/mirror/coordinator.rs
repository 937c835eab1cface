//! Run coordinator: owns the slot pool and the completion barrier.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use super::config::MirrorConfig;
use super::constants::MAX_PARALLEL;
use super::error::{RunError, TransferError};
use super::executor::RequestExecutor;
use super::listing::TreeFetcher;
use super::progress::ProgressReporter;
use super::transfer::FileTransfer;
use super::walker::{DirectoryWalker, TransferOutcome, WalkCounts};

/// Totals for one run, available once every dispatched transfer has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Directory creation attempts.
    pub directories: usize,
    /// File transfers dispatched.
    pub dispatched: usize,
    /// Transfers that wrote bytes.
    pub completed: usize,
    /// Of `completed`, those that extended a partial file.
    pub resumed: usize,
    /// Files already complete on disk.
    pub skipped: usize,
    /// Transfers that failed.
    pub failed: usize,
    /// Transfers that never got a slot because the pool was closed.
    pub cancelled: usize,
    /// Bytes written across all transfers.
    pub bytes: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Completed { bytes, resumed, .. } => {
                self.completed += 1;
                self.bytes += bytes;
                if *resumed {
                    self.resumed += 1;
                }
            }
            TransferOutcome::Skipped { .. } => self.skipped += 1,
            TransferOutcome::Failed { .. } => self.failed += 1,
            TransferOutcome::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

/// Mirrors one remote tree into a local directory.
pub struct RunCoordinator {
    config: MirrorConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl RunCoordinator {
    /// Creates a coordinator for `config`, reporting transfer progress to `reporter`.
    #[must_use]
    pub fn new(config: MirrorConfig, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { config, reporter }
    }

    /// Mirrors the directory `root_id` under `dest_root` with at most
    /// `max_parallel` transfers moving bytes at once.
    ///
    /// Every dispatched transfer is awaited before this returns, including
    /// when the walk fails part way.
    ///
    /// # Errors
    ///
    /// - [`RunError::InvalidParallelism`] unless `1 <= max_parallel <= MAX_PARALLEL`
    /// - [`RunError::Client`] if the HTTP client cannot be built
    /// - [`RunError::Walk`] for any directory-level failure
    /// - [`RunError::FatalTransfer`] if a transfer hit an unusable `Retry-After`
    #[instrument(skip(self, dest_root), fields(dest = %dest_root.display()))]
    pub async fn run(
        &self,
        root_id: &str,
        dest_root: &Path,
        max_parallel: usize,
    ) -> Result<RunStats, RunError> {
        if !(1..=MAX_PARALLEL).contains(&max_parallel) {
            return Err(RunError::InvalidParallelism {
                value: max_parallel,
                max: MAX_PARALLEL,
            });
        }

        let executor = RequestExecutor::new(&self.config).map_err(RunError::Client)?;
        let transfer = Arc::new(FileTransfer::new(
            executor.clone(),
            Arc::clone(&self.reporter),
        ));
        let slots = Arc::new(Semaphore::new(max_parallel));
        let walker = DirectoryWalker::new(
            TreeFetcher::new(executor),
            transfer,
            slots,
            self.config.root_sentinel.clone(),
        );

        info!(root_id, max_parallel, "starting mirror run");
        let mut barrier = JoinSet::new();
        let walked = walker.walk(root_id, dest_root, &mut barrier).await;

        if let Err(e) = &walked {
            error!(
                error = %e,
                pending = barrier.len(),
                "walk aborted, waiting for dispatched transfers"
            );
        }

        let (mut stats, fatal) = drain(&mut barrier).await;
        let WalkCounts {
            directories,
            dispatched,
        } = walked?;
        stats.directories = directories;
        stats.dispatched = dispatched;

        if let Some((name, source)) = fatal {
            return Err(RunError::FatalTransfer { name, source });
        }

        info!(
            directories = stats.directories,
            dispatched = stats.dispatched,
            completed = stats.completed,
            resumed = stats.resumed,
            skipped = stats.skipped,
            failed = stats.failed,
            cancelled = stats.cancelled,
            bytes = stats.bytes,
            "mirror run complete"
        );
        Ok(stats)
    }
}

/// Awaits every unit on the barrier; returns the totals and the first fatal failure.
async fn drain(
    barrier: &mut JoinSet<TransferOutcome>,
) -> (RunStats, Option<(String, TransferError)>) {
    let mut stats = RunStats::default();
    let mut fatal = None;

    while let Some(joined) = barrier.join_next().await {
        match joined {
            Ok(outcome) => {
                stats.record(&outcome);
                if let TransferOutcome::Failed { name, error } = outcome {
                    if error.is_fatal() && fatal.is_none() {
                        fatal = Some((name, error));
                    }
                }
            }
            Err(join_error) => {
                warn!(error = %join_error, "transfer task did not complete");
                stats.failed += 1;
            }
        }
    }

    (stats, fatal)
}
