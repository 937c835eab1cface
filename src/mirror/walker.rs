//! Recursive directory walk with bounded file dispatch.
//!
//! Directory listings are walked depth-first and synchronously; every file
//! found is spawned onto the caller's [`JoinSet`] right away and waits there
//! for a slot from the shared semaphore before moving any bytes.

use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::error::{TransferError, WalkError};
use super::listing::{Entry, TreeFetcher};
use super::transfer::{FileTransfer, TransferReport, TransferTask};

/// Tagged result of one dispatched file, collected by the completion barrier.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Bytes were written.
    Completed {
        /// Display name of the file.
        name: String,
        /// Bytes written in this run.
        bytes: u64,
        /// Whether an existing partial file was extended.
        resumed: bool,
    },
    /// The local file already matched the remote length.
    Skipped {
        /// Display name of the file.
        name: String,
    },
    /// The transfer failed; siblings are unaffected.
    Failed {
        /// Display name of the file.
        name: String,
        /// What went wrong.
        error: TransferError,
    },
    /// The slot pool was closed before this file got a slot.
    Cancelled {
        /// Display name of the file.
        name: String,
    },
}

impl TransferOutcome {
    fn from_result(name: String, result: Result<TransferReport, TransferError>) -> Self {
        match result {
            Ok(TransferReport::Skipped) => Self::Skipped { name },
            Ok(TransferReport::Downloaded { bytes, resumed }) => Self::Completed {
                name,
                bytes,
                resumed,
            },
            Err(error) => Self::Failed { name, error },
        }
    }
}

/// Directories created and files dispatched by one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkCounts {
    /// Directory creation attempts (one per listing walked).
    pub directories: usize,
    /// File transfers spawned onto the barrier.
    pub dispatched: usize,
}

impl WalkCounts {
    fn absorb(&mut self, other: Self) {
        self.directories += other.directories;
        self.dispatched += other.dispatched;
    }
}

/// Walks a remote tree, mirroring directories and dispatching file transfers.
pub struct DirectoryWalker {
    fetcher: TreeFetcher,
    transfer: Arc<FileTransfer>,
    slots: Arc<Semaphore>,
    root_sentinel: Option<String>,
}

impl DirectoryWalker {
    /// Creates a walker. `root_sentinel` of `None` disables the root guard.
    #[must_use]
    pub fn new(
        fetcher: TreeFetcher,
        transfer: Arc<FileTransfer>,
        slots: Arc<Semaphore>,
        root_sentinel: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            transfer,
            slots,
            root_sentinel,
        }
    }

    /// Walks the directory `id`, mirroring it under `parent_dir`.
    ///
    /// Returns once every listing below `id` is fetched and every local
    /// directory exists; file transfers keep running on `barrier`.
    ///
    /// # Errors
    ///
    /// Any [`WalkError`] aborts the remaining siblings at every level above
    /// the failure. Transfers already spawned are left running.
    pub fn walk<'a>(
        &'a self,
        id: &'a str,
        parent_dir: &'a Path,
        barrier: &'a mut JoinSet<TransferOutcome>,
    ) -> BoxFuture<'a, Result<WalkCounts, WalkError>> {
        self.walk_inner(id, parent_dir, barrier).boxed()
    }

    #[instrument(skip(self, parent_dir, barrier), fields(parent = %parent_dir.display()))]
    async fn walk_inner(
        &self,
        id: &str,
        parent_dir: &Path,
        barrier: &mut JoinSet<TransferOutcome>,
    ) -> Result<WalkCounts, WalkError> {
        let listing = self.fetcher.fetch_listing(id).await?;

        if self.root_sentinel.as_deref() == Some(listing.parent.as_str()) {
            return Err(WalkError::RootGuard { name: listing.name });
        }

        let dir = parent_dir.join(&listing.name);
        let mut counts = WalkCounts {
            directories: 1,
            dispatched: 0,
        };
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => debug!(path = %dir.display(), "created directory"),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %dir.display(), "directory already exists");
            }
            Err(source) => return Err(WalkError::CreateDir { path: dir, source }),
        }

        for entry in &listing.entries {
            if entry.is_dir() {
                let nested = self.walk(&entry.id, &dir, barrier).await?;
                counts.absorb(nested);
            } else {
                self.dispatch(entry, &dir, barrier);
                counts.dispatched += 1;
            }
        }

        info!(
            name = %listing.name,
            directories = counts.directories,
            dispatched = counts.dispatched,
            "directory walked"
        );
        Ok(counts)
    }

    fn dispatch(&self, entry: &Entry, dir: &Path, barrier: &mut JoinSet<TransferOutcome>) {
        let task = TransferTask::new(entry, dir);
        let transfer = Arc::clone(&self.transfer);
        let slots = Arc::clone(&self.slots);
        debug!(name = %task.name, "dispatching transfer");

        barrier.spawn(async move {
            // The permit is held until this block ends, whatever the outcome.
            let Ok(_permit) = Arc::clone(&slots).acquire_owned().await else {
                debug!(name = %task.name, "slot pool closed, transfer not started");
                return TransferOutcome::Cancelled { name: task.name };
            };

            let result = transfer.transfer(&task).await;
            if let Err(e) = &result {
                if e.is_fatal() {
                    error!(name = %task.name, error = %e, "fatal transfer error, no new transfers will start");
                    // Queued transfers give up; the ones holding a slot finish.
                    slots.close();
                } else {
                    warn!(name = %task.name, error = %e, "download failed");
                }
            }
            TransferOutcome::from_result(task.name, result)
        });
    }
}
