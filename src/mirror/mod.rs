//! Remote directory tree mirroring.
//!
//! This module walks a tree exposed by a small JSON listing API and copies
//! every file into a local directory, resuming partial files and skipping
//! complete ones.
//!
//! # Features
//!
//! - Depth-first directory recreation in listing order
//! - Bounded parallel file transfers (semaphore slots, 1 to [`MAX_PARALLEL`])
//! - Resume from the local file size via `Range: bytes={offset}-`
//! - Transparent `429 Too Many Requests` backoff driven by `Retry-After`
//! - Tagged per-file outcomes gathered into [`RunStats`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use treeget_core::mirror::{MirrorConfig, RunCoordinator, SilentReporter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = RunCoordinator::new(MirrorConfig::default(), Arc::new(SilentReporter));
//! let stats = coordinator
//!     .run("a1b2c3d4-0000-4000-8000-000000000000", Path::new("/srv/mirror"), 3)
//!     .await?;
//! println!("{} files written", stats.completed);
//! # Ok(())
//! # }
//! ```

mod config;
pub mod constants;
mod coordinator;
mod error;
mod executor;
mod listing;
mod progress;
mod transfer;
mod walker;

pub use config::MirrorConfig;
pub use constants::{DEFAULT_BASE_URL, DEFAULT_PARALLEL, MAX_PARALLEL, ROOT_SENTINEL_ID};
pub use coordinator::{RunCoordinator, RunStats};
pub use error::{ListingError, RequestError, RunError, TransferError, WalkError};
pub use executor::{Method, RequestExecutor, backoff_delay, parse_retry_after};
pub use listing::{DirectoryListing, Entry, EntryKind, TreeFetcher, decode_listing};
pub use progress::{BarReporter, ProgressObserver, ProgressReporter, SilentReporter};
pub use transfer::{FileTransfer, ResumePlan, TransferReport, TransferTask};
pub use walker::{DirectoryWalker, TransferOutcome, WalkCounts};
