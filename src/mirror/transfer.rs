//! Single-file transfer with resume from a partial local file.
//!
//! Resumability is inferred from the local file size alone: a HEAD request
//! gives the remote length, the existing file (if any) gives the local one,
//! and [`ResumePlan::decide`] picks fresh, skip, resume or overwrite.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_LENGTH;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::constants::FILE_ENDPOINT;
use super::error::TransferError;
use super::executor::{Method, RequestExecutor};
use super::listing::Entry;
use super::progress::{ProgressObserver, ProgressReporter};

/// One file to download: remote identifier, display name and destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Remote file identifier.
    pub id: String,
    /// Display name (also the last path component).
    pub name: String,
    /// Full local destination path.
    pub destination: PathBuf,
}

impl TransferTask {
    /// Creates the task for a file entry inside `parent_dir`.
    #[must_use]
    pub fn new(entry: &Entry, parent_dir: &Path) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            destination: parent_dir.join(&entry.name),
        }
    }

    fn endpoint(&self) -> String {
        format!("{FILE_ENDPOINT}{}", self.id)
    }
}

/// What to do with a destination path given the remote length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// Nothing usable on disk; download everything.
    Fresh,
    /// Local size equals remote length; nothing to transfer.
    Complete,
    /// Local file is a prefix; request the rest and append.
    Resume {
        /// First byte to request.
        offset: u64,
    },
    /// Local file is larger than the remote one; truncate and download everything.
    Overwrite {
        /// Size of the stale local file.
        local_size: u64,
    },
}

impl ResumePlan {
    /// Decides from the observed local size (`None` when absent) and the remote length.
    #[must_use]
    pub fn decide(local_size: Option<u64>, remote_len: u64) -> Self {
        match local_size {
            None => Self::Fresh,
            Some(size) if size == remote_len => Self::Complete,
            Some(0) => Self::Fresh,
            Some(size) if size < remote_len => Self::Resume { offset: size },
            Some(size) => Self::Overwrite { local_size: size },
        }
    }

    /// Byte offset the GET should start from.
    #[must_use]
    pub fn start_offset(self) -> u64 {
        match self {
            Self::Resume { offset } => offset,
            Self::Fresh | Self::Complete | Self::Overwrite { .. } => 0,
        }
    }
}

/// Result of a transfer that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferReport {
    /// The local file already had the remote length.
    Skipped,
    /// Bytes were moved.
    Downloaded {
        /// Bytes written during this transfer.
        bytes: u64,
        /// Whether the bytes were appended to an existing partial file.
        resumed: bool,
    },
}

/// Downloads single files through the request executor.
#[derive(Clone)]
pub struct FileTransfer {
    executor: RequestExecutor,
    reporter: Arc<dyn ProgressReporter>,
}

impl FileTransfer {
    /// Creates a transfer component reporting progress to `reporter`.
    #[must_use]
    pub fn new(executor: RequestExecutor, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { executor, reporter }
    }

    /// Downloads one file, resuming or skipping based on the local file size.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] for any HEAD, GET, stream or local IO failure.
    #[instrument(skip(self, task), fields(id = %task.id, name = %task.name))]
    pub async fn transfer(&self, task: &TransferTask) -> Result<TransferReport, TransferError> {
        let endpoint = task.endpoint();
        let remote_len = self.remote_length(task, &endpoint).await?;
        let local_size = local_file_size(&task.destination).await?;

        let plan = ResumePlan::decide(local_size, remote_len);
        debug!(?plan, remote_len, ?local_size, "resume decision");

        match plan {
            ResumePlan::Complete => {
                info!(
                    name = %task.name,
                    "skipping file, file already exists with same size"
                );
                return Ok(TransferReport::Skipped);
            }
            ResumePlan::Resume { offset } => {
                info!(name = %task.name, start_offset = offset, "partial file found, resuming download");
            }
            ResumePlan::Overwrite { local_size } => {
                info!(
                    name = %task.name,
                    local_size,
                    remote_len,
                    "local file larger than remote, downloading again"
                );
            }
            ResumePlan::Fresh => {}
        }

        let start_offset = plan.start_offset();
        let response = self
            .executor
            .execute(Method::Get, &endpoint, start_offset)
            .await
            .map_err(|source| TransferError::request(&task.name, source))?;

        // A 200 to a ranged request carries the whole body; start over.
        let resumed = start_offset > 0 && response.status() == StatusCode::PARTIAL_CONTENT;
        if start_offset > 0 && !resumed {
            debug!(name = %task.name, "server ignored range request, rewriting file");
        }
        let expected = if resumed {
            remote_len.saturating_sub(start_offset)
        } else {
            remote_len
        };

        let file = open_destination(&task.destination, resumed).await?;
        let observer = self.reporter.start(&task.name, expected);
        let url = self.executor.url_for(&endpoint);

        match stream_to_file(file, response, &url, &task.destination, observer.as_ref()).await {
            Ok(bytes) => {
                observer.finish();
                info!(
                    name = %task.name,
                    path = %task.destination.display(),
                    bytes,
                    resumed,
                    "download complete"
                );
                Ok(TransferReport::Downloaded { bytes, resumed })
            }
            Err(e) => {
                observer.abandon(&format!("Failed {}", task.name));
                Err(e)
            }
        }
    }

    async fn remote_length(&self, task: &TransferTask, endpoint: &str) -> Result<u64, TransferError> {
        let head = self
            .executor
            .execute(Method::Head, endpoint, 0)
            .await
            .map_err(|source| TransferError::request(&task.name, source))?;

        // Parse the header directly: the body size hint of a HEAD response is always 0.
        head.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| TransferError::MissingContentLength {
                name: task.name.clone(),
                url: self.executor.url_for(endpoint),
            })
    }
}

/// Size of the file at `path`, `None` when nothing is there.
async fn local_file_size(path: &Path) -> Result<Option<u64>, TransferError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TransferError::io(path, e)),
    }
}

/// Opens for append when resuming, truncate-creates otherwise.
async fn open_destination(path: &Path, append: bool) -> Result<File, TransferError> {
    let opened = if append {
        OpenOptions::new().create(true).append(true).open(path).await
    } else {
        File::create(path).await
    };
    opened.map_err(|e| TransferError::io(path, e))
}

/// Streams the response body to `file`, feeding `observer`; returns bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    observer: &dyn ProgressObserver,
) -> Result<u64, TransferError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                // Keep what arrived so the next run resumes after it.
                if let Err(flush_error) = writer.flush().await {
                    warn!(path = %file_path.display(), error = %flush_error, "could not keep partial data");
                }
                return Err(TransferError::Stream {
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
        observer.inc(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| TransferError::io(file_path, e))?;

    Ok(bytes_written)
}
