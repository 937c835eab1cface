//! Error types for the mirror engine.
//!
//! Errors are split by the layer that raises them so callers can tell a
//! per-file failure (logged, run continues) from a directory-level failure
//! (aborts the subtree) without string matching.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the request executor for a single HTTP exchange.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with something other than 200 or 206.
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A 429 response carried no usable `Retry-After` value.
    ///
    /// The server dictates the retry cadence; without it there is nothing
    /// safe to wait for, so this is never retried.
    #[error("failed to parse rate limit header {value:?} from {url}")]
    RetryAfter {
        /// The URL that was rate limited.
        url: String,
        /// The raw header value, `None` when the header was absent.
        value: Option<String>,
    },
}

impl RequestError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an unexpected-status error.
    pub fn unexpected_status(url: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a rate-limit header error.
    pub fn retry_after(url: impl Into<String>, value: Option<String>) -> Self {
        Self::RetryAfter {
            url: url.into(),
            value,
        }
    }

    /// Returns true when the error must stop the run rather than one item.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RetryAfter { .. })
    }
}

/// Errors raised while resolving one directory identifier to its listing.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing request itself failed.
    #[error("failed to fetch listing {id}: {source}")]
    Request {
        /// The directory identifier.
        id: String,
        /// The underlying request error.
        #[source]
        source: RequestError,
    },

    /// The listing body did not decode as the expected schema.
    #[error("malformed listing response for {id}: {source}")]
    MalformedResponse {
        /// The directory identifier.
        id: String,
        /// The decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The listing names a directory or entry that cannot be used as a path component.
    #[error("listing {id} contains unusable name {name:?}")]
    UnsafeName {
        /// The directory identifier.
        id: String,
        /// The offending name.
        name: String,
    },
}

/// Errors raised while transferring one file. Never fatal to siblings.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A HEAD or GET for the file failed.
    #[error("transfer failed for {name}: {source}")]
    Request {
        /// Display name of the file.
        name: String,
        /// The underlying request error.
        #[source]
        source: RequestError,
    },

    /// The HEAD response carried no usable `Content-Length`.
    #[error("transfer failed for {name}: no content length from {url}")]
    MissingContentLength {
        /// Display name of the file.
        name: String,
        /// The file URL.
        url: String,
    },

    /// Local file system error (stat, open, write, flush).
    #[error("transfer failed: IO error on {path}: {source}")]
    Io {
        /// The destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The response body stream broke mid-transfer.
    #[error("transfer failed: body stream from {url} interrupted: {source}")]
    Stream {
        /// The file URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },
}

impl TransferError {
    /// Creates a request error for the named file.
    pub fn request(name: impl Into<String>, source: RequestError) -> Self {
        Self::Request {
            name: name.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the underlying cause must stop the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Request { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Errors that abort the walk of a subtree.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Fetching or decoding the listing failed.
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// The listing hangs directly off the tree's true root.
    #[error("you are not allowed to download {name}")]
    RootGuard {
        /// Name of the refused directory.
        name: String,
    },

    /// Creating the local directory failed for a reason other than "already exists".
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// The directory path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that fail a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The requested parallelism is outside `1..=max`.
    #[error("invalid parallelism {value}: must be between 1 and {max}")]
    InvalidParallelism {
        /// The rejected value.
        value: usize,
        /// The ceiling.
        max: usize,
    },

    /// The HTTP client could not be built.
    #[error("failed to initialize HTTP client: {0}")]
    Client(#[source] RequestError),

    /// The directory walk failed.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// A file transfer hit a condition that cannot be recovered per item.
    #[error("fatal error while downloading {name}: {source}")]
    FatalTransfer {
        /// Display name of the file.
        name: String,
        /// The transfer error.
        #[source]
        source: TransferError,
    },
}
