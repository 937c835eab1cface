//! Runtime settings shared by every component of a mirror run.

use std::time::Duration;

use super::constants::{
    BACKOFF_UNIT, CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, READ_TIMEOUT_SECS, ROOT_SENTINEL_ID,
};

/// Settings for the request executor and the directory walker.
///
/// Parallelism is not part of this struct; it is passed per run so the
/// coordinator can validate it against the hard ceiling.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Origin every endpoint path is appended to (no trailing slash).
    pub base_url: String,
    /// Parent identifier that marks a listing as the tree's true root.
    /// `None` disables the guard.
    pub root_sentinel: Option<String>,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// Longest silence allowed between reads; not a deadline for the whole body.
    pub read_timeout: Duration,
    /// Unit the `Retry-After` value is counted in.
    pub backoff_unit: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            root_sentinel: Some(ROOT_SENTINEL_ID.to_string()),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            backoff_unit: BACKOFF_UNIT,
        }
    }
}

impl MirrorConfig {
    /// Creates a config for the given origin with default limits.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Self::default()
        }
    }

    /// Overrides the root sentinel (`None` disables the guard).
    #[must_use]
    pub fn with_root_sentinel(mut self, sentinel: Option<String>) -> Self {
        self.root_sentinel = sentinel;
        self
    }

    /// Overrides connect and read timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Overrides the backoff unit.
    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
