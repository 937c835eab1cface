//! Directory listings and the tree fetcher.
//!
//! The listing endpoint answers with
//! `{ "data": { "id", "name", "dir", "parent", "files": [...] } }`; only the
//! immediate children are used. Each call is one round trip and nothing is
//! cached between calls.

use serde::Deserialize;
use tracing::{debug, instrument};

use super::constants::LISTING_ENDPOINT;
use super::error::{ListingError, RequestError};
use super::executor::{Method, RequestExecutor};

/// Whether an entry is a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Recursed into by the walker.
    Directory,
    /// Dispatched as a transfer.
    File,
}

/// One child reference inside a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Opaque remote identifier.
    pub id: String,
    /// Name used for the local path component.
    pub name: String,
    /// Directory or file.
    pub kind: EntryKind,
}

impl Entry {
    /// Returns true for directory entries.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Decoded metadata for one directory and its immediate children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Identifier of this directory.
    pub id: String,
    /// Name of this directory.
    pub name: String,
    /// Identifier of the parent directory (empty when the server sends none).
    pub parent: String,
    /// Children in listing order.
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    data: RawNode,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    name: String,
    #[serde(rename = "dir", default)]
    is_dir: bool,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    files: Option<Vec<RawNode>>,
}

impl RawNode {
    fn into_listing(self) -> DirectoryListing {
        let entries = self
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|child| Entry {
                kind: if child.is_dir {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
                id: child.id,
                name: child.name,
            })
            .collect();

        DirectoryListing {
            id: self.id,
            name: self.name,
            parent: self.parent.unwrap_or_default(),
            entries,
        }
    }
}

/// Decodes a listing body.
///
/// # Errors
///
/// Returns [`ListingError::MalformedResponse`] if the body is not the listing
/// schema, or [`ListingError::UnsafeName`] if a name is not a single plain
/// path component.
pub fn decode_listing(id: &str, body: &[u8]) -> Result<DirectoryListing, ListingError> {
    let envelope: ListingEnvelope =
        serde_json::from_slice(body).map_err(|source| ListingError::MalformedResponse {
            id: id.to_string(),
            source,
        })?;
    let listing = envelope.data.into_listing();

    let names = std::iter::once(listing.name.as_str())
        .chain(listing.entries.iter().map(|e| e.name.as_str()));
    for name in names {
        if !is_plain_component(name) {
            return Err(ListingError::UnsafeName {
                id: id.to_string(),
                name: name.to_string(),
            });
        }
    }

    Ok(listing)
}

/// A name is usable locally when it is non-empty, not `.`/`..`, and has no separators.
fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Resolves directory identifiers to listings through the request executor.
#[derive(Debug, Clone)]
pub struct TreeFetcher {
    executor: RequestExecutor,
}

impl TreeFetcher {
    /// Creates a fetcher sharing the given executor.
    #[must_use]
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Fetches the listing for one directory identifier.
    ///
    /// # Errors
    ///
    /// - [`ListingError::Request`] if the request fails (rate limiting is
    ///   already absorbed by the executor)
    /// - [`ListingError::MalformedResponse`] if the body does not decode
    #[instrument(skip(self))]
    pub async fn fetch_listing(&self, id: &str) -> Result<DirectoryListing, ListingError> {
        let endpoint = format!("{LISTING_ENDPOINT}{id}");
        let response = self
            .executor
            .execute(Method::Get, &endpoint, 0)
            .await
            .map_err(|source| ListingError::Request {
                id: id.to_string(),
                source,
            })?;

        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| ListingError::Request {
                id: id.to_string(),
                source: RequestError::network(url, e),
            })?;

        let listing = decode_listing(id, &body)?;
        debug!(
            name = %listing.name,
            entries = listing.entries.len(),
            "fetched listing"
        );
        Ok(listing)
    }
}
