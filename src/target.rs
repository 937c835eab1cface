//! Root identifier extraction from user input.
//!
//! Accepts either a bare UUID or a URL whose fragment is one, e.g.
//! `https://vadapav.mov/#0b9c7c3e-5a47-4a43-9f67-0c9e6b1b8a11`.

use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Errors from [`parse_target`].
#[derive(Debug, Error)]
pub enum TargetError {
    /// Nothing was provided.
    #[error("no target given")]
    Empty,

    /// The input is neither a UUID nor a URL.
    #[error("invalid target {input:?}: {source}")]
    InvalidUrl {
        /// The raw input.
        input: String,
        /// The URL parse error.
        #[source]
        source: url::ParseError,
    },

    /// The URL fragment (or bare input) is not a UUID.
    #[error("invalid identifier {fragment:?} in {input:?}: expected a UUID")]
    InvalidIdentifier {
        /// The raw input.
        input: String,
        /// The candidate identifier.
        fragment: String,
    },
}

/// Extracts the root directory identifier from `input`.
///
/// # Errors
///
/// Returns [`TargetError`] if the input is empty, is not a URL, or carries no
/// UUID.
pub fn parse_target(input: &str) -> Result<String, TargetError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TargetError::Empty);
    }

    if Uuid::parse_str(input).is_ok() {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input).map_err(|source| TargetError::InvalidUrl {
        input: input.to_string(),
        source,
    })?;
    let fragment = parsed.fragment().unwrap_or_default();

    if Uuid::parse_str(fragment).is_err() {
        return Err(TargetError::InvalidIdentifier {
            input: input.to_string(),
            fragment: fragment.to_string(),
        });
    }
    Ok(fragment.to_string())
}
