//! User-Agent string sent with every mirror request.

/// Default User-Agent for listing and file requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("treeget/{version} (directory-mirror)")
}
