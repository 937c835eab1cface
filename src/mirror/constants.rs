//! Constants for the mirror engine (endpoints, limits, timeouts).

use std::time::Duration;

/// Origin used when neither the command line nor the config file names one.
pub const DEFAULT_BASE_URL: &str = "https://vadapav.mov";

/// Listing endpoint prefix; the directory identifier is appended.
pub const LISTING_ENDPOINT: &str = "/api/d/";

/// File endpoint prefix; the file identifier is appended.
pub const FILE_ENDPOINT: &str = "/f/";

/// Identifier of the tree's true root. Listings whose parent is this value are refused.
pub const ROOT_SENTINEL_ID: &str = "11111111-1111-1111-1111-111111111111";

/// Default number of simultaneous file transfers.
pub const DEFAULT_PARALLEL: usize = 3;

/// Hard ceiling on simultaneous file transfers.
pub const MAX_PARALLEL: usize = 10;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle read timeout (5 minutes without a byte).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Unit the `Retry-After` value is counted in.
pub const BACKOFF_UNIT: Duration = Duration::from_secs(1);
