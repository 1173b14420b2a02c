//! URL handling module
//!
//! Canonicalization of article URLs (the deduplication key) and same-site checks
//! used when filtering links found on listing pages.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Returns true if both URLs point at the same host and port
pub fn same_site(a: &Url, b: &Url) -> bool {
    a.host_str().map(str::to_lowercase) == b.host_str().map(str::to_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}
