//! Cache key generation.
//!
//! Keys are derived from the request method, the canonical absolute URL and
//! the values of any configured vary headers. Credentials never take part.

use sha2::{Digest, Sha256};

use crate::request::RequestDescriptor;

/// Compute the cache key for a request.
///
/// `url` must already be canonical and absolute so that `/a` and
/// `https://origin/a` share an entry.
pub fn compute_cache_key(method: &str, url: &str, vary_headers: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(vary_headers.as_bytes());
    hex::encode(hasher.finalize())
}

/// Join the values of `names` on `request` into the vary component of a key.
///
/// Missing headers contribute an empty value so the position stays stable.
/// Repeated headers are joined with `,`; opaque (non-UTF-8) values are
/// hex-encoded.
pub fn vary_component(request: &RequestDescriptor, names: &[String]) -> String {
    names
        .iter()
        .map(|name| {
            let value = request
                .headers
                .get_all(name.as_str())
                .iter()
                .map(|v| v.to_str().map_or_else(|_| hex::encode(v.as_bytes()), str::to_string))
                .collect::<Vec<_>>()
                .join(",");
            format!("{}={}", name.to_ascii_lowercase(), value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether `value` looks like a key produced by [`compute_cache_key`].
pub fn is_valid_key(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
