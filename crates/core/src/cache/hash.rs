//! Request key generation.

use sha2::{Digest, Sha256};

/// Compute the key a request is stored under inside a generation.
///
/// `url` is expected without its fragment.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
