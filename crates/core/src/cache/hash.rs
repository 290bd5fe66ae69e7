//! Store keys for request identities.

use sha2::{Digest, Sha256};

/// Compute the store key for a request identity.
///
/// The method participates so a stored GET can never be confused with
/// another method for the same URL.
pub fn compute_request_key(method: &str, identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}
