/// Refresh Token Fingerprints
///
/// The credential store never holds a refresh token in plaintext, only its
/// SHA-256 fingerprint. Exactly one fingerprint is stored per account; a
/// presented refresh token is usable only while its fingerprint is the stored
/// one.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hash a refresh token using SHA-256, hex encoded
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Does `token` hash to the stored fingerprint?
///
/// Comparison time does not depend on where the fingerprints first differ.
pub fn matches(token: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(stored) => fingerprint(token).as_bytes().ct_eq(stored.as_bytes()).into(),
        None => false,
    }
}
