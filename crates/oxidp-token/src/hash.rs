//! Hash helpers shared by token minting and the code store.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Left-half SHA-256 hash, base64url encoded without padding.
///
/// This is the RS256 convention for the `at_hash` and `c_hash` ID-token
/// claims: hash with the algorithm matching the signature (SHA-256), keep
/// the left 128 bits.
#[must_use]
pub fn half_hash(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Full SHA-256 identity hash of a token, base64url encoded.
///
/// Used as the key of the consumed-code set so the set never stores the
/// code itself.
#[must_use]
pub fn identity_hash(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_hash_is_16_bytes_before_encoding() {
        // 16 bytes base64url-encode to 22 characters without padding.
        assert_eq!(half_hash("anything").len(), 22);
    }

    #[test]
    fn half_hash_matches_known_vector() {
        // SHA-256("jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y")[0..16]
        // is the at_hash example from OIDC Core 1.0 §A.3.
        assert_eq!(
            half_hash("jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y"),
            "77QmUPtjPfzWtF2AnpK9RQ"
        );
    }

    #[test]
    fn identity_hash_is_stable_and_distinct() {
        assert_eq!(identity_hash("code-a"), identity_hash("code-a"));
        assert_ne!(identity_hash("code-a"), identity_hash("code-b"));
    }
}
