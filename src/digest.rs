//! Salted one-way hashes of raw tokens.
//!
//! The hash is stored next to a fingerprint and only ever used to confirm that a
//! candidate token is the exact one that was revoked. Tokens are high-entropy,
//! so a single salted SHA-256 is enough; no key stretching.

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use rand::RngCore;

const SALT_LEN: usize = 16;
const SCHEME: &str = "v1";

/// Hash a raw token with a fresh random salt.
///
/// Format: `v1${base64 salt}${base64 sha256(salt ‖ token)}`
pub fn hash_token(token: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let digest = salted_digest(&salt, token);

    format!(
        "{}${}${}",
        SCHEME,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    )
}

/// Check a raw token against a stored hash. Malformed hashes never match.
pub fn verify_token(token: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(expected),
    ) else {
        return false;
    };

    let actual = salted_digest(&salt, token);
    expected.len() == actual.len() && openssl::memcmp::eq(&expected, &actual)
}

fn salted_digest(salt: &[u8], token: &str) -> [u8; 32] {
    let mut hasher = openssl::sha::Sha256::new();
    hasher.update(salt);
    hasher.update(token.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_same_token() {
        let hash = hash_token("header.payload.signature");
        assert!(hash.starts_with("v1$"));
        assert!(verify_token("header.payload.signature", &hash));
    }

    #[test]
    fn test_hash_rejects_other_token() {
        let hash = hash_token("header.payload.signature");
        assert!(!verify_token("header.payload.signaturf", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_token("same-token");
        let b = hash_token("same-token");
        assert_ne!(a, b);
        assert!(verify_token("same-token", &a));
        assert!(verify_token("same-token", &b));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_token("token", ""));
        assert!(!verify_token("token", "v1$onlysalt"));
        assert!(!verify_token("token", "v2$c2FsdA$ZGlnZXN0"));
        assert!(!verify_token("token", "v1$!!!$ZGlnZXN0"));
    }
}
