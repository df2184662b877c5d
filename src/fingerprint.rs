//! Token fingerprinting.
//!
//! A fingerprint is a short, deterministic lookup key derived from a raw token.
//! It keeps the embedded user id and the two boundary substrings of the token,
//! plus a SHA-256 over those substrings. The middle of the token is dropped, so
//! the fingerprint cannot be turned back into a usable token.
//!
//! Layout: `{user_id}:{first N chars}:{last N chars}:{base64url(sha256(first ‖ last))}`
//!
//! The token class is not part of the fingerprint. Callers that need disjoint
//! namespaces per class prefix the key themselves (see `db::BlacklistStore`).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

/// Number of characters kept from each end of the token.
pub const BOUNDARY_SIZE: usize = 40;

/// Minimum token length that can be fingerprinted.
pub const MIN_TOKEN_LENGTH: usize = BOUNDARY_SIZE * 2;

/// Deterministic, non-reversible lookup key for a raw token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FingerprintError {
    /// Tokens are generated internally, so this means the token format or the
    /// boundary size is misconfigured.
    #[error("token is {len} characters, fingerprinting needs at least {}", MIN_TOKEN_LENGTH)]
    TooShort { len: usize },
    #[error("token is not a JWT")]
    NotJwt,
    #[error("token payload does not carry a subject")]
    MissingSubject,
}

/// The only payload field the fingerprint needs.
#[derive(Deserialize)]
struct EmbeddedSubject {
    sub: i64,
}

/// Compute the fingerprint of a raw token.
pub fn fingerprint(token: &str) -> Result<Fingerprint, FingerprintError> {
    // JWTs are base64url plus dots, so byte slicing stays on char boundaries.
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(FingerprintError::TooShort { len: token.len() });
    }
    if !token.is_ascii() {
        return Err(FingerprintError::NotJwt);
    }

    let user_id = embedded_subject(token)?;
    let start = &token[..BOUNDARY_SIZE];
    let end = &token[token.len() - BOUNDARY_SIZE..];

    let mut boundary = String::with_capacity(BOUNDARY_SIZE * 2);
    boundary.push_str(start);
    boundary.push_str(end);
    let hash = URL_SAFE_NO_PAD.encode(openssl::sha::sha256(boundary.as_bytes()));

    Ok(Fingerprint(format!("{}:{}:{}:{}", user_id, start, end, hash)))
}

/// Read the `sub` claim without verifying the signature.
fn embedded_subject(token: &str) -> Result<i64, FingerprintError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(FingerprintError::NotJwt),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| FingerprintError::NotJwt)?;
    let subject: EmbeddedSubject =
        serde_json::from_slice(&bytes).map_err(|_| FingerprintError::MissingSubject)?;

    Ok(subject.sub)
}
