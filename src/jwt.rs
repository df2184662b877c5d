//! JWT token issuing and validation.
//!
//! Two token classes, each signed with its own secret:
//! - Access tokens: short-lived, presented on every protected request
//! - Refresh tokens: longer-lived, only accepted by the rotation endpoint
//!
//! Every issued token comes with its fingerprint and a salted hash of the raw
//! token. Those two values are what sessions and the blacklist store; the raw
//! token itself is only handed to the caller.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::digest;
use crate::fingerprint::{Fingerprint, FingerprintError, fingerprint};

/// Token class. Selects the signing key and the blacklist namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: i64,
    /// Session id
    pub sid: i64,
    /// Random token id, keeps two tokens minted in the same second distinct
    pub jti: String,
    #[serde(rename = "typ")]
    pub token_class: TokenClass,
    pub iat: u64,
    pub exp: u64,
}

/// Claims carried by a refresh token.
///
/// Kept separate from [`AccessClaims`] even though the fields currently match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: i64,
    pub sid: i64,
    pub jti: String,
    #[serde(rename = "typ")]
    pub token_class: TokenClass,
    pub iat: u64,
    pub exp: u64,
}

/// Claims shared by both classes, as seen by the authentication gate.
pub trait TokenClaims: DeserializeOwned {
    const CLASS: TokenClass;

    fn user_id(&self) -> i64;
    fn session_id(&self) -> i64;
    fn token_class(&self) -> TokenClass;
}

impl TokenClaims for AccessClaims {
    const CLASS: TokenClass = TokenClass::Access;

    fn user_id(&self) -> i64 {
        self.sub
    }
    fn session_id(&self) -> i64 {
        self.sid
    }
    fn token_class(&self) -> TokenClass {
        self.token_class
    }
}

impl TokenClaims for RefreshClaims {
    const CLASS: TokenClass = TokenClass::Refresh;

    fn user_id(&self) -> i64 {
        self.sub
    }
    fn session_id(&self) -> i64 {
        self.sid
    }
    fn token_class(&self) -> TokenClass {
        self.token_class
    }
}

/// Default access token lifetime: 100 seconds
pub const ACCESS_TOKEN_DURATION: Duration = Duration::from_secs(100);

/// Default refresh token lifetime: 12 hours
pub const REFRESH_TOKEN_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

/// A freshly minted token together with what gets persisted about it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub class: TokenClass,
    /// The raw token, returned to the caller only
    pub token: String,
    pub fingerprint: Fingerprint,
    /// Salted one-way hash of `token`, used for blacklist comparison
    pub verification_hash: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Access and refresh token minted together at sign-in.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl ClassKeys {
    fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }
}

/// Mints and validates tokens for both classes.
///
/// Secrets are loaded once at startup and never change, so the issuer is shared
/// behind an `Arc` without locking.
pub struct TokenIssuer {
    access: ClassKeys,
    refresh: ClassKeys,
}

impl TokenIssuer {
    /// Create an issuer with the default lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_lifetimes(
            access_secret,
            refresh_secret,
            ACCESS_TOKEN_DURATION,
            REFRESH_TOKEN_DURATION,
        )
    }

    pub fn with_lifetimes(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            access: ClassKeys::new(access_secret, access_lifetime),
            refresh: ClassKeys::new(refresh_secret, refresh_lifetime),
        }
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Mint an access token for a session.
    pub fn issue_access_token(
        &self,
        user_id: i64,
        session_id: i64,
    ) -> Result<IssuedToken, TokenError> {
        let now = unix_now()?;
        let exp = now + self.access.lifetime.as_secs();
        let claims = AccessClaims {
            sub: user_id,
            sid: session_id,
            jti: uuid::Uuid::new_v4().to_string(),
            token_class: TokenClass::Access,
            iat: now,
            exp,
        };
        self.finish(TokenClass::Access, &claims, exp)
    }

    /// Mint a refresh token for a session.
    pub fn issue_refresh_token(
        &self,
        user_id: i64,
        session_id: i64,
    ) -> Result<IssuedToken, TokenError> {
        let now = unix_now()?;
        let exp = now + self.refresh.lifetime.as_secs();
        let claims = RefreshClaims {
            sub: user_id,
            sid: session_id,
            jti: uuid::Uuid::new_v4().to_string(),
            token_class: TokenClass::Refresh,
            iat: now,
            exp,
        };
        self.finish(TokenClass::Refresh, &claims, exp)
    }

    /// Mint both tokens for a new session.
    pub fn issue_pair(&self, user_id: i64, session_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access_token(user_id, session_id)?,
            refresh: self.issue_refresh_token(user_id, session_id)?,
        })
    }

    fn finish<C: Serialize>(
        &self,
        class: TokenClass,
        claims: &C,
        expires_at: u64,
    ) -> Result<IssuedToken, TokenError> {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(class).encoding,
        )
        .map_err(TokenError::Encoding)?;

        let fingerprint = fingerprint(&token).map_err(TokenError::Fingerprint)?;
        let verification_hash = digest::hash_token(&token);

        Ok(IssuedToken {
            class,
            token,
            fingerprint,
            verification_hash,
            expires_at,
        })
    }

    /// Check signature and expiry of a token of class `C::CLASS`.
    ///
    /// Does not consult the blacklist; that is the gate's job.
    pub fn verify<C: TokenClaims>(&self, token: &str) -> Result<C, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<C>(token, &self.keys(C::CLASS).decoding, &validation)
            .map_err(TokenError::Decoding)?;

        if token_data.claims.token_class() != C::CLASS {
            return Err(TokenError::WrongClass);
        }

        Ok(token_data.claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }
}

fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Errors that can occur while issuing or validating tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("failed to decode token: {0}")]
    Decoding(#[source] jsonwebtoken::errors::Error),
    #[error("issued token cannot be fingerprinted: {0}")]
    Fingerprint(#[source] FingerprintError),
    #[error("system time error")]
    TimeError,
    /// E.g. a refresh token presented as an access token
    #[error("wrong token class")]
    WrongClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"access-secret-for-testing-only-0001";
    const REFRESH_SECRET: &[u8] = b"refresh-secret-for-testing-only-0002";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(ACCESS_SECRET, REFRESH_SECRET)
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let issuer = issuer();
        let issued = issuer.issue_access_token(42, 7).unwrap();

        assert_eq!(issued.class, TokenClass::Access);
        assert!(digest::verify_token(&issued.token, &issued.verification_hash));
        assert_eq!(issued.fingerprint, fingerprint(&issued.token).unwrap());

        let claims = issuer.verify_access_token(&issued.token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.sid, 7);
        assert_eq!(claims.token_class, TokenClass::Access);
        assert_eq!(claims.exp, claims.iat + ACCESS_TOKEN_DURATION.as_secs());
        assert_eq!(claims.exp, issued.expires_at);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let issuer = issuer();
        let issued = issuer.issue_refresh_token(42, 7).unwrap();

        let claims = issuer.verify_refresh_token(&issued.token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.sid, 7);
        assert_eq!(claims.token_class, TokenClass::Refresh);
        assert_eq!(claims.exp, claims.iat + REFRESH_TOKEN_DURATION.as_secs());
    }

    #[test]
    fn test_classes_do_not_cross_verify() {
        let issuer = issuer();
        let pair = issuer.issue_pair(1, 1).unwrap();

        assert!(issuer.verify_refresh_token(&pair.access.token).is_err());
        assert!(issuer.verify_access_token(&pair.refresh.token).is_err());
    }

    #[test]
    fn test_same_secret_still_checks_class() {
        // Misconfigured issuer with one secret for both classes.
        let issuer = TokenIssuer::new(ACCESS_SECRET, ACCESS_SECRET);
        let pair = issuer.issue_pair(1, 1).unwrap();

        assert!(matches!(
            issuer.verify_access_token(&pair.refresh.token),
            Err(TokenError::WrongClass)
        ));
    }

    #[test]
    fn test_tokens_in_same_second_are_distinct() {
        let issuer = issuer();
        let a = issuer.issue_access_token(1, 1).unwrap();
        let b = issuer.issue_access_token(1, 1).unwrap();

        assert_ne!(a.token, b.token);
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_invalid_token() {
        assert!(issuer().verify_access_token("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenIssuer::new(b"some-other-access-secret-000000000", REFRESH_SECRET);
        let issued = issuer().issue_access_token(1, 1).unwrap();

        assert!(other.verify_access_token(&issued.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let now = unix_now().unwrap();
        let claims = AccessClaims {
            sub: 1,
            sid: 1,
            jti: "jti".to_string(),
            token_class: TokenClass::Access,
            iat: now - 200,
            exp: now - 100,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(ACCESS_SECRET),
        )
        .unwrap();

        assert!(issuer().verify_access_token(&token).is_err());
    }

    #[test]
    fn test_issued_tokens_are_long_enough_to_fingerprint() {
        let issued = issuer().issue_access_token(0, 0).unwrap();
        assert!(issued.token.len() >= crate::fingerprint::MIN_TOKEN_LENGTH);
    }
}
