//! Per-request token verification.
//!
//! Order of checks for a presented token of class `C`:
//! 1. no token: `Unauthenticated`
//! 2. fingerprint, then blacklist lookup (fast negative on miss)
//! 3. signature and expiry under the class key
//!
//! Every failure after step 1 is reported as `InvalidOrExpired`.

use std::sync::Arc;

use tracing::debug;

use crate::db::BlacklistStore;
use crate::error::AuthError;
use crate::fingerprint::fingerprint;
use crate::jwt::{AccessClaims, RefreshClaims, TokenClaims, TokenClass, TokenIssuer};

/// Verified caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub session_id: i64,
}

/// A refresh token that passed the gate.
///
/// Only [`AuthenticationGate::authenticate_refresh`] can build one, so a rotation
/// can never be started from an unchecked token.
#[derive(Debug, Clone)]
pub struct VerifiedRefresh {
    identity: Identity,
}

impl VerifiedRefresh {
    pub fn identity(&self) -> Identity {
        self.identity
    }
}

#[derive(Clone)]
pub struct AuthenticationGate {
    issuer: Arc<TokenIssuer>,
    blacklist: BlacklistStore,
}

impl AuthenticationGate {
    pub fn new(issuer: Arc<TokenIssuer>, blacklist: BlacklistStore) -> Self {
        Self { issuer, blacklist }
    }

    /// Verify a token of the given class.
    pub async fn authenticate(
        &self,
        class: TokenClass,
        token: Option<&str>,
    ) -> Result<Identity, AuthError> {
        match class {
            TokenClass::Access => self.check::<AccessClaims>(token).await,
            TokenClass::Refresh => self.check::<RefreshClaims>(token).await,
        }
    }

    /// Verify a refresh token and wrap it for the rotator.
    pub async fn authenticate_refresh(
        &self,
        token: Option<&str>,
    ) -> Result<VerifiedRefresh, AuthError> {
        let identity = self.check::<RefreshClaims>(token).await?;
        Ok(VerifiedRefresh { identity })
    }

    async fn check<C: TokenClaims>(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        // Presented tokens are untrusted, so a malformed one is just invalid.
        let fingerprint = fingerprint(token).map_err(|e| {
            debug!(class = %C::CLASS, error = %e, "Rejected unfingerprintable token");
            AuthError::InvalidOrExpired
        })?;

        let revoked = self
            .blacklist
            .is_revoked(C::CLASS, fingerprint.as_str(), token)
            .await
            .map_err(AuthError::transaction("blacklist lookup"))?;
        if revoked {
            debug!(class = %C::CLASS, "Rejected revoked token");
            return Err(AuthError::InvalidOrExpired);
        }

        let claims = self.issuer.verify::<C>(token).map_err(|e| {
            debug!(class = %C::CLASS, error = %e, "Rejected token");
            AuthError::InvalidOrExpired
        })?;

        Ok(Identity {
            user_id: claims.user_id(),
            session_id: claims.session_id(),
        })
    }
}
