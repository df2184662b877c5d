//! Access token rotation.
//!
//! One transaction per rotation:
//! 1. claim the session row (version bump, takes the write lock)
//! 2. blacklist the current access pair
//! 3. mint a new access token
//! 4. attach the new access pair
//!
//! Any failure drops the transaction, so the old pair stays current and the
//! revocation never becomes visible on its own. Concurrent rotations of the same
//! session queue on step 1; the later one sees the earlier one's token as current
//! and revokes it.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqliteConnection;
use tracing::{debug, error, info};

use crate::auth::{Identity, VerifiedRefresh};
use crate::db::{BlacklistStore, Database};
use crate::error::AuthError;
use crate::jwt::{IssuedToken, TokenClass, TokenIssuer};

const OPERATION: &str = "rotate";

#[derive(Clone)]
pub struct SessionRotator {
    db: Database,
    issuer: Arc<TokenIssuer>,
    blacklist_ttl: Duration,
}

impl SessionRotator {
    pub fn new(db: Database, issuer: Arc<TokenIssuer>, blacklist_ttl: Duration) -> Self {
        Self {
            db,
            issuer,
            blacklist_ttl,
        }
    }

    /// Replace the session's access token. The refresh token stays valid.
    pub async fn rotate(&self, refresh: &VerifiedRefresh) -> Result<IssuedToken, AuthError> {
        let identity = refresh.identity();
        let result = self.rotate_inner(identity).await;

        match &result {
            Ok(_) => info!(
                user_id = identity.user_id,
                session_id = identity.session_id,
                "Access token rotated"
            ),
            Err(AuthError::InvalidOrExpired) => debug!(
                session_id = identity.session_id,
                "Rotation for missing session"
            ),
            Err(e) => error!(
                user_id = identity.user_id,
                session_id = identity.session_id,
                operation = OPERATION,
                error = %e,
                "Rotation rolled back"
            ),
        }
        result
    }

    async fn rotate_inner(&self, identity: Identity) -> Result<IssuedToken, AuthError> {
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(AuthError::transaction(OPERATION))?;

        let issued = self.rotate_in(&mut tx, identity).await?;

        tx.commit().await.map_err(AuthError::transaction(OPERATION))?;
        Ok(issued)
    }

    async fn rotate_in(
        &self,
        conn: &mut SqliteConnection,
        identity: Identity,
    ) -> Result<IssuedToken, AuthError> {
        let sessions = self.db.sessions();

        // A destroyed session has revoked its refresh token too; this only
        // happens when the destroy raced with the gate.
        let session = sessions
            .claim(&mut *conn, identity.user_id, identity.session_id)
            .await
            .map_err(AuthError::transaction(OPERATION))?
            .ok_or(AuthError::InvalidOrExpired)?;

        let (fingerprint, hash) = session.token_pair(TokenClass::Access);
        if !fingerprint.is_empty() {
            BlacklistStore::revoke(
                &mut *conn,
                TokenClass::Access,
                fingerprint,
                hash,
                self.blacklist_ttl,
            )
            .await
            .map_err(AuthError::transaction(OPERATION))?;
        }

        let issued = self
            .issuer
            .issue_access_token(identity.user_id, identity.session_id)
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let attached = sessions
            .attach_token_pair(
                &mut *conn,
                session.id,
                TokenClass::Access,
                issued.fingerprint.as_str(),
                &issued.verification_hash,
            )
            .await
            .map_err(AuthError::transaction(OPERATION))?;
        if !attached {
            return Err(AuthError::TransactionFailure {
                operation: OPERATION,
                source: sqlx::Error::RowNotFound,
            });
        }

        Ok(issued)
    }
}
