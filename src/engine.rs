//! Entry point tying the token issuer, stores, gate and rotator together.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AuthenticationGate, Identity, VerifiedRefresh};
use crate::db::Database;
use crate::error::AuthError;
use crate::jwt::{IssuedToken, TokenClass, TokenIssuer, TokenPair};
use crate::rotation::SessionRotator;
use crate::settings::AuthSettings;

/// Minimum length of each signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Clone)]
pub struct AuthEngine {
    db: Database,
    issuer: Arc<TokenIssuer>,
    gate: AuthenticationGate,
    rotator: SessionRotator,
    settings: AuthSettings,
}

impl AuthEngine {
    /// Build an engine. Fails on weak or shared secrets and invalid settings.
    pub fn new(
        db: Database,
        access_secret: &[u8],
        refresh_secret: &[u8],
        settings: AuthSettings,
    ) -> Result<Self, AuthError> {
        settings.validate()?;

        if access_secret.len() < MIN_SECRET_LENGTH || refresh_secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::configuration(format!(
                "signing secrets must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::configuration(
                "access and refresh secrets must differ",
            ));
        }

        let issuer = Arc::new(TokenIssuer::with_lifetimes(
            access_secret,
            refresh_secret,
            settings.access_ttl,
            settings.refresh_ttl,
        ));
        let gate = AuthenticationGate::new(issuer.clone(), db.blacklist());
        let rotator = SessionRotator::new(db.clone(), issuer.clone(), settings.blacklist_ttl);

        Ok(Self {
            db,
            issuer,
            gate,
            rotator,
            settings,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Open a session for an already identified user and mint its token pair.
    ///
    /// The session only becomes visible together with both pairs.
    pub async fn sign_in(&self, user_id: i64) -> Result<TokenPair, AuthError> {
        const OPERATION: &str = "sign in";
        let sessions = self.db.sessions();

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(AuthError::transaction(OPERATION))?;

        let session = sessions
            .create(&mut tx, user_id)
            .await
            .map_err(AuthError::transaction(OPERATION))?;

        let pair = self
            .issuer
            .issue_pair(user_id, session.id)
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        for token in [&pair.access, &pair.refresh] {
            sessions
                .attach_token_pair(
                    &mut tx,
                    session.id,
                    token.class,
                    token.fingerprint.as_str(),
                    &token.verification_hash,
                )
                .await
                .map_err(AuthError::transaction(OPERATION))?;
        }

        tx.commit().await.map_err(AuthError::transaction(OPERATION))?;

        info!(user_id, session_id = session.id, "Session opened");
        Ok(pair)
    }

    /// Verify a presented token of the given class.
    pub async fn authenticate(
        &self,
        class: TokenClass,
        token: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.gate.authenticate(class, token).await
    }

    /// Verify a refresh token ahead of a rotation.
    pub async fn authenticate_refresh(
        &self,
        token: Option<&str>,
    ) -> Result<VerifiedRefresh, AuthError> {
        self.gate.authenticate_refresh(token).await
    }

    /// Issue a new access token for the refresh token's session.
    pub async fn rotate(&self, refresh: &VerifiedRefresh) -> Result<IssuedToken, AuthError> {
        self.rotator.rotate(refresh).await
    }

    /// Destroy the caller's session, revoking both of its tokens.
    ///
    /// Returns false if the session was already gone.
    pub async fn logout(&self, identity: Identity) -> Result<bool, AuthError> {
        let destroyed = self
            .db
            .sessions()
            .destroy(
                identity.user_id,
                identity.session_id,
                self.settings.blacklist_ttl,
            )
            .await
            .map_err(|e| {
                warn!(
                    session_id = identity.session_id,
                    operation = "logout",
                    error = %e,
                    "Session destroy rolled back"
                );
                AuthError::transaction("logout")(e)
            })?;

        if destroyed {
            info!(
                user_id = identity.user_id,
                session_id = identity.session_id,
                "Session closed"
            );
        }
        Ok(destroyed)
    }
}
