//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::bearer::get_bearer_token;
use super::errors::ApiAuthError;
use super::gate::{Identity, VerifiedRefresh};
use super::state::HasAuthBackend;
use crate::jwt::TokenClass;

/// Extractor for endpoints that require a valid access token.
///
/// On success the identity is also stored in the request extensions.
pub struct AccessAuth(pub Identity);

impl<S> FromRequestParts<S> for AccessAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = state
            .engine()
            .authenticate(TokenClass::Access, get_bearer_token(&parts.headers))
            .await?;

        parts.extensions.insert(identity);
        Ok(AccessAuth(identity))
    }
}

/// Extractor for the rotation endpoint. Requires a valid refresh token.
pub struct RefreshAuth(pub VerifiedRefresh);

impl<S> FromRequestParts<S> for RefreshAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let refresh = state
            .engine()
            .authenticate_refresh(get_bearer_token(&parts.headers))
            .await?;

        parts.extensions.insert(refresh.identity());
        Ok(RefreshAuth(refresh))
    }
}
