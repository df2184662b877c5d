//! Authentication rejections as HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::error::AuthError;

pub const NEED_TOKEN_MESSAGE: &str = "Need token to access route";

/// Shared by revoked, expired, malformed and wrong-class tokens.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Rejection returned by the auth extractors.
#[derive(Debug)]
pub struct ApiAuthError(pub AuthError);

impl From<AuthError> for ApiAuthError {
    fn from(e: AuthError) -> Self {
        Self(e)
    }
}

impl ApiAuthError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::InvalidOrExpired => StatusCode::FORBIDDEN,
            AuthError::TransactionFailure { .. } | AuthError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self.0 {
            AuthError::Unauthenticated => NEED_TOKEN_MESSAGE,
            AuthError::InvalidOrExpired => INVALID_TOKEN_MESSAGE,
            AuthError::TransactionFailure { .. } | AuthError::Configuration(_) => {
                "Something went wrong"
            }
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            ok: bool,
            error: &'static str,
        }

        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "Authentication failed");
        }

        (
            status,
            Json(ErrorResponse {
                ok: false,
                error: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiAuthError(AuthError::Unauthenticated).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiAuthError(AuthError::InvalidOrExpired).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiAuthError(AuthError::transaction("rotate")(sqlx::Error::PoolClosed)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_failures_hide_detail() {
        let err = ApiAuthError(AuthError::transaction("rotate")(sqlx::Error::PoolClosed));
        assert_eq!(err.message(), "Something went wrong");
    }
}
