//! Errors surfaced by the authentication engine.

/// Outcome of a failed engine operation.
///
/// `InvalidOrExpired` deliberately covers bad signatures, wrong class, elapsed
/// expiry and revocation alike, so callers cannot tell which check failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was supplied
    #[error("no token supplied")]
    Unauthenticated,
    #[error("invalid or expired token")]
    InvalidOrExpired,
    /// A store error inside a transaction. Nothing was committed, so the whole
    /// operation is safe to retry.
    #[error("{operation} failed: {source}")]
    TransactionFailure {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    /// Misconfigured secrets, lifetimes or token format
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Map a store error for `operation` into a [`AuthError::TransactionFailure`].
    pub fn transaction(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| AuthError::TransactionFailure { operation, source }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AuthError::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_failure_names_operation() {
        let err = AuthError::transaction("rotate")(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("rotate failed"));
    }

    #[test]
    fn test_rejections_do_not_leak_detail() {
        assert_eq!(AuthError::InvalidOrExpired.to_string(), "invalid or expired token");
    }
}
