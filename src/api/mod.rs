mod error;
mod users;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::engine::AuthEngine;
use crate::rate_limit::{RateLimitConfig, rate_limit};

pub use error::{ApiError, ResultExt};
pub use users::UsersState;

/// Create the API router. Every route is rate limited per client IP.
pub fn create_api_router(engine: Arc<AuthEngine>, rate_limit_config: Arc<RateLimitConfig>) -> Router {
    let users_state = UsersState { engine };

    Router::new()
        .merge(users::router(users_state))
        .layer(middleware::from_fn_with_state(rate_limit_config, rate_limit))
}
