use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{AccessAuth, RefreshAuth};
use crate::db::{NewUser, PublicId, User};
use crate::engine::AuthEngine;
use crate::impl_has_auth_backend;
use crate::password;

#[derive(Clone)]
pub struct UsersState {
    pub engine: Arc<AuthEngine>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signin/new_token", post(new_token))
        .route("/info", get(info))
        .route("/logout", get(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct Credentials {
    id: String,
    password: String,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigninResponse {
    ok: bool,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
struct InfoResponse {
    ok: bool,
    user: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTokenResponse {
    ok: bool,
    user: i64,
    access_token: String,
}

#[derive(Serialize)]
struct LogoutResponse {
    ok: bool,
    logout: bool,
}

async fn signup(
    State(state): State<UsersState>,
    Json(payload): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let public_id = PublicId::parse(&payload.id)
        .ok_or_else(|| ApiError::bad_request("Wrong email or password"))?;
    password::validate_password_strength(&payload.password).map_err(ApiError::bad_request)?;

    let users = state.engine.db().users();
    let existing = users
        .get_by_public_id(public_id.as_str())
        .await
        .db_err("Failed to look up user")?;
    if existing.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    // Argon2 is deliberately slow; keep it off the async workers.
    let new_user = tokio::task::spawn_blocking(move || {
        NewUser::with_password(public_id, &payload.password)
    })
    .await
    .db_err("Failed to create user")?
    .db_err("Failed to create user")?;

    let id = users.create(&new_user).await.map_err(|e| {
        if e.as_database_error()
            .is_some_and(|d| d.is_unique_violation())
        {
            ApiError::bad_request("User already exists")
        } else {
            ApiError::db_error("Failed to create user", e)
        }
    })?;

    info!(user_id = id, "User signed up");
    Ok(Json(OkResponse { ok: true }))
}

async fn signin(
    State(state): State<UsersState>,
    Json(payload): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let public_id =
        PublicId::parse(&payload.id).ok_or_else(|| ApiError::bad_request("No such user"))?;
    let user = state
        .engine
        .db()
        .users()
        .get_by_public_id(public_id.as_str())
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::bad_request("No such user"))?;

    let user_id = user.id;
    let valid = tokio::task::spawn_blocking(move || user.verify_password(&payload.password))
        .await
        .db_err("Failed to verify password")?
        .db_err("Failed to verify password")?;
    if !valid {
        return Err(ApiError::unauthorized("Wrong password"));
    }

    let pair = state.engine.sign_in(user_id).await?;

    Ok(Json(SigninResponse {
        ok: true,
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
    }))
}

async fn find_user(state: &UsersState, user_id: i64) -> Result<User, ApiError> {
    state
        .engine
        .db()
        .users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::internal("Something went wrong, cannot find user"))
}

async fn info(
    State(state): State<UsersState>,
    AccessAuth(identity): AccessAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_user(&state, identity.user_id).await?;

    Ok(Json(InfoResponse {
        ok: true,
        user: user.public_id().to_string(),
    }))
}

async fn new_token(
    State(state): State<UsersState>,
    RefreshAuth(refresh): RefreshAuth,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.engine.rotate(&refresh).await?;

    Ok(Json(NewTokenResponse {
        ok: true,
        user: refresh.identity().user_id,
        access_token: issued.token,
    }))
}

async fn logout(
    State(state): State<UsersState>,
    AccessAuth(identity): AccessAuth,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.logout(identity).await?;

    Ok(Json(LogoutResponse {
        ok: true,
        logout: true,
    }))
}
