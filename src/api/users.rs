//! `/users` routes.

use crate::{
    api::{AppState, auth::AuthUser, error::AppError, extract::JsonBody},
    core::user,
    entities::UserModel,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    display_name: String,
    #[serde(default)]
    requires_approval: bool,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserModel>), AppError> {
    let user = user::register_user(
        &state.db,
        &body.email,
        &body.display_name,
        body.requires_approval,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserModel>, AppError> {
    Ok(Json(user::require_user(&*state.db, user_id).await?))
}
