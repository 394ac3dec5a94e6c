//! `/invites` routes, seen from the invitee's side.

use crate::{
    api::{AppState, auth::AuthUser, error::AppError, extract::PathParams},
    core::invitation::{self, PendingInvite},
    entities::{PlanInviteModel, PlanMemberModel},
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/invites/pending", get(pending))
        .route("/invites/{invite_id}/accept", post(accept))
        .route("/invites/{invite_id}/reject", post(reject))
}

async fn pending(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<PendingInvite>>, AppError> {
    Ok(Json(invitation::list_pending(&state.db, user_id).await?))
}

async fn accept(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(invite_id): PathParams<i64>,
) -> Result<Json<PlanMemberModel>, AppError> {
    Ok(Json(
        invitation::accept_invite(&state.db, invite_id, user_id).await?,
    ))
}

async fn reject(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(invite_id): PathParams<i64>,
) -> Result<Json<PlanInviteModel>, AppError> {
    Ok(Json(
        invitation::reject_invite(&state.db, invite_id, user_id).await?,
    ))
}
