//! `/notifications` routes. Every route is scoped to the requester's own feed.

use crate::{
    api::{AppState, auth::AuthUser, error::AppError, extract::PathParams},
    core::notification,
    entities::NotificationModel,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct UnreadCount {
    unread: u64,
}

#[derive(Debug, Serialize)]
struct Updated {
    updated: u64,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", put(read_all))
        .route(
            "/notifications/{notification_id}",
            get(get_one).put(mark_read).delete(remove),
        )
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<NotificationModel>>, AppError> {
    Ok(Json(
        notification::list_for_recipient(&state.db, user_id).await?,
    ))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UnreadCount>, AppError> {
    let unread = notification::unread_count(&state.db, user_id).await?;
    Ok(Json(UnreadCount { unread }))
}

async fn read_all(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Updated>, AppError> {
    let updated = notification::mark_all_read(&state.db, user_id).await?;
    Ok(Json(Updated { updated }))
}

async fn get_one(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(notification_id): PathParams<i64>,
) -> Result<Json<NotificationModel>, AppError> {
    Ok(Json(
        notification::get_notification(&state.db, user_id, notification_id).await?,
    ))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(notification_id): PathParams<i64>,
) -> Result<Json<NotificationModel>, AppError> {
    Ok(Json(
        notification::mark_as_read(&state.db, user_id, notification_id).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(notification_id): PathParams<i64>,
) -> Result<StatusCode, AppError> {
    notification::delete_notification(&state.db, user_id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
