//! `/plans` routes: plan lifecycle, members, invites and category limits.

use crate::{
    api::{AppState, auth::AuthUser, error::AppError, extract::{JsonBody, PathParams}},
    core::{
        category_limit, invitation,
        membership::{self, MemberWithUser, RoleChange},
        plan::{self, NewPlan, PlanChanges, PlanDetails, UserPlan},
        report::{self, PlanSummary},
    },
    entities::{PlanCategoryLimitModel, PlanInviteModel, PlanModel, PlanRole},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct InviteRequest {
    email: String,
    role: PlanRole,
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: PlanRole,
}

#[derive(Debug, Deserialize)]
struct LimitRequest {
    category: String,
    limit_amount: f64,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/{plan_id}",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/plans/{plan_id}/summary", get(summary))
        .route("/plans/{plan_id}/members", get(list_members))
        .route("/plans/{plan_id}/leave", post(leave))
        .route(
            "/plans/{plan_id}/invites",
            get(list_invites).post(create_invite),
        )
        .route(
            "/plans/{plan_id}/members/{user_id}",
            put(change_role).delete(remove_member),
        )
        .route("/plans/{plan_id}/limits", get(list_limits).put(set_limit))
        .route("/plans/{plan_id}/limits/{category}", delete(remove_limit))
}

async fn list_plans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserPlan>>, AppError> {
    Ok(Json(plan::list_user_plans(&state.db, user_id).await?))
}

async fn create_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(body): JsonBody<NewPlan>,
) -> Result<(StatusCode, Json<PlanModel>), AppError> {
    let plan = plan::create_plan(&state.db, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn get_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<Json<PlanDetails>, AppError> {
    Ok(Json(plan::get_plan_details(&state.db, user_id, plan_id).await?))
}

async fn update_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
    JsonBody(body): JsonBody<PlanChanges>,
) -> Result<Json<PlanModel>, AppError> {
    Ok(Json(plan::update_plan(&state.db, user_id, plan_id, body).await?))
}

async fn delete_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<StatusCode, AppError> {
    plan::delete_plan(&state.db, user_id, plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<Json<PlanSummary>, AppError> {
    Ok(Json(report::summarize_plan(&state.db, user_id, plan_id).await?))
}

async fn list_members(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<Json<Vec<MemberWithUser>>, AppError> {
    Ok(Json(membership::list_members(&state.db, user_id, plan_id).await?))
}

async fn leave(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<StatusCode, AppError> {
    plan::leave_plan(&state.db, user_id, plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_invite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
    JsonBody(body): JsonBody<InviteRequest>,
) -> Result<(StatusCode, Json<PlanInviteModel>), AppError> {
    let invite = invitation::create_invite(
        &state.db,
        user_id,
        plan_id,
        &body.email,
        body.role,
        state.settings.invites.ttl(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

async fn list_invites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<Json<Vec<PlanInviteModel>>, AppError> {
    Ok(Json(
        invitation::list_plan_invites(&state.db, user_id, plan_id).await?,
    ))
}

async fn change_role(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams((plan_id, target_user_id)): PathParams<(i64, i64)>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> Result<Json<RoleChange>, AppError> {
    Ok(Json(
        plan::change_member_role(&state.db, user_id, plan_id, target_user_id, body.role).await?,
    ))
}

async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams((plan_id, target_user_id)): PathParams<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    plan::remove_member(&state.db, user_id, plan_id, target_user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_limits(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
) -> Result<Json<Vec<PlanCategoryLimitModel>>, AppError> {
    Ok(Json(
        category_limit::list_category_limits(&state.db, user_id, plan_id).await?,
    ))
}

async fn set_limit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
    JsonBody(body): JsonBody<LimitRequest>,
) -> Result<Json<PlanCategoryLimitModel>, AppError> {
    Ok(Json(
        category_limit::set_category_limit(
            &state.db,
            user_id,
            plan_id,
            &body.category,
            body.limit_amount,
        )
        .await?,
    ))
}

async fn remove_limit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams((plan_id, category)): PathParams<(i64, String)>,
) -> Result<StatusCode, AppError> {
    category_limit::remove_category_limit(&state.db, user_id, plan_id, &category).await?;
    Ok(StatusCode::NO_CONTENT)
}
