//! `/plan-expenses` routes.

use crate::{
    api::{
        AppState,
        auth::AuthUser,
        error::AppError,
        extract::{JsonBody, PathParams, QueryParams},
    },
    core::expense::{self, ExpenseChanges, NewExpense},
    entities::PlanExpenseModel,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpenseFilter {
    user_id: Option<i64>,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/plan-expenses", post(create))
        .route("/plan-expenses/plan/{plan_id}", get(list_for_plan))
        .route(
            "/plan-expenses/{expense_id}",
            get(get_one).put(update).delete(remove),
        )
        .route("/plan-expenses/approve/{expense_id}", put(approve))
        .route("/plan-expenses/reject/{expense_id}", put(reject))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(body): JsonBody<NewExpense>,
) -> Result<(StatusCode, Json<PlanExpenseModel>), AppError> {
    let expense = expense::add_expense(&state.db, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn list_for_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(plan_id): PathParams<i64>,
    QueryParams(filter): QueryParams<ExpenseFilter>,
) -> Result<Json<Vec<PlanExpenseModel>>, AppError> {
    let expenses = match filter.user_id {
        Some(adder) => expense::list_by_plan_and_user(&state.db, user_id, plan_id, adder).await?,
        None => expense::list_by_plan(&state.db, user_id, plan_id).await?,
    };
    Ok(Json(expenses))
}

async fn get_one(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(expense_id): PathParams<i64>,
) -> Result<Json<PlanExpenseModel>, AppError> {
    Ok(Json(expense::get_expense(&state.db, user_id, expense_id).await?))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(expense_id): PathParams<i64>,
    JsonBody(body): JsonBody<ExpenseChanges>,
) -> Result<Json<PlanExpenseModel>, AppError> {
    Ok(Json(
        expense::update_expense(&state.db, user_id, expense_id, body).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(expense_id): PathParams<i64>,
) -> Result<StatusCode, AppError> {
    expense::delete_expense(&state.db, user_id, expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(expense_id): PathParams<i64>,
) -> Result<Json<PlanExpenseModel>, AppError> {
    Ok(Json(
        expense::approve_expense(&state.db, user_id, expense_id).await?,
    ))
}

async fn reject(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParams(expense_id): PathParams<i64>,
) -> Result<Json<PlanExpenseModel>, AppError> {
    Ok(Json(
        expense::reject_expense(&state.db, user_id, expense_id).await?,
    ))
}
