//! Shared test utilities for `plan-buddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test users, plans and memberships with sensible defaults.

use crate::{
    core::{expense::NewExpense, membership, plan, user},
    entities::{PlanMember, PlanRole, plan as plan_entity, plan_member, user as user_entity},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Registers a test user.
///
/// # Defaults
/// * `display_name`: the part of the e-mail before `@`
/// * `requires_approval`: false
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<user_entity::Model> {
    let name = email.split('@').next().unwrap_or(email);
    user::register_user(db, email, name, false).await
}

/// Plan attributes with only a name set.
#[must_use]
pub fn test_plan(name: &str) -> plan::NewPlan {
    plan::NewPlan {
        name: name.to_string(),
        ..Default::default()
    }
}

/// An expense in the "Food" category dated 2026-06-15.
#[must_use]
pub fn test_expense(plan_id: i64, amount: f64) -> NewExpense {
    NewExpense {
        plan_id,
        category: "Food".to_string(),
        amount,
        description: "Groceries".to_string(),
        expense_date: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap_or_default(),
        notes: None,
    }
}

/// Sets up a complete test environment with an owner and their plan.
/// Returns (db, owner, plan) for common test scenarios.
pub async fn setup_with_plan() -> Result<(
    DatabaseConnection,
    user_entity::Model,
    plan_entity::Model,
)> {
    let db = setup_test_db().await?;
    let owner = create_test_user(&db, "owner@x.com").await?;
    let plan = plan::create_plan(&db, owner.id, test_plan("Test Plan")).await?;
    Ok((db, owner, plan))
}

/// Adds a membership directly, skipping the invitation workflow.
pub async fn add_test_member(
    db: &DatabaseConnection,
    plan_id: i64,
    user_id: i64,
    role: PlanRole,
) -> Result<plan_member::Model> {
    membership::add_member(db, plan_id, user_id, role).await
}

/// Overwrites a membership's role without any of the registry's checks.
pub async fn set_test_role(
    db: &DatabaseConnection,
    plan_id: i64,
    user_id: i64,
    role: PlanRole,
) -> Result<plan_member::Model> {
    let existing = PlanMember::find_by_id((plan_id, user_id))
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { plan_id, user_id })?;
    let mut active: plan_member::ActiveModel = existing.into();
    active.role = Set(role);
    active.update(db).await.map_err(Into::into)
}
