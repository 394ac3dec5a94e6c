//! Category limits - per-category spending caps inside a plan.

use crate::{
    core::membership::{self, ADMIN_ONLY, ANY_ROLE},
    entities::{PlanCategoryLimit, plan_category_limit},
    errors::{Error, Result, is_unique_violation},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Sets (or replaces) the limit for a category. Admin only.
pub async fn set_category_limit(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    category: &str,
    limit_amount: f64,
) -> Result<plan_category_limit::Model> {
    let category = category.trim();
    if category.is_empty() {
        return Err(Error::validation("Category cannot be empty"));
    }
    if !limit_amount.is_finite() || limit_amount < 0.0 {
        return Err(Error::InvalidAmount {
            amount: limit_amount,
        });
    }

    membership::require_role(db, requester_id, plan_id, ADMIN_ONLY).await?;

    let existing = find_limit(db, plan_id, category).await?;
    let now = chrono::Utc::now();
    let saved = match existing {
        Some(limit) => {
            let mut active: plan_category_limit::ActiveModel = limit.into();
            active.limit_amount = Set(limit_amount);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => insert_limit(db, plan_id, category, limit_amount).await?,
    };

    info!(
        "Plan {} limit for '{}' set to {:.2}",
        plan_id, saved.category, saved.limit_amount
    );
    Ok(saved)
}

/// Inserts a new limit row. A concurrent insert for the same category loses on the
/// unique index and is reported as [`Error::CategoryLimitExists`].
async fn insert_limit(
    db: &DatabaseConnection,
    plan_id: i64,
    category: &str,
    limit_amount: f64,
) -> Result<plan_category_limit::Model> {
    plan_category_limit::ActiveModel {
        plan_id: Set(plan_id),
        category: Set(category.to_string()),
        limit_amount: Set(limit_amount),
        updated_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::CategoryLimitExists {
                plan_id,
                category: category.to_string(),
            }
        } else {
            Error::from(e)
        }
    })
}

async fn find_limit(
    db: &DatabaseConnection,
    plan_id: i64,
    category: &str,
) -> Result<Option<plan_category_limit::Model>> {
    PlanCategoryLimit::find()
        .filter(plan_category_limit::Column::PlanId.eq(plan_id))
        .filter(plan_category_limit::Column::Category.eq(category))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a plan's category limits alphabetically. Any member may call this.
pub async fn list_category_limits(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
) -> Result<Vec<plan_category_limit::Model>> {
    membership::require_role(db, requester_id, plan_id, ANY_ROLE).await?;

    PlanCategoryLimit::find()
        .filter(plan_category_limit::Column::PlanId.eq(plan_id))
        .order_by_asc(plan_category_limit::Column::Category)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Removes the limit for a category. Admin only.
pub async fn remove_category_limit(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    category: &str,
) -> Result<()> {
    membership::require_role(db, requester_id, plan_id, ADMIN_ONLY).await?;

    let limit = find_limit(db, plan_id, category.trim())
        .await?
        .ok_or_else(|| Error::CategoryLimitNotFound {
            category: category.to_string(),
        })?;
    limit.delete(db).await?;
    Ok(())
}
