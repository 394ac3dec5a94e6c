//! Plan report business logic.
//!
//! Summarizes where a plan's money went: approved and pending totals, spending per
//! category measured against the category limits, and what is left of the overall
//! budget. Only approved expenses count as spent.

use crate::{
    core::{membership, plan::require_plan},
    entities::{ExpenseStatus, PlanCategoryLimit, PlanExpense, plan_category_limit, plan_expense},
    errors::Result,
};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// Spending in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    /// Category name
    pub category: String,
    /// Sum of approved expenses in the category
    pub spent: f64,
    /// Configured limit, if any
    pub limit: Option<f64>,
    /// `limit - spent`; negative when over the limit
    pub remaining: Option<f64>,
    /// Share of the limit used, as a percentage
    pub percent_used: Option<f64>,
}

/// A plan's spending summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    /// Plan being summarized
    pub plan_id: i64,
    /// Plan currency
    pub currency: String,
    /// Overall budget, if the plan has one
    pub total_budget: Option<f64>,
    /// Sum of approved expenses
    pub total_approved: f64,
    /// Sum of expenses awaiting approval
    pub total_pending: f64,
    /// `total_budget - total_approved`, when there is a budget
    pub remaining_budget: Option<f64>,
    /// Number of expenses of any status
    pub expense_count: usize,
    /// Per-category breakdown, alphabetical
    pub categories: Vec<CategorySpending>,
}

/// Percentage of `limit` consumed by `spent`. A zero limit reports 0.
#[must_use]
pub fn percent_used(spent: f64, limit: f64) -> f64 {
    if limit == 0.0 {
        return 0.0;
    }
    (spent / limit) * 100.0
}

/// Builds the spending summary of a plan. Any member may call this.
pub async fn summarize_plan(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
) -> Result<PlanSummary> {
    membership::require_role(db, requester_id, plan_id, membership::ANY_ROLE).await?;
    let plan = require_plan(db, plan_id).await?;

    let expenses = PlanExpense::find()
        .filter(plan_expense::Column::PlanId.eq(plan_id))
        .all(db)
        .await?;
    let limits = PlanCategoryLimit::find()
        .filter(plan_category_limit::Column::PlanId.eq(plan_id))
        .all(db)
        .await?;

    let mut total_approved = 0.0;
    let mut total_pending = 0.0;
    let mut spent_by_category: BTreeMap<String, f64> = BTreeMap::new();
    for expense in &expenses {
        match expense.status {
            ExpenseStatus::Approved => {
                total_approved += expense.amount;
                *spent_by_category
                    .entry(expense.category.clone())
                    .or_default() += expense.amount;
            }
            ExpenseStatus::Pending => total_pending += expense.amount,
            ExpenseStatus::Rejected => {}
        }
    }

    // Limited categories show up even before anything is spent in them
    let mut limit_by_category: BTreeMap<String, f64> = BTreeMap::new();
    for limit in limits {
        spent_by_category.entry(limit.category.clone()).or_default();
        limit_by_category.insert(limit.category, limit.limit_amount);
    }

    let categories = spent_by_category
        .into_iter()
        .map(|(category, spent)| {
            let limit = limit_by_category.get(&category).copied();
            CategorySpending {
                remaining: limit.map(|l| l - spent),
                percent_used: limit.map(|l| percent_used(spent, l)),
                category,
                spent,
                limit,
            }
        })
        .collect();

    Ok(PlanSummary {
        plan_id,
        currency: plan.currency,
        total_budget: plan.total_budget,
        total_approved,
        total_pending,
        remaining_budget: plan.total_budget.map(|b| b - total_approved),
        expense_count: expenses.len(),
        categories,
    })
}
