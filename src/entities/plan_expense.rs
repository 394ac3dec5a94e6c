//! Plan expense entity - A family expense recorded against a shared plan.
//!
//! Expenses move from `pending` to either `approved` or `rejected`; see
//! `core::expense` for who may drive those transitions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Approval state of a family expense
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    /// Awaiting an admin decision
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Counted toward plan spending
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined by an admin
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// Plan expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan the expense is charged to
    pub plan_id: i64,
    /// Member who recorded the expense
    pub added_by_user_id: i64,
    /// Spending category name (e.g., "Food")
    pub category: String,
    /// Positive amount in the plan's currency
    pub amount: f64,
    /// Short description
    pub description: String,
    /// Optional free-form notes
    pub notes: Option<String>,
    /// Day the money was spent
    pub expense_date: Date,
    /// Approval state
    pub status: ExpenseStatus,
    /// Admin who approved or rejected the expense
    pub approved_by_user_id: Option<i64>,
    /// When the expense was recorded
    pub created_at: DateTimeUtc,
    /// When the expense was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `PlanExpense` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one plan
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
