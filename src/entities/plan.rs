//! Plan entity - A shared family budgeting container.
//!
//! A plan has exactly one owner, who is always an `admin` member. Everything else
//! attached to a plan (members, invites, expenses, category limits) is deleted with it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plan database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "family_plans")]
pub struct Model {
    /// Unique identifier for the plan
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Smith Family")
    pub name: String,
    /// User who created the plan
    pub owner_id: i64,
    /// Optional overall budget for the plan period
    pub total_budget: Option<f64>,
    /// Optional first day of the plan period
    pub start_date: Option<Date>,
    /// Optional last day of the plan period
    pub end_date: Option<Date>,
    /// ISO currency code
    pub currency: String,
    /// When the plan was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Plan and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each plan is owned by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    /// One plan has many members
    #[sea_orm(has_many = "super::plan_member::Entity")]
    Members,
    /// One plan has many invites
    #[sea_orm(has_many = "super::plan_invite::Entity")]
    Invites,
    /// One plan has many expenses
    #[sea_orm(has_many = "super::plan_expense::Entity")]
    Expenses,
    /// One plan has many category limits
    #[sea_orm(has_many = "super::plan_category_limit::Entity")]
    CategoryLimits,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::plan_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::plan_invite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invites.def()
    }
}

impl Related<super::plan_expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::plan_category_limit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CategoryLimits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
