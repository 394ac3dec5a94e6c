//! Plan category limit entity - A per-category spending cap inside a plan.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plan category limit database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_category_limits")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan the limit applies to
    pub plan_id: i64,
    /// Category name, unique within the plan
    pub category: String,
    /// Maximum approved spending for the category
    pub limit_amount: f64,
    /// When the limit was last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `PlanCategoryLimit` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each limit belongs to one plan
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
