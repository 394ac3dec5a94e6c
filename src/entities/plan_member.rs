//! Plan member entity - The (plan, user, role) authorization fact.
//!
//! The composite primary key makes a second membership for the same user on the same
//! plan impossible at the storage level.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Privilege level of a member within a plan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PlanRole {
    /// Full control over the plan
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Can add expenses and invite others
    #[sea_orm(string_value = "editor")]
    Editor,
    /// Read-only access
    #[sea_orm(string_value = "viewer")]
    Viewer,
}

impl PlanRole {
    /// Whether the role may be handed out through an invitation.
    #[must_use]
    pub const fn is_invitable(self) -> bool {
        matches!(self, Self::Editor | Self::Viewer)
    }

    /// Lower-case name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for PlanRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan member database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_members")]
pub struct Model {
    /// Plan the membership belongs to (composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub plan_id: i64,
    /// Member user (composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Role of the user in this plan
    pub role: PlanRole,
    /// When the user joined the plan
    pub joined_at: DateTimeUtc,
}

/// Defines relationships between `PlanMember` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one plan
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
    /// Each membership belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
