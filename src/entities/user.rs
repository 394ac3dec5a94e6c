//! User entity - The user directory consulted by the plan subsystem.
//!
//! Authentication lives outside this service; this table only records who exists,
//! how to reach them by e-mail, and profile flags that affect shared plans.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lower-cased e-mail address, unique across the directory
    #[sea_orm(unique)]
    pub email: String,
    /// Name shown to other plan members
    pub display_name: String,
    /// When true, family expenses this user adds start out pending approval
    pub requires_approval: bool,
    /// When the user was registered
    pub created_at: DateTimeUtc,
}

/// `User` is referenced by memberships; the reverse side is not navigated.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
