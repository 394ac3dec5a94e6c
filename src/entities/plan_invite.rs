//! Plan invite entity - An offer of membership to a registered user.
//!
//! At most one `pending` invite may exist per (plan, invitee); a partial unique index
//! created alongside the table enforces it. Answered invites keep their terminal status
//! and `responded_at` as an audit trail until the plan is deleted.

use super::plan_member::PlanRole;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an invite
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    /// Waiting for the invitee to respond
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Invitee accepted and became a member
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Invitee declined
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Lapsed before the invitee responded
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        })
    }
}

/// Plan invite database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_invites")]
pub struct Model {
    /// Unique identifier for the invite
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan the invitee is offered a seat on
    pub plan_id: i64,
    /// Registered user the invite resolves to
    pub invitee_user_id: i64,
    /// Lower-cased e-mail the inviter typed
    pub invitee_email: String,
    /// Member who sent the invite
    pub inviter_user_id: i64,
    /// Role granted on acceptance; never `admin`
    pub role: PlanRole,
    /// Current lifecycle state
    pub status: InviteStatus,
    /// When the invite was created
    pub created_at: DateTimeUtc,
    /// When the invite lapses, if it does
    pub expires_at: Option<DateTimeUtc>,
    /// When the invitee accepted or rejected
    pub responded_at: Option<DateTimeUtc>,
}

impl Model {
    /// Whether the invite's expiry has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTimeUtc) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Defines relationships between `PlanInvite` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each invite belongs to one plan
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
