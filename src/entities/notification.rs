//! Notification entity - One event delivered to one recipient's feed.
//!
//! Rows are written best-effort by the workflows in `core` and are only ever changed by
//! the recipient marking them read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of event a notification describes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "plan_updated")]
    PlanUpdated,
    #[sea_orm(string_value = "plan_deleted")]
    PlanDeleted,
    #[sea_orm(string_value = "member_role_changed")]
    MemberRoleChanged,
    #[sea_orm(string_value = "member_removed")]
    MemberRemoved,
    #[sea_orm(string_value = "member_left")]
    MemberLeft,
    #[sea_orm(string_value = "invite_received")]
    InviteReceived,
    #[sea_orm(string_value = "invite_accepted")]
    InviteAccepted,
    #[sea_orm(string_value = "invite_rejected")]
    InviteRejected,
    #[sea_orm(string_value = "expense_added")]
    ExpenseAdded,
    #[sea_orm(string_value = "expense_updated")]
    ExpenseUpdated,
    #[sea_orm(string_value = "expense_approved")]
    ExpenseApproved,
    #[sea_orm(string_value = "expense_rejected")]
    ExpenseRejected,
    #[sea_orm(string_value = "expense_deleted")]
    ExpenseDeleted,
}

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the notification
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User whose feed this belongs to
    pub recipient_user_id: i64,
    /// Event kind
    pub kind: NotificationKind,
    /// Human-readable text
    pub message: String,
    /// Whether the recipient has seen it
    pub is_read: bool,
    /// Optional client-side link
    pub link: Option<String>,
    /// Id of the related entity, if any
    pub entity_id: Option<i64>,
    /// Type of the related entity (`"plan"`, `"invite"`, `"expense"`)
    pub entity_type: Option<String>,
    /// User who caused the event
    pub actor_user_id: Option<i64>,
    /// When the notification was stored
    pub created_at: DateTimeUtc,
}

/// `Notification` rows only hold non-owning back-references
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
