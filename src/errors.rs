//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Each variant maps onto one
//! [`ErrorKind`], which is what the HTTP layer turns into a status code.

use crate::entities::{ExpenseStatus, InviteStatus, PlanRole};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an [`Error`], used for status mapping and pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No verified user id was supplied
    NotAuthenticated,
    /// Requester has no membership on the target plan
    NotMember,
    /// Requester's role is not allowed to perform the action
    InsufficientPrivilege,
    /// Referenced entity does not exist
    NotFound,
    /// A uniqueness rule would be violated
    Conflict,
    /// A structural guarantee would be broken
    InvariantViolation,
    /// Malformed input
    Validation,
    /// Storage or infrastructure failure
    Unexpected,
}

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Role '{role}' cannot be used here")]
    InvalidRole { role: PlanRole },

    #[error("No fields provided to update")]
    NoFieldsProvided,

    #[error("User {user_id} is not a member of plan {plan_id}")]
    NotMember { user_id: i64, plan_id: i64 },

    #[error("Role '{role}' is not allowed to perform this action")]
    InsufficientPrivilege { role: PlanRole },

    #[error("Invite {invite_id} is addressed to another user")]
    NotInvitee { invite_id: i64 },

    #[error("User {user_id} not found")]
    UserNotFound { user_id: i64 },

    #[error("No registered user with email '{email}'")]
    UserNotRegistered { email: String },

    #[error("Plan {plan_id} not found")]
    PlanNotFound { plan_id: i64 },

    #[error("User {user_id} is not a member of plan {plan_id}")]
    MemberNotFound { plan_id: i64, user_id: i64 },

    #[error("Invite {invite_id} not found")]
    InviteNotFound { invite_id: i64 },

    #[error("Expense {expense_id} not found")]
    ExpenseNotFound { expense_id: i64 },

    #[error("Notification {notification_id} not found")]
    NotificationNotFound { notification_id: i64 },

    #[error("No limit set for category '{category}'")]
    CategoryLimitNotFound { category: String },

    #[error("Email '{email}' is already registered")]
    EmailTaken { email: String },

    #[error("User {user_id} is already a member of plan {plan_id}")]
    AlreadyMember { plan_id: i64, user_id: i64 },

    #[error("An invite for '{email}' is already pending on plan {plan_id}")]
    InviteAlreadyPending { plan_id: i64, email: String },

    #[error("Invite {invite_id} was already {status}")]
    AlreadyResponded { invite_id: i64, status: InviteStatus },

    #[error("A limit for category '{category}' already exists on plan {plan_id}")]
    CategoryLimitExists { plan_id: i64, category: String },

    #[error("Invite {invite_id} has expired")]
    InviteExpired { invite_id: i64 },

    #[error("Expense {expense_id} was already {status}")]
    ExpenseAlreadyResolved {
        expense_id: i64,
        status: ExpenseStatus,
    },

    #[error("The plan owner's role cannot be changed")]
    OwnerRoleImmutable,

    #[error("The plan owner cannot be removed")]
    CannotRemoveOwner,

    #[error("The plan owner cannot leave; delete the plan instead")]
    OwnerCannotLeave,

    #[error("A plan must keep at least one admin")]
    LastAdminProtected,

    #[error("Members cannot change their own role")]
    SelfRoleChange,

    #[error("Use the leave-plan path to remove yourself")]
    SelfRemoval,
}

impl Error {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::NotMember { .. } => ErrorKind::NotMember,
            Self::InsufficientPrivilege { .. } | Self::NotInvitee { .. } => {
                ErrorKind::InsufficientPrivilege
            }
            Self::UserNotFound { .. }
            | Self::PlanNotFound { .. }
            | Self::MemberNotFound { .. }
            | Self::InviteNotFound { .. }
            | Self::ExpenseNotFound { .. }
            | Self::NotificationNotFound { .. }
            | Self::CategoryLimitNotFound { .. } => ErrorKind::NotFound,
            Self::EmailTaken { .. }
            | Self::AlreadyMember { .. }
            | Self::InviteAlreadyPending { .. }
            | Self::AlreadyResponded { .. }
            | Self::CategoryLimitExists { .. }
            | Self::InviteExpired { .. }
            | Self::ExpenseAlreadyResolved { .. } => ErrorKind::Conflict,
            Self::OwnerRoleImmutable
            | Self::CannotRemoveOwner
            | Self::OwnerCannotLeave
            | Self::LastAdminProtected
            | Self::SelfRoleChange
            | Self::SelfRemoval => ErrorKind::InvariantViolation,
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidRole { .. }
            | Self::NoFieldsProvided
            | Self::UserNotRegistered { .. } => ErrorKind::Validation,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => ErrorKind::Unexpected,
        }
    }

    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Returns true when the database rejected a write because of a unique constraint.
#[must_use]
pub fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_errors_share_a_kind() {
        for err in [
            Error::OwnerRoleImmutable,
            Error::CannotRemoveOwner,
            Error::LastAdminProtected,
            Error::SelfRoleChange,
        ] {
            assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        }
    }

    #[test]
    fn test_conflict_and_not_found_kinds() {
        assert_eq!(
            Error::AlreadyMember {
                plan_id: 1,
                user_id: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::InviteAlreadyPending {
                plan_id: 1,
                email: "b@x.com".to_string()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(Error::PlanNotFound { plan_id: 9 }.kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).kind(),
            ErrorKind::Unexpected
        );
    }

    #[test]
    fn test_membership_and_privilege_are_distinct() {
        let not_member = Error::NotMember {
            user_id: 1,
            plan_id: 2,
        };
        let privilege = Error::InsufficientPrivilege {
            role: PlanRole::Viewer,
        };
        assert_ne!(not_member.kind(), privilege.kind());
        assert_eq!(privilege.to_string(), "Role 'viewer' is not allowed to perform this action");
    }
}
