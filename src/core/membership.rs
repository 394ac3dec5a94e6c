//! Plan membership registry - who belongs to which plan, and with what role.
//!
//! [`require_role`] is the authorization gate every mutating operation in `core` calls
//! before touching anything. This module never dispatches notifications; the plan
//! lifecycle wrappers in `core::plan` do that.

use crate::{
    core::plan::require_plan,
    entities::{PlanMember, PlanRole, User, plan_member},
    errors::{Error, Result, is_unique_violation},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Every role; used by read paths open to all members.
pub const ANY_ROLE: &[PlanRole] = &[PlanRole::Admin, PlanRole::Editor, PlanRole::Viewer];
/// Roles allowed to add expenses and send invites.
pub const CONTRIBUTORS: &[PlanRole] = &[PlanRole::Admin, PlanRole::Editor];
/// Admin-only operations.
pub const ADMIN_ONLY: &[PlanRole] = &[PlanRole::Admin];

/// A membership joined with the member's directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberWithUser {
    /// The membership row
    #[serde(flatten)]
    pub membership: plan_member::Model,
    /// Member's e-mail
    pub email: String,
    /// Member's display name
    pub display_name: String,
}

/// Outcome of a role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleChange {
    /// Plan the change applies to
    pub plan_id: i64,
    /// Member whose role changed
    pub user_id: i64,
    /// Role before the change
    pub previous: PlanRole,
    /// Role after the change
    pub current: PlanRole,
}

/// Looks up the membership of a user on a plan.
pub async fn get_membership<C>(
    db: &C,
    user_id: i64,
    plan_id: i64,
) -> Result<Option<plan_member::Model>>
where
    C: ConnectionTrait,
{
    PlanMember::find_by_id((plan_id, user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Fetches the membership or explains why there is none: [`Error::PlanNotFound`] when
/// the plan does not exist, [`Error::NotMember`] otherwise.
async fn membership_or_error<C>(db: &C, user_id: i64, plan_id: i64) -> Result<plan_member::Model>
where
    C: ConnectionTrait,
{
    if let Some(membership) = get_membership(db, user_id, plan_id).await? {
        return Ok(membership);
    }
    require_plan(db, plan_id).await?;
    Err(Error::NotMember { user_id, plan_id })
}

/// Returns the user's role on the plan.
pub async fn get_role<C>(db: &C, user_id: i64, plan_id: i64) -> Result<PlanRole>
where
    C: ConnectionTrait,
{
    membership_or_error(db, user_id, plan_id)
        .await
        .map(|m| m.role)
}

/// Authorization gate: the user must be a member of the plan with one of `allowed`.
pub async fn require_role<C>(
    db: &C,
    user_id: i64,
    plan_id: i64,
    allowed: &[PlanRole],
) -> Result<plan_member::Model>
where
    C: ConnectionTrait,
{
    let membership = membership_or_error(db, user_id, plan_id).await?;
    if !allowed.contains(&membership.role) {
        debug!(
            "User {} with role {} denied on plan {}",
            user_id, membership.role, plan_id
        );
        return Err(Error::InsufficientPrivilege {
            role: membership.role,
        });
    }
    Ok(membership)
}

/// Inserts a membership row. A second row for the same (plan, user) is rejected by the
/// primary key and reported as [`Error::AlreadyMember`].
pub async fn add_member<C>(
    db: &C,
    plan_id: i64,
    user_id: i64,
    role: PlanRole,
) -> Result<plan_member::Model>
where
    C: ConnectionTrait,
{
    let membership = plan_member::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(user_id),
        role: Set(role),
        joined_at: Set(chrono::Utc::now()),
    };

    membership.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyMember { plan_id, user_id }
        } else {
            Error::from(e)
        }
    })
}

/// Number of admins currently on the plan.
pub async fn count_admins<C>(db: &C, plan_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    PlanMember::find()
        .filter(plan_member::Column::PlanId.eq(plan_id))
        .filter(plan_member::Column::Role.eq(PlanRole::Admin))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Lists the members of a plan with their directory details. Any member may call this.
pub async fn list_members(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
) -> Result<Vec<MemberWithUser>> {
    require_role(db, requester_id, plan_id, ANY_ROLE).await?;

    let rows = PlanMember::find()
        .filter(plan_member::Column::PlanId.eq(plan_id))
        .order_by_asc(plan_member::Column::JoinedAt)
        .find_also_related(User)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(membership, user)| match user {
            Some(user) => Some(MemberWithUser {
                membership,
                email: user.email,
                display_name: user.display_name,
            }),
            None => {
                warn!(
                    "Membership of plan {} references missing user {}",
                    membership.plan_id, membership.user_id
                );
                None
            }
        })
        .collect())
}

/// Changes another member's role. Admin only; the owner's role and the requester's own
/// role are immutable here.
pub async fn change_role(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    target_user_id: i64,
    new_role: PlanRole,
) -> Result<RoleChange> {
    require_role(db, requester_id, plan_id, ADMIN_ONLY).await?;

    if requester_id == target_user_id {
        return Err(Error::SelfRoleChange);
    }

    let plan = require_plan(db, plan_id).await?;
    if plan.owner_id == target_user_id {
        return Err(Error::OwnerRoleImmutable);
    }

    let target = get_membership(db, target_user_id, plan_id)
        .await?
        .ok_or(Error::MemberNotFound {
            plan_id,
            user_id: target_user_id,
        })?;

    let previous = target.role;
    if previous != new_role {
        let mut active: plan_member::ActiveModel = target.into();
        active.role = Set(new_role);
        active.update(db).await?;
        info!(
            "User {} changed role of user {} on plan {}: {} -> {}",
            requester_id, target_user_id, plan_id, previous, new_role
        );
    }

    Ok(RoleChange {
        plan_id,
        user_id: target_user_id,
        previous,
        current: new_role,
    })
}

/// Removes another member from the plan. Admin only.
///
/// Check order: owner, membership, last admin, self. The delete and an admin re-count
/// run in one transaction, which is rolled back if the plan would end up without an
/// admin.
pub async fn remove_member(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    target_user_id: i64,
) -> Result<plan_member::Model> {
    let txn = db.begin().await?;

    require_role(&txn, requester_id, plan_id, ADMIN_ONLY).await?;

    let plan = require_plan(&txn, plan_id).await?;
    if plan.owner_id == target_user_id {
        return Err(Error::CannotRemoveOwner);
    }

    let target = get_membership(&txn, target_user_id, plan_id)
        .await?
        .ok_or(Error::MemberNotFound {
            plan_id,
            user_id: target_user_id,
        })?;

    if target.role == PlanRole::Admin && count_admins(&txn, plan_id).await? <= 1 {
        return Err(Error::LastAdminProtected);
    }

    if requester_id == target_user_id {
        return Err(Error::SelfRemoval);
    }

    target.clone().delete(&txn).await?;

    if count_admins(&txn, plan_id).await? == 0 {
        return Err(Error::LastAdminProtected);
    }

    txn.commit().await?;
    info!(
        "User {} removed user {} from plan {}",
        requester_id, target_user_id, plan_id
    );
    Ok(target)
}

/// Removes the caller from a plan. The owner cannot leave, nor can the last admin.
pub async fn leave_plan(
    db: &DatabaseConnection,
    user_id: i64,
    plan_id: i64,
) -> Result<plan_member::Model> {
    let txn = db.begin().await?;

    let membership = require_role(&txn, user_id, plan_id, ANY_ROLE).await?;
    let plan = require_plan(&txn, plan_id).await?;
    if plan.owner_id == user_id {
        return Err(Error::OwnerCannotLeave);
    }

    if membership.role == PlanRole::Admin && count_admins(&txn, plan_id).await? <= 1 {
        return Err(Error::LastAdminProtected);
    }

    membership.clone().delete(&txn).await?;
    txn.commit().await?;
    info!("User {} left plan {}", user_id, plan_id);
    Ok(membership)
}
