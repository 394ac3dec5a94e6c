//! Invitation workflow - offering plan membership to registered users.
//!
//! An invite is created `pending` and ends `accepted`, `rejected` or `expired`. Answered
//! invites are kept with their terminal status and response time. Acceptance creates
//! the membership and closes the invite in one transaction.
//!
//! Every transition notifies the other party: the invitee when an invite arrives, the
//! inviter when it is answered.

use crate::{
    core::{
        membership::{self, CONTRIBUTORS},
        notification::{self, EntityRef, NewNotification},
        plan::plan_name_or_default,
        user,
    },
    entities::{
        InviteStatus, NotificationKind, Plan, PlanInvite, PlanRole, User, plan_invite, plan_member,
        user as user_entity,
    },
    errors::{Error, Result, is_unique_violation},
};
use chrono::{Duration, Utc};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// A pending invite as shown to its invitee.
#[derive(Debug, Clone, Serialize)]
pub struct PendingInvite {
    /// The invite row
    #[serde(flatten)]
    pub invite: plan_invite::Model,
    /// Name of the plan the invite is for
    pub plan_name: String,
    /// Display name of whoever sent it
    pub inviter_name: String,
}

async fn require_invite<C>(db: &C, invite_id: i64) -> Result<plan_invite::Model>
where
    C: ConnectionTrait,
{
    PlanInvite::find_by_id(invite_id)
        .one(db)
        .await?
        .ok_or(Error::InviteNotFound { invite_id })
}

/// Marks pending invites for (plan, invitee) whose expiry has passed as `expired`.
async fn expire_stale_invites(
    db: &DatabaseConnection,
    plan_id: i64,
    invitee_user_id: i64,
    now: DateTimeUtc,
) -> Result<u64> {
    let result = PlanInvite::update_many()
        .col_expr(
            plan_invite::Column::Status,
            Expr::value(InviteStatus::Expired),
        )
        .filter(plan_invite::Column::PlanId.eq(plan_id))
        .filter(plan_invite::Column::InviteeUserId.eq(invitee_user_id))
        .filter(plan_invite::Column::Status.eq(InviteStatus::Pending))
        .filter(plan_invite::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        debug!(
            "Expired {} stale invite(s) for user {} on plan {}",
            result.rows_affected, invitee_user_id, plan_id
        );
    }
    Ok(result.rows_affected)
}

/// Moves a pending invite to `status`. Only a row still `pending` is touched; if another
/// request got there first the invite's current status comes back as
/// [`Error::AlreadyResponded`].
async fn transition_pending<C>(
    db: &C,
    invite_id: i64,
    status: InviteStatus,
    responded_at: Option<DateTimeUtc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = PlanInvite::update_many()
        .col_expr(plan_invite::Column::Status, Expr::value(status))
        .filter(plan_invite::Column::Id.eq(invite_id))
        .filter(plan_invite::Column::Status.eq(InviteStatus::Pending));
    if let Some(at) = responded_at {
        update = update.col_expr(plan_invite::Column::RespondedAt, Expr::value(at));
    }

    if update.exec(db).await?.rows_affected == 0 {
        let current = require_invite(db, invite_id).await?;
        return Err(Error::AlreadyResponded {
            invite_id,
            status: current.status,
        });
    }
    Ok(())
}

/// Invites a registered user to a plan with the `editor` or `viewer` role.
///
/// The inviter must be an admin or editor. Pending invites for the same person whose
/// expiry has passed are closed first, so they do not block a fresh one.
pub async fn create_invite(
    db: &DatabaseConnection,
    inviter_id: i64,
    plan_id: i64,
    invitee_email: &str,
    role: PlanRole,
    ttl: Option<Duration>,
) -> Result<plan_invite::Model> {
    membership::require_role(db, inviter_id, plan_id, CONTRIBUTORS).await?;

    if !role.is_invitable() {
        return Err(Error::InvalidRole { role });
    }

    let email = user::normalize_email(invitee_email);
    if email.is_empty() {
        return Err(Error::validation("Invitee email cannot be empty"));
    }

    let invitee = user::find_user_by_email(db, &email)
        .await?
        .ok_or_else(|| Error::UserNotRegistered {
            email: email.clone(),
        })?;

    if membership::get_membership(db, invitee.id, plan_id)
        .await?
        .is_some()
    {
        return Err(Error::AlreadyMember {
            plan_id,
            user_id: invitee.id,
        });
    }

    let now = Utc::now();
    expire_stale_invites(db, plan_id, invitee.id, now).await?;

    let already_pending = PlanInvite::find()
        .filter(plan_invite::Column::PlanId.eq(plan_id))
        .filter(plan_invite::Column::InviteeUserId.eq(invitee.id))
        .filter(plan_invite::Column::Status.eq(InviteStatus::Pending))
        .one(db)
        .await?;
    if already_pending.is_some() {
        return Err(Error::InviteAlreadyPending { plan_id, email });
    }

    let invite = plan_invite::ActiveModel {
        plan_id: Set(plan_id),
        invitee_user_id: Set(invitee.id),
        invitee_email: Set(email.clone()),
        inviter_user_id: Set(inviter_id),
        role: Set(role),
        status: Set(InviteStatus::Pending),
        created_at: Set(now),
        expires_at: Set(ttl.map(|ttl| now + ttl)),
        responded_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::InviteAlreadyPending {
                plan_id,
                email: email.clone(),
            }
        } else {
            Error::from(e)
        }
    })?;

    info!(
        "User {} invited {} to plan {} as {}",
        inviter_id, invite.invitee_email, plan_id, role
    );

    let plan_name = plan_name_or_default(db, plan_id).await;
    let inviter_name = user::display_name_or_default(db, inviter_id).await;
    notification::send(
        db,
        NewNotification::new(
            invitee.id,
            NotificationKind::InviteReceived,
            format!("{inviter_name} invited you to join \"{plan_name}\" as {role}"),
        )
        .with_actor(inviter_id)
        .with_entity(EntityRef::invite(invite.id))
        .with_link("/invites"),
    )
    .await;

    Ok(invite)
}

/// Checks shared by accept and reject: the responder must be the invitee, and the
/// invite must still be pending and unexpired. An invite found past its expiry is
/// marked `expired` before the error is returned.
async fn ensure_respondable(
    db: &DatabaseConnection,
    invite: &plan_invite::Model,
    user_id: i64,
) -> Result<()> {
    if invite.invitee_user_id != user_id {
        return Err(Error::NotInvitee {
            invite_id: invite.id,
        });
    }
    if invite.status != InviteStatus::Pending {
        return Err(Error::AlreadyResponded {
            invite_id: invite.id,
            status: invite.status,
        });
    }
    if invite.is_expired_at(Utc::now()) {
        transition_pending(db, invite.id, InviteStatus::Expired, None).await?;
        return Err(Error::InviteExpired {
            invite_id: invite.id,
        });
    }
    Ok(())
}

/// Accepts an invite, making the invitee a member with the invite's role.
///
/// If the invitee already belongs to the plan the stale invite is deleted and
/// [`Error::AlreadyMember`] is returned.
pub async fn accept_invite(
    db: &DatabaseConnection,
    invite_id: i64,
    user_id: i64,
) -> Result<plan_member::Model> {
    let invite = require_invite(db, invite_id).await?;
    ensure_respondable(db, &invite, user_id).await?;

    if membership::get_membership(db, user_id, invite.plan_id)
        .await?
        .is_some()
    {
        let plan_id = invite.plan_id;
        invite.delete(db).await?;
        info!(
            "Deleted stale invite {} for user {} already on plan {}",
            invite_id, user_id, plan_id
        );
        return Err(Error::AlreadyMember { plan_id, user_id });
    }

    let txn = db.begin().await?;
    transition_pending(&txn, invite_id, InviteStatus::Accepted, Some(Utc::now())).await?;
    let member = membership::add_member(&txn, invite.plan_id, user_id, invite.role).await?;
    txn.commit().await?;

    info!(
        "User {} accepted invite {} and joined plan {} as {}",
        user_id, invite_id, invite.plan_id, invite.role
    );

    notify_inviter(db, &invite, NotificationKind::InviteAccepted, "accepted").await;
    Ok(member)
}

/// Rejects an invite. No membership is created.
pub async fn reject_invite(
    db: &DatabaseConnection,
    invite_id: i64,
    user_id: i64,
) -> Result<plan_invite::Model> {
    let invite = require_invite(db, invite_id).await?;
    ensure_respondable(db, &invite, user_id).await?;

    let now = Utc::now();
    transition_pending(db, invite_id, InviteStatus::Rejected, Some(now)).await?;
    let rejected = plan_invite::Model {
        status: InviteStatus::Rejected,
        responded_at: Some(now),
        ..invite
    };

    info!("User {} rejected invite {}", user_id, invite_id);
    notify_inviter(db, &rejected, NotificationKind::InviteRejected, "declined").await;
    Ok(rejected)
}

async fn notify_inviter(
    db: &DatabaseConnection,
    invite: &plan_invite::Model,
    kind: NotificationKind,
    verb: &str,
) {
    let plan_name = plan_name_or_default(db, invite.plan_id).await;
    let invitee_name = user::display_name_or_default(db, invite.invitee_user_id).await;

    notification::send(
        db,
        NewNotification::new(
            invite.inviter_user_id,
            kind,
            format!("{invitee_name} {verb} your invite to \"{plan_name}\""),
        )
        .with_actor(invite.invitee_user_id)
        .with_entity(EntityRef::invite(invite.id))
        .with_link(format!("/plans/{}", invite.plan_id)),
    )
    .await;
}

fn unexpired(now: DateTimeUtc) -> Condition {
    Condition::any()
        .add(plan_invite::Column::ExpiresAt.is_null())
        .add(plan_invite::Column::ExpiresAt.gt(now))
}

/// Lists the user's pending, unexpired invites, newest first.
pub async fn list_pending(db: &DatabaseConnection, user_id: i64) -> Result<Vec<PendingInvite>> {
    let rows = PlanInvite::find()
        .filter(plan_invite::Column::InviteeUserId.eq(user_id))
        .filter(plan_invite::Column::Status.eq(InviteStatus::Pending))
        .filter(unexpired(Utc::now()))
        .order_by_desc(plan_invite::Column::CreatedAt)
        .order_by_desc(plan_invite::Column::Id)
        .find_also_related(Plan)
        .all(db)
        .await?;

    let inviter_ids: Vec<i64> = rows.iter().map(|(i, _)| i.inviter_user_id).collect();
    let inviters: HashMap<i64, String> = User::find()
        .filter(user_entity::Column::Id.is_in(inviter_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|(invite, plan)| {
            let plan = plan?;
            let inviter_name = inviters
                .get(&invite.inviter_user_id)
                .cloned()
                .unwrap_or_else(|| format!("User {}", invite.inviter_user_id));
            Some(PendingInvite {
                invite,
                plan_name: plan.name,
                inviter_name,
            })
        })
        .collect())
}

/// Lists a plan's pending invites, newest first. Admins and editors only.
pub async fn list_plan_invites(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
) -> Result<Vec<plan_invite::Model>> {
    membership::require_role(db, requester_id, plan_id, CONTRIBUTORS).await?;

    PlanInvite::find()
        .filter(plan_invite::Column::PlanId.eq(plan_id))
        .filter(plan_invite::Column::Status.eq(InviteStatus::Pending))
        .filter(unexpired(Utc::now()))
        .order_by_desc(plan_invite::Column::CreatedAt)
        .order_by_desc(plan_invite::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
