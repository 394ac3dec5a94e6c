//! Family expense approval state machine.
//!
//! An expense starts `pending` or `approved` depending on who records it, and a pending
//! expense is resolved exactly once by an admin. Every mutation notifies all current
//! members of the plan, the actor included.

use crate::{
    core::{
        membership::{self, ADMIN_ONLY, ANY_ROLE, CONTRIBUTORS},
        notification::{self, EntityRef, NewNotification},
        user,
    },
    entities::{ExpenseStatus, NotificationKind, PlanExpense, PlanRole, plan_expense},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{info, instrument};

/// A family expense to record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    /// Plan the expense is charged to
    pub plan_id: i64,
    /// Spending category
    pub category: String,
    /// Positive amount
    pub amount: f64,
    /// Short description
    pub description: String,
    /// Day the money was spent
    pub expense_date: NaiveDate,
    /// Optional notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of an expense; only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseChanges {
    /// New category
    pub category: Option<String>,
    /// New amount
    pub amount: Option<f64>,
    /// New description
    pub description: Option<String>,
    /// New expense date
    pub expense_date: Option<NaiveDate>,
    /// New notes; blank clears them
    pub notes: Option<String>,
}

impl ExpenseChanges {
    /// True when the request carries no field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.amount.is_none()
            && self.description.is_none()
            && self.expense_date.is_none()
            && self.notes.is_none()
    }
}

fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

fn validate_text(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("Expense {field} cannot be empty")));
    }
    Ok(value.to_string())
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

async fn require_expense(db: &DatabaseConnection, expense_id: i64) -> Result<plan_expense::Model> {
    PlanExpense::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or(Error::ExpenseNotFound { expense_id })
}

/// The requester must be the one who recorded the expense or an admin of its plan.
async fn require_adder_or_admin(
    db: &DatabaseConnection,
    requester_id: i64,
    expense: &plan_expense::Model,
) -> Result<()> {
    let membership = membership::require_role(db, requester_id, expense.plan_id, ANY_ROLE).await?;
    if membership.role != PlanRole::Admin && expense.added_by_user_id != requester_id {
        return Err(Error::InsufficientPrivilege {
            role: membership.role,
        });
    }
    Ok(())
}

async fn notify_members(
    db: &DatabaseConnection,
    actor_id: i64,
    expense: &plan_expense::Model,
    kind: NotificationKind,
    verb: &str,
) {
    let actor = user::display_name_or_default(db, actor_id).await;

    notification::notify_plan_members(
        db,
        expense.plan_id,
        &NewNotification::new(
            0,
            kind,
            format!(
                "{actor} {verb} \"{}\" ({}: {:.2})",
                expense.description, expense.category, expense.amount
            ),
        )
        .with_actor(actor_id)
        .with_entity(EntityRef::expense(expense.id))
        .with_link(format!("/plans/{}/expenses", expense.plan_id)),
    )
    .await;
}

/// Records a family expense. Admins and editors only.
///
/// The expense starts `pending` when the adder's profile requires approval and the
/// adder is not an admin; otherwise it is `approved` straight away.
#[instrument(skip(db, new_expense), fields(plan_id = new_expense.plan_id))]
pub async fn add_expense(
    db: &DatabaseConnection,
    adder_id: i64,
    new_expense: NewExpense,
) -> Result<plan_expense::Model> {
    let amount = validate_amount(new_expense.amount)?;
    let category = validate_text(&new_expense.category, "category")?;
    let description = validate_text(&new_expense.description, "description")?;

    let membership =
        membership::require_role(db, adder_id, new_expense.plan_id, CONTRIBUTORS).await?;
    let adder = user::require_user(db, adder_id).await?;

    let status = if adder.requires_approval && membership.role != PlanRole::Admin {
        ExpenseStatus::Pending
    } else {
        ExpenseStatus::Approved
    };

    let now = Utc::now();
    let expense = plan_expense::ActiveModel {
        plan_id: Set(new_expense.plan_id),
        added_by_user_id: Set(adder_id),
        category: Set(category),
        amount: Set(amount),
        description: Set(description),
        notes: Set(clean_notes(new_expense.notes)),
        expense_date: Set(new_expense.expense_date),
        status: Set(status),
        approved_by_user_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "User {} added expense {} ({:.2}, {}) to plan {}",
        adder_id, expense.id, expense.amount, expense.status, expense.plan_id
    );
    notify_members(db, adder_id, &expense, NotificationKind::ExpenseAdded, "added").await;
    Ok(expense)
}

/// Edits an expense. The original adder or an admin only.
pub async fn update_expense(
    db: &DatabaseConnection,
    requester_id: i64,
    expense_id: i64,
    changes: ExpenseChanges,
) -> Result<plan_expense::Model> {
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided);
    }
    let amount = changes.amount.map(validate_amount).transpose()?;
    let category = changes
        .category
        .as_deref()
        .map(|c| validate_text(c, "category"))
        .transpose()?;
    let description = changes
        .description
        .as_deref()
        .map(|d| validate_text(d, "description"))
        .transpose()?;

    let expense = require_expense(db, expense_id).await?;
    require_adder_or_admin(db, requester_id, &expense).await?;

    let mut active: plan_expense::ActiveModel = expense.into();
    if let Some(amount) = amount {
        active.amount = Set(amount);
    }
    if let Some(category) = category {
        active.category = Set(category);
    }
    if let Some(description) = description {
        active.description = Set(description);
    }
    if let Some(date) = changes.expense_date {
        active.expense_date = Set(date);
    }
    if changes.notes.is_some() {
        active.notes = Set(clean_notes(changes.notes));
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    info!("User {} updated expense {}", requester_id, expense_id);
    notify_members(db, requester_id, &updated, NotificationKind::ExpenseUpdated, "updated").await;
    Ok(updated)
}

/// Moves a pending expense to `approved` or `rejected`. Admin only, and only once.
async fn resolve_expense(
    db: &DatabaseConnection,
    approver_id: i64,
    expense_id: i64,
    outcome: ExpenseStatus,
) -> Result<plan_expense::Model> {
    let expense = require_expense(db, expense_id).await?;
    membership::require_role(db, approver_id, expense.plan_id, ADMIN_ONLY).await?;

    if expense.status != ExpenseStatus::Pending {
        return Err(Error::ExpenseAlreadyResolved {
            expense_id,
            status: expense.status,
        });
    }

    // Only one resolution may land; a concurrent one finds no pending row.
    let now = Utc::now();
    let result = PlanExpense::update_many()
        .col_expr(plan_expense::Column::Status, Expr::value(outcome))
        .col_expr(
            plan_expense::Column::ApprovedByUserId,
            Expr::value(approver_id),
        )
        .col_expr(plan_expense::Column::UpdatedAt, Expr::value(now))
        .filter(plan_expense::Column::Id.eq(expense_id))
        .filter(plan_expense::Column::Status.eq(ExpenseStatus::Pending))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        let current = require_expense(db, expense_id).await?;
        return Err(Error::ExpenseAlreadyResolved {
            expense_id,
            status: current.status,
        });
    }
    let resolved = plan_expense::Model {
        status: outcome,
        approved_by_user_id: Some(approver_id),
        updated_at: now,
        ..expense
    };

    info!("User {} marked expense {} {}", approver_id, expense_id, outcome);
    let (kind, verb) = match outcome {
        ExpenseStatus::Rejected => (NotificationKind::ExpenseRejected, "rejected"),
        _ => (NotificationKind::ExpenseApproved, "approved"),
    };
    notify_members(db, approver_id, &resolved, kind, verb).await;
    Ok(resolved)
}

/// Approves a pending expense. Admin only.
pub async fn approve_expense(
    db: &DatabaseConnection,
    approver_id: i64,
    expense_id: i64,
) -> Result<plan_expense::Model> {
    resolve_expense(db, approver_id, expense_id, ExpenseStatus::Approved).await
}

/// Rejects a pending expense. Admin only.
pub async fn reject_expense(
    db: &DatabaseConnection,
    approver_id: i64,
    expense_id: i64,
) -> Result<plan_expense::Model> {
    resolve_expense(db, approver_id, expense_id, ExpenseStatus::Rejected).await
}

/// Deletes an expense. The original adder or an admin only.
pub async fn delete_expense(
    db: &DatabaseConnection,
    requester_id: i64,
    expense_id: i64,
) -> Result<()> {
    let expense = require_expense(db, expense_id).await?;
    require_adder_or_admin(db, requester_id, &expense).await?;

    PlanExpense::delete_by_id(expense_id).exec(db).await?;
    info!("User {} deleted expense {}", requester_id, expense_id);
    notify_members(db, requester_id, &expense, NotificationKind::ExpenseDeleted, "deleted").await;
    Ok(())
}

/// Fetches one expense. Any member of its plan may call this.
pub async fn get_expense(
    db: &DatabaseConnection,
    requester_id: i64,
    expense_id: i64,
) -> Result<plan_expense::Model> {
    let expense = require_expense(db, expense_id).await?;
    membership::require_role(db, requester_id, expense.plan_id, ANY_ROLE).await?;
    Ok(expense)
}

/// Lists a plan's expenses, most recent expense date first.
pub async fn list_by_plan(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
) -> Result<Vec<plan_expense::Model>> {
    membership::require_role(db, requester_id, plan_id, ANY_ROLE).await?;

    PlanExpense::find()
        .filter(plan_expense::Column::PlanId.eq(plan_id))
        .order_by_desc(plan_expense::Column::ExpenseDate)
        .order_by_desc(plan_expense::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the expenses one member recorded on a plan, most recent expense date first.
pub async fn list_by_plan_and_user(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    user_id: i64,
) -> Result<Vec<plan_expense::Model>> {
    membership::require_role(db, requester_id, plan_id, ANY_ROLE).await?;

    PlanExpense::find()
        .filter(plan_expense::Column::PlanId.eq(plan_id))
        .filter(plan_expense::Column::AddedByUserId.eq(user_id))
        .order_by_desc(plan_expense::Column::ExpenseDate)
        .order_by_desc(plan_expense::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::notification::list_for_recipient;
    use crate::entities::user as user_entity;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    async fn require_approval(db: &DatabaseConnection, user_id: i64) -> Result<()> {
        let user = user::require_user(db, user_id).await?;
        let mut active: user_entity::ActiveModel = user.into();
        active.requires_approval = Set(true);
        active.update(db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_add_expense_amount_validation() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        for amount in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let result = add_expense(&db, 1, test_expense(1, amount)).await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }

        let mut blank = test_expense(1, 5.0);
        blank.description = "  ".to_string();
        let result = add_expense(&db, 1, blank).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_smallest_amount_is_accepted() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let expense = add_expense(&db, owner.id, test_expense(plan.id, 0.01)).await?;
        assert_eq!(expense.amount, 0.01);
        assert_eq!(expense.status, ExpenseStatus::Approved);
        Ok(())
    }

    #[tokio::test]
    async fn test_viewers_cannot_add_expenses() -> Result<()> {
        let (db, _owner, plan) = setup_with_plan().await?;
        let viewer = create_test_user(&db, "viewer@x.com").await?;
        let outsider = create_test_user(&db, "out@x.com").await?;
        add_test_member(&db, plan.id, viewer.id, PlanRole::Viewer).await?;

        let result = add_expense(&db, viewer.id, test_expense(plan.id, 5.0)).await;
        assert!(matches!(result, Err(Error::InsufficientPrivilege { .. })));
        let result = add_expense(&db, outsider.id, test_expense(plan.id, 5.0)).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotMember);
        Ok(())
    }

    #[tokio::test]
    async fn test_approval_flow_for_supervised_editor() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let kid = create_test_user(&db, "kid@x.com").await?;
        add_test_member(&db, plan.id, kid.id, PlanRole::Editor).await?;
        require_approval(&db, kid.id).await?;

        let expense = add_expense(&db, kid.id, test_expense(plan.id, 20.0)).await?;
        assert_eq!(expense.status, ExpenseStatus::Pending);

        let result = approve_expense(&db, kid.id, expense.id).await;
        assert!(matches!(result, Err(Error::InsufficientPrivilege { .. })));

        let approved = approve_expense(&db, owner.id, expense.id).await?;
        assert_eq!(approved.status, ExpenseStatus::Approved);
        assert_eq!(approved.approved_by_user_id, Some(owner.id));

        let result = reject_expense(&db, owner.id, expense.id).await;
        assert!(matches!(
            result,
            Err(Error::ExpenseAlreadyResolved {
                status: ExpenseStatus::Approved,
                ..
            })
        ));

        let kinds: Vec<NotificationKind> = list_for_recipient(&db, kid.id)
            .await?
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![NotificationKind::ExpenseApproved, NotificationKind::ExpenseAdded]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_expenses_skip_approval() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        require_approval(&db, owner.id).await?;

        let expense = add_expense(&db, owner.id, test_expense(plan.id, 12.0)).await?;
        assert_eq!(expense.status, ExpenseStatus::Approved);
        let result = approve_expense(&db, owner.id, expense.id).await;
        assert!(matches!(result, Err(Error::ExpenseAlreadyResolved { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reject_pending_expense() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let kid = create_test_user(&db, "kid@x.com").await?;
        add_test_member(&db, plan.id, kid.id, PlanRole::Editor).await?;
        require_approval(&db, kid.id).await?;

        let expense = add_expense(&db, kid.id, test_expense(plan.id, 99.0)).await?;
        let rejected = reject_expense(&db, owner.id, expense.id).await?;
        assert_eq!(rejected.status, ExpenseStatus::Rejected);

        let result = approve_expense(&db, owner.id, expense.id).await;
        assert!(matches!(result, Err(Error::ExpenseAlreadyResolved { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete_permissions() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        let cat = create_test_user(&db, "cat@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Editor).await?;
        add_test_member(&db, plan.id, cat.id, PlanRole::Editor).await?;

        let expense = add_expense(&db, bob.id, test_expense(plan.id, 10.0)).await?;

        let result = update_expense(&db, bob.id, expense.id, ExpenseChanges::default()).await;
        assert!(matches!(result, Err(Error::NoFieldsProvided)));

        let changes = ExpenseChanges {
            amount: Some(15.0),
            notes: Some("receipt lost".to_string()),
            ..Default::default()
        };
        let result = update_expense(&db, cat.id, expense.id, changes.clone()).await;
        assert!(matches!(result, Err(Error::InsufficientPrivilege { .. })));

        let updated = update_expense(&db, bob.id, expense.id, changes).await?;
        assert_eq!(updated.amount, 15.0);
        assert_eq!(updated.notes.as_deref(), Some("receipt lost"));
        assert_eq!(updated.category, expense.category);

        let result = delete_expense(&db, cat.id, expense.id).await;
        assert!(matches!(result, Err(Error::InsufficientPrivilege { .. })));
        delete_expense(&db, owner.id, expense.id).await?;

        let result = get_expense(&db, bob.id, expense.id).await;
        assert!(matches!(result, Err(Error::ExpenseNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_orders_by_expense_date() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Editor).await?;

        let mut older = test_expense(plan.id, 5.0);
        older.expense_date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let mut newer = test_expense(plan.id, 6.0);
        newer.expense_date = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();

        let older = add_expense(&db, owner.id, older).await?;
        let newer = add_expense(&db, bob.id, newer).await?;

        let all: Vec<i64> = list_by_plan(&db, bob.id, plan.id)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(all, vec![newer.id, older.id]);

        let owners = list_by_plan_and_user(&db, bob.id, plan.id, owner.id).await?;
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].id, older.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_smith_family_scenario() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@smith.com").await?;
        let bob = create_test_user(&db, "bob@smith.com").await?;
        let plan = crate::core::plan::create_plan(&db, ann.id, test_plan("Smith Family")).await?;

        let invite = crate::core::invitation::create_invite(
            &db,
            ann.id,
            plan.id,
            "bob@smith.com",
            PlanRole::Editor,
            None,
        )
        .await?;
        crate::core::invitation::accept_invite(&db, invite.id, bob.id).await?;

        let expense = add_expense(&db, bob.id, test_expense(plan.id, 42.5)).await?;
        assert_eq!(expense.status, ExpenseStatus::Approved);

        for user_id in [ann.id, bob.id] {
            let notes = list_for_recipient(&db, user_id).await?;
            assert_eq!(notes[0].kind, NotificationKind::ExpenseAdded);
            assert_eq!(notes[0].entity_id, Some(expense.id));
        }

        let again = crate::core::invitation::create_invite(
            &db,
            ann.id,
            plan.id,
            "bob@smith.com",
            PlanRole::Viewer,
            None,
        )
        .await;
        assert!(matches!(again, Err(Error::AlreadyMember { .. })));

        crate::core::plan::remove_member(&db, ann.id, plan.id, bob.id).await?;
        assert!(
            membership::get_membership(&db, bob.id, plan.id)
                .await?
                .is_none()
        );

        let result = crate::core::plan::remove_member(&db, ann.id, plan.id, ann.id).await;
        assert!(matches!(result, Err(Error::CannotRemoveOwner)));
        assert_eq!(
            result.unwrap_err().kind(),
            ErrorKind::InvariantViolation
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_approve_and_reject_resolve_once() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let admin = create_test_user(&db, "admin@x.com").await?;
        add_test_member(&db, plan.id, admin.id, PlanRole::Admin).await?;
        let editor = create_test_user(&db, "e@x.com").await?;
        add_test_member(&db, plan.id, editor.id, PlanRole::Editor).await?;
        require_approval(&db, editor.id).await?;

        for _ in 0..10 {
            let expense = add_expense(&db, editor.id, test_expense(plan.id, 20.0)).await?;
            assert_eq!(expense.status, ExpenseStatus::Pending);

            let (approved, rejected) = tokio::join!(
                approve_expense(&db, owner.id, expense.id),
                reject_expense(&db, admin.id, expense.id)
            );
            assert!(
                approved.is_ok() != rejected.is_ok(),
                "exactly one resolution must win"
            );

            let stored = get_expense(&db, editor.id, expense.id).await?;
            let (winner, loser) = if approved.is_ok() {
                assert_eq!(stored.status, ExpenseStatus::Approved);
                assert_eq!(stored.approved_by_user_id, Some(owner.id));
                (approved, rejected)
            } else {
                assert_eq!(stored.status, ExpenseStatus::Rejected);
                assert_eq!(stored.approved_by_user_id, Some(admin.id));
                (rejected, approved)
            };
            assert_eq!(winner?.status, stored.status);
            assert!(matches!(
                loser,
                Err(Error::ExpenseAlreadyResolved { status, .. }) if status == stored.status
            ));
        }
        Ok(())
    }
}
