//! Plan lifecycle business logic - create, update, delete and inspect shared plans.
//!
//! Plan creation writes the plan and the owner's admin membership in one transaction,
//! and deletion removes the plan with everything attached to it in one transaction.
//! The member-management commands here wrap `core::membership` and notify the
//! affected users once the change is committed.

use crate::{
    core::{
        membership::{self, ADMIN_ONLY, ANY_ROLE, RoleChange},
        notification::{self, EntityRef, NewNotification},
        user,
    },
    entities::{
        NotificationKind, Plan, PlanCategoryLimit, PlanExpense, PlanInvite, PlanMember, PlanRole,
        plan, plan_category_limit, plan_expense, plan_invite, plan_member,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

const DEFAULT_CURRENCY: &str = "USD";

/// Attributes of a plan to create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPlan {
    /// Display name; must not be blank
    pub name: String,
    /// Optional overall budget
    pub total_budget: Option<f64>,
    /// Optional first day of the plan period
    pub start_date: Option<NaiveDate>,
    /// Optional last day of the plan period
    pub end_date: Option<NaiveDate>,
    /// Three-letter currency code, `USD` when omitted
    pub currency: Option<String>,
}

/// Partial update of a plan; only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanChanges {
    /// New display name
    pub name: Option<String>,
    /// New overall budget
    pub total_budget: Option<f64>,
    /// New first day of the plan period
    pub start_date: Option<NaiveDate>,
    /// New last day of the plan period
    pub end_date: Option<NaiveDate>,
    /// New currency code
    pub currency: Option<String>,
}

impl PlanChanges {
    /// True when the request carries no field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.total_budget.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.currency.is_none()
    }
}

/// A plan with its owner resolved and the requester's role.
#[derive(Debug, Clone, Serialize)]
pub struct PlanDetails {
    /// The plan row
    #[serde(flatten)]
    pub plan: plan::Model,
    /// Owner's display name
    pub owner_name: String,
    /// Owner's e-mail
    pub owner_email: String,
    /// Role of the user who asked
    pub role: PlanRole,
}

/// A plan the user belongs to, annotated with the user's role.
#[derive(Debug, Clone, Serialize)]
pub struct UserPlan {
    /// The plan row
    #[serde(flatten)]
    pub plan: plan::Model,
    /// The user's role on it
    pub role: PlanRole,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Plan name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_budget(budget: Option<f64>) -> Result<()> {
    match budget {
        Some(amount) if !amount.is_finite() || amount < 0.0 => {
            Err(Error::InvalidAmount { amount })
        }
        _ => Ok(()),
    }
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(Error::validation(format!(
            "Plan start date {start} is after end date {end}"
        ))),
        _ => Ok(()),
    }
}

fn validate_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::validation(format!(
            "'{currency}' is not a three-letter currency code"
        )));
    }
    Ok(code)
}

fn plan_link(plan_id: i64) -> String {
    format!("/plans/{plan_id}")
}

/// Loads a plan, failing with [`Error::PlanNotFound`] if it does not exist.
pub async fn require_plan<C>(db: &C, plan_id: i64) -> Result<plan::Model>
where
    C: ConnectionTrait,
{
    Plan::find_by_id(plan_id)
        .one(db)
        .await?
        .ok_or(Error::PlanNotFound { plan_id })
}

/// Plan name for notification text. Never fails: a missing plan or a storage error
/// yields `plan <id>`.
pub async fn plan_name_or_default<C>(db: &C, plan_id: i64) -> String
where
    C: ConnectionTrait,
{
    match Plan::find_by_id(plan_id).one(db).await {
        Ok(Some(plan)) => plan.name,
        Ok(None) => format!("plan {plan_id}"),
        Err(e) => {
            warn!("Could not load plan {plan_id} for notification text: {e}");
            format!("plan {plan_id}")
        }
    }
}

/// Creates a plan owned by `owner_id`, who becomes its first admin.
#[instrument(skip(db, new_plan), fields(name = %new_plan.name))]
pub async fn create_plan(
    db: &DatabaseConnection,
    owner_id: i64,
    new_plan: NewPlan,
) -> Result<plan::Model> {
    let name = validate_name(&new_plan.name)?;
    validate_budget(new_plan.total_budget)?;
    validate_dates(new_plan.start_date, new_plan.end_date)?;
    let currency = validate_currency(new_plan.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))?;

    user::require_user(db, owner_id).await?;

    let txn = db.begin().await?;

    let plan = plan::ActiveModel {
        name: Set(name),
        owner_id: Set(owner_id),
        total_budget: Set(new_plan.total_budget),
        start_date: Set(new_plan.start_date),
        end_date: Set(new_plan.end_date),
        currency: Set(currency),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    membership::add_member(&txn, plan.id, owner_id, PlanRole::Admin).await?;

    txn.commit().await?;
    info!("User {} created plan {} ({})", owner_id, plan.id, plan.name);
    Ok(plan)
}

/// Applies a partial update to a plan. Admin only.
pub async fn update_plan(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    changes: PlanChanges,
) -> Result<plan::Model> {
    membership::require_role(db, requester_id, plan_id, ADMIN_ONLY).await?;

    if changes.is_empty() {
        return Err(Error::NoFieldsProvided);
    }

    let existing = require_plan(db, plan_id).await?;

    let name = changes.name.as_deref().map(validate_name).transpose()?;
    validate_budget(changes.total_budget)?;
    let currency = changes
        .currency
        .as_deref()
        .map(validate_currency)
        .transpose()?;
    validate_dates(
        changes.start_date.or(existing.start_date),
        changes.end_date.or(existing.end_date),
    )?;

    let mut active: plan::ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(budget) = changes.total_budget {
        active.total_budget = Set(Some(budget));
    }
    if let Some(start) = changes.start_date {
        active.start_date = Set(Some(start));
    }
    if let Some(end) = changes.end_date {
        active.end_date = Set(Some(end));
    }
    if let Some(currency) = currency {
        active.currency = Set(currency);
    }
    let updated = active.update(db).await?;

    info!("User {} updated plan {}", requester_id, plan_id);
    notification::notify_plan_members(
        db,
        plan_id,
        &NewNotification::new(
            0,
            NotificationKind::PlanUpdated,
            format!("Plan \"{}\" was updated", updated.name),
        )
        .with_actor(requester_id)
        .with_entity(EntityRef::plan(plan_id))
        .with_link(plan_link(plan_id)),
    )
    .await;

    Ok(updated)
}

/// Deletes a plan and everything attached to it. Admin only.
///
/// Expenses, category limits, invites, memberships and the plan row are removed in one
/// transaction; if any step fails nothing is deleted. Former members are notified
/// after the commit.
#[instrument(skip(db))]
pub async fn delete_plan(db: &DatabaseConnection, requester_id: i64, plan_id: i64) -> Result<()> {
    membership::require_role(db, requester_id, plan_id, ADMIN_ONLY).await?;

    let txn = db.begin().await?;

    let plan = require_plan(&txn, plan_id).await?;
    let former_members: Vec<i64> = PlanMember::find()
        .filter(plan_member::Column::PlanId.eq(plan_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();

    let expenses = PlanExpense::delete_many()
        .filter(plan_expense::Column::PlanId.eq(plan_id))
        .exec(&txn)
        .await?;
    let limits = PlanCategoryLimit::delete_many()
        .filter(plan_category_limit::Column::PlanId.eq(plan_id))
        .exec(&txn)
        .await?;
    let invites = PlanInvite::delete_many()
        .filter(plan_invite::Column::PlanId.eq(plan_id))
        .exec(&txn)
        .await?;
    let members = PlanMember::delete_many()
        .filter(plan_member::Column::PlanId.eq(plan_id))
        .exec(&txn)
        .await?;
    Plan::delete_by_id(plan_id).exec(&txn).await?;

    txn.commit().await?;
    info!(
        "User {} deleted plan {} ({} expenses, {} limits, {} invites, {} members)",
        requester_id,
        plan_id,
        expenses.rows_affected,
        limits.rows_affected,
        invites.rows_affected,
        members.rows_affected
    );

    notification::notify_users(
        db,
        former_members,
        &NewNotification::new(
            0,
            NotificationKind::PlanDeleted,
            format!("Plan \"{}\" was deleted", plan.name),
        )
        .with_actor(requester_id)
        .with_entity(EntityRef::plan(plan_id)),
    )
    .await;

    Ok(())
}

/// Returns a plan with its owner resolved. Any member may call this.
pub async fn get_plan_details(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
) -> Result<PlanDetails> {
    let membership = membership::require_role(db, requester_id, plan_id, ANY_ROLE).await?;
    let plan = require_plan(db, plan_id).await?;
    let owner = user::require_user(db, plan.owner_id).await?;

    Ok(PlanDetails {
        plan,
        owner_name: owner.display_name,
        owner_email: owner.email,
        role: membership.role,
    })
}

/// Lists every plan the user belongs to, with the user's role on each.
///
/// Memberships whose plan row is missing are skipped.
pub async fn list_user_plans(db: &DatabaseConnection, user_id: i64) -> Result<Vec<UserPlan>> {
    let rows = PlanMember::find()
        .filter(plan_member::Column::UserId.eq(user_id))
        .order_by_asc(plan_member::Column::JoinedAt)
        .find_also_related(Plan)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(membership, plan)| {
            if plan.is_none() {
                warn!(
                    "User {} has a membership on missing plan {}",
                    user_id, membership.plan_id
                );
            }
            plan.map(|plan| UserPlan {
                plan,
                role: membership.role,
            })
        })
        .collect())
}

/// Changes a member's role and tells them about it.
pub async fn change_member_role(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    target_user_id: i64,
    new_role: PlanRole,
) -> Result<RoleChange> {
    let change =
        membership::change_role(db, requester_id, plan_id, target_user_id, new_role).await?;

    if change.previous != change.current {
        let plan_name = plan_name_or_default(db, plan_id).await;
        notification::send(
            db,
            NewNotification::new(
                target_user_id,
                NotificationKind::MemberRoleChanged,
                format!(
                    "Your role on \"{plan_name}\" changed from {} to {}",
                    change.previous, change.current
                ),
            )
            .with_actor(requester_id)
            .with_entity(EntityRef::plan(plan_id))
            .with_link(plan_link(plan_id)),
        )
        .await;
    }

    Ok(change)
}

/// Removes a member from the plan and tells them about it.
pub async fn remove_member(
    db: &DatabaseConnection,
    requester_id: i64,
    plan_id: i64,
    target_user_id: i64,
) -> Result<()> {
    membership::remove_member(db, requester_id, plan_id, target_user_id).await?;

    let plan_name = plan_name_or_default(db, plan_id).await;
    notification::send(
        db,
        NewNotification::new(
            target_user_id,
            NotificationKind::MemberRemoved,
            format!("You were removed from \"{plan_name}\""),
        )
        .with_actor(requester_id)
        .with_entity(EntityRef::plan(plan_id)),
    )
    .await;

    Ok(())
}

/// Lets a member leave a plan and tells the plan's admins.
pub async fn leave_plan(db: &DatabaseConnection, user_id: i64, plan_id: i64) -> Result<()> {
    membership::leave_plan(db, user_id, plan_id).await?;

    let plan_name = plan_name_or_default(db, plan_id).await;
    let admins: Vec<i64> = match PlanMember::find()
        .filter(plan_member::Column::PlanId.eq(plan_id))
        .filter(plan_member::Column::Role.eq(PlanRole::Admin))
        .all(db)
        .await
    {
        Ok(admins) => admins.into_iter().map(|m| m.user_id).collect(),
        Err(e) => {
            warn!("Could not load admins of plan {plan_id} for notification: {e}");
            Vec::new()
        }
    };

    let leaver = user::display_name_or_default(db, user_id).await;
    notification::notify_users(
        db,
        admins,
        &NewNotification::new(
            0,
            NotificationKind::MemberLeft,
            format!("{leaver} left \"{plan_name}\""),
        )
        .with_actor(user_id)
        .with_entity(EntityRef::plan(plan_id))
        .with_link(plan_link(plan_id)),
    )
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{
        category_limit, expense, invitation,
        notification::list_for_recipient,
    };
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase, PaginatorTrait};

    #[tokio::test]
    async fn test_create_plan_validation() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_plan(&db, 1, NewPlan::default()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_plan(
            &db,
            1,
            NewPlan {
                name: "Trip".to_string(),
                total_budget: Some(-5.0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = create_plan(
            &db,
            1,
            NewPlan {
                name: "Trip".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 5, 1),
                end_date: NaiveDate::from_ymd_opt(2026, 4, 1),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_plan(
            &db,
            1,
            NewPlan {
                name: "Trip".to_string(),
                currency: Some("dollars".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_plan_makes_owner_admin() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;

        let plan = create_plan(
            &db,
            ann.id,
            NewPlan {
                name: "  Smith Family ".to_string(),
                total_budget: Some(1_500.0),
                currency: Some("eur".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(plan.name, "Smith Family");
        assert_eq!(plan.owner_id, ann.id);
        assert_eq!(plan.currency, "EUR");
        assert_eq!(plan.total_budget, Some(1_500.0));
        assert_eq!(
            membership::get_role(&db, ann.id, plan.id).await?,
            PlanRole::Admin
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_create_plan_for_unknown_owner_writes_nothing() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_plan(&db, 42, test_plan("Ghost")).await;
        assert!(matches!(result, Err(Error::UserNotFound { user_id: 42 })));
        assert_eq!(Plan::find().count(&db).await?, 0);
        assert_eq!(PlanMember::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_plan_applies_present_fields_only() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;

        let updated = update_plan(
            &db,
            owner.id,
            plan.id,
            PlanChanges {
                total_budget: Some(900.0),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.total_budget, Some(900.0));
        assert_eq!(updated.name, plan.name);
        assert_eq!(updated.currency, plan.currency);

        let notes = list_for_recipient(&db, owner.id).await?;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::PlanUpdated);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_plan_rejects_empty_and_non_admin() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let editor = create_test_user(&db, "editor@x.com").await?;
        add_test_member(&db, plan.id, editor.id, PlanRole::Editor).await?;

        let result = update_plan(&db, owner.id, plan.id, PlanChanges::default()).await;
        assert!(matches!(result, Err(Error::NoFieldsProvided)));

        let result = update_plan(
            &db,
            editor.id,
            plan.id,
            PlanChanges {
                name: Some("Mine now".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InsufficientPrivilege);

        let result = update_plan(
            &db,
            owner.id,
            plan.id,
            PlanChanges {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_plan_cascades_everything() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        let cat = create_test_user(&db, "cat@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Editor).await?;

        expense::add_expense(&db, bob.id, test_expense(plan.id, 42.5)).await?;
        invitation::create_invite(&db, owner.id, plan.id, "cat@x.com", PlanRole::Viewer, None)
            .await?;
        category_limit::set_category_limit(&db, owner.id, plan.id, "Food", 300.0).await?;

        delete_plan(&db, owner.id, plan.id).await?;

        assert_eq!(
            PlanExpense::find()
                .filter(plan_expense::Column::PlanId.eq(plan.id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(
            PlanMember::find()
                .filter(plan_member::Column::PlanId.eq(plan.id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(
            PlanInvite::find()
                .filter(plan_invite::Column::PlanId.eq(plan.id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(PlanCategoryLimit::find().count(&db).await?, 0);
        assert!(invitation::list_pending(&db, cat.id).await?.is_empty());

        let result = get_plan_details(&db, owner.id, plan.id).await;
        assert!(matches!(result, Err(Error::PlanNotFound { .. })));
        let result = expense::list_by_plan(&db, owner.id, plan.id).await;
        assert!(matches!(result, Err(Error::PlanNotFound { .. })));

        let bob_notes = list_for_recipient(&db, bob.id).await?;
        assert!(bob_notes.iter().any(|n| n.kind == NotificationKind::PlanDeleted));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_plan_requires_admin() -> Result<()> {
        let (db, _owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Editor).await?;

        let result = delete_plan(&db, bob.id, plan.id).await;
        assert!(matches!(result, Err(Error::InsufficientPrivilege { .. })));
        assert!(Plan::find_by_id(plan.id).one(&db).await?.is_some());
        assert_eq!(PlanMember::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_plan_details_and_listing() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Viewer).await?;
        let other = create_plan(&db, bob.id, test_plan("Bob's Plan")).await?;

        let details = get_plan_details(&db, bob.id, plan.id).await?;
        assert_eq!(details.owner_email, owner.email);
        assert_eq!(details.role, PlanRole::Viewer);

        let result = get_plan_details(&db, owner.id, other.id).await;
        assert!(matches!(result, Err(Error::NotMember { .. })));

        let plans = list_user_plans(&db, bob.id).await?;
        assert_eq!(plans.len(), 2);
        let roles: Vec<(i64, PlanRole)> = plans.iter().map(|p| (p.plan.id, p.role)).collect();
        assert!(roles.contains(&(plan.id, PlanRole::Viewer)));
        assert!(roles.contains(&(other.id, PlanRole::Admin)));
        Ok(())
    }

    #[tokio::test]
    async fn test_member_management_notifies_target() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Viewer).await?;

        change_member_role(&db, owner.id, plan.id, bob.id, PlanRole::Editor).await?;
        remove_member(&db, owner.id, plan.id, bob.id).await?;

        let kinds: Vec<NotificationKind> = list_for_recipient(&db, bob.id)
            .await?
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert!(kinds.contains(&NotificationKind::MemberRoleChanged));
        assert!(kinds.contains(&NotificationKind::MemberRemoved));
        assert!(list_user_plans(&db, bob.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_leave_plan_notifies_admins() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Editor).await?;

        leave_plan(&db, bob.id, plan.id).await?;

        let notes = list_for_recipient(&db, owner.id).await?;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::MemberLeft);
        assert_eq!(notes[0].actor_user_id, Some(bob.id));
        Ok(())
    }
}
