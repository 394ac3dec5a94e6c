//! Notification dispatcher - best-effort delivery of plan events to member feeds.
//!
//! Writers never see an error from this module: a notification that cannot be stored is
//! logged and dropped so the workflow that triggered it still succeeds. Fan-out is a
//! sequential loop with each recipient isolated from the others' failures.
//!
//! The read side is scoped to the recipient; another user's notification looks exactly
//! like a missing one.

use crate::{
    entities::{Notification, NotificationKind, PlanMember, notification, plan_member},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info, warn};

/// Non-owning reference from a notification to the entity it is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef {
    /// Id of the entity
    pub id: i64,
    /// Entity type name stored alongside the id
    pub kind: &'static str,
}

impl EntityRef {
    /// Reference to a plan
    #[must_use]
    pub const fn plan(id: i64) -> Self {
        Self { id, kind: "plan" }
    }

    /// Reference to an invite
    #[must_use]
    pub const fn invite(id: i64) -> Self {
        Self { id, kind: "invite" }
    }

    /// Reference to a family expense
    #[must_use]
    pub const fn expense(id: i64) -> Self {
        Self { id, kind: "expense" }
    }
}

/// A delivery request for one recipient.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// User whose feed receives the notification
    pub recipient_user_id: i64,
    /// Event kind
    pub kind: NotificationKind,
    /// Human-readable text
    pub message: String,
    /// User who caused the event
    pub actor_user_id: Option<i64>,
    /// Entity the event is about
    pub entity: Option<EntityRef>,
    /// Client-side link
    pub link: Option<String>,
}

impl NewNotification {
    /// Builds a request with only the required fields set.
    pub fn new(recipient_user_id: i64, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            recipient_user_id,
            kind,
            message: message.into(),
            actor_user_id: None,
            entity: None,
            link: None,
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor_user_id: i64) -> Self {
        self.actor_user_id = Some(actor_user_id);
        self
    }

    /// Sets the related entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Sets the client-side link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Same request addressed to a different recipient.
    #[must_use]
    pub fn for_recipient(&self, recipient_user_id: i64) -> Self {
        Self {
            recipient_user_id,
            ..self.clone()
        }
    }
}

/// Stores one notification. Invalid requests and storage failures are logged and
/// swallowed; `None` means nothing was written.
pub async fn send<C>(db: &C, request: NewNotification) -> Option<notification::Model>
where
    C: ConnectionTrait,
{
    if request.recipient_user_id <= 0 || request.message.trim().is_empty() {
        warn!(
            recipient = request.recipient_user_id,
            kind = ?request.kind,
            "Dropping notification with missing recipient or message"
        );
        return None;
    }

    let (entity_id, entity_type) = request
        .entity
        .map_or((None, None), |e| (Some(e.id), Some(e.kind.to_string())));

    let model = notification::ActiveModel {
        recipient_user_id: Set(request.recipient_user_id),
        kind: Set(request.kind),
        message: Set(request.message),
        is_read: Set(false),
        link: Set(request.link),
        entity_id: Set(entity_id),
        entity_type: Set(entity_type),
        actor_user_id: Set(request.actor_user_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    match model.insert(db).await {
        Ok(stored) => {
            debug!(
                "Notification {} ({:?}) stored for user {}",
                stored.id, stored.kind, stored.recipient_user_id
            );
            Some(stored)
        }
        Err(e) => {
            warn!(
                recipient = request.recipient_user_id,
                kind = ?request.kind,
                "Failed to store notification: {e}"
            );
            None
        }
    }
}

/// Sends `template` once to every recipient, in order. Returns how many were stored.
pub async fn notify_users<C, I>(db: &C, recipients: I, template: &NewNotification) -> usize
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i64>,
{
    let mut delivered = 0;
    for recipient in recipients {
        if send(db, template.for_recipient(recipient)).await.is_some() {
            delivered += 1;
        }
    }
    delivered
}

/// Sends `template` to every current member of a plan, the actor included.
///
/// If the member list itself cannot be loaded nothing is sent and 0 is returned.
pub async fn notify_plan_members<C>(db: &C, plan_id: i64, template: &NewNotification) -> usize
where
    C: ConnectionTrait,
{
    let members = match PlanMember::find()
        .filter(plan_member::Column::PlanId.eq(plan_id))
        .all(db)
        .await
    {
        Ok(members) => members,
        Err(e) => {
            warn!("Could not load members of plan {plan_id} for notification: {e}");
            return 0;
        }
    };

    notify_users(db, members.into_iter().map(|m| m.user_id), template).await
}

/// Lists a user's notifications, newest first.
pub async fn list_for_recipient(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<notification::Model>> {
    Notification::find()
        .filter(notification::Column::RecipientUserId.eq(user_id))
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fetches one of the user's notifications.
pub async fn get_notification(
    db: &DatabaseConnection,
    user_id: i64,
    notification_id: i64,
) -> Result<notification::Model> {
    Notification::find_by_id(notification_id)
        .one(db)
        .await?
        .filter(|n| n.recipient_user_id == user_id)
        .ok_or(Error::NotificationNotFound { notification_id })
}

/// Marks a notification as read. Marking an already-read notification is a no-op.
pub async fn mark_as_read(
    db: &DatabaseConnection,
    user_id: i64,
    notification_id: i64,
) -> Result<notification::Model> {
    let existing = get_notification(db, user_id, notification_id).await?;
    if existing.is_read {
        return Ok(existing);
    }

    let mut active: notification::ActiveModel = existing.into();
    active.is_read = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Marks every unread notification of the user as read. Returns how many changed.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::RecipientUserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Number of unread notifications for the user.
pub async fn unread_count(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    Notification::find()
        .filter(notification::Column::RecipientUserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Deletes one of the user's notifications.
pub async fn delete_notification(
    db: &DatabaseConnection,
    user_id: i64,
    notification_id: i64,
) -> Result<()> {
    let existing = get_notification(db, user_id, notification_id).await?;
    existing.delete(db).await?;
    Ok(())
}

/// Deletes read notifications created before `cutoff`. Unread ones are kept.
pub async fn prune_read_before(db: &DatabaseConnection, cutoff: DateTimeUtc) -> Result<u64> {
    let result = Notification::delete_many()
        .filter(notification::Column::IsRead.eq(true))
        .filter(notification::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    info!("Pruned {} read notifications older than {}", result.rows_affected, cutoff);
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::PlanRole;
    use crate::test_utils::*;

    fn expense_added(recipient: i64) -> NewNotification {
        NewNotification::new(recipient, NotificationKind::ExpenseAdded, "Groceries: 42.50")
    }

    #[tokio::test]
    async fn test_send_stores_unread_notification() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;

        let stored = send(
            &db,
            expense_added(ann.id)
                .with_actor(7)
                .with_entity(EntityRef::expense(3))
                .with_link("/plans/1"),
        )
        .await
        .unwrap();

        assert!(!stored.is_read);
        assert_eq!(stored.recipient_user_id, ann.id);
        assert_eq!(stored.actor_user_id, Some(7));
        assert_eq!(stored.entity_id, Some(3));
        assert_eq!(stored.entity_type.as_deref(), Some("expense"));
        assert_eq!(stored.link.as_deref(), Some("/plans/1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_drops_malformed_requests() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;

        assert!(send(&db, expense_added(0)).await.is_none());
        assert!(
            send(
                &db,
                NewNotification::new(ann.id, NotificationKind::ExpenseAdded, "  ")
            )
            .await
            .is_none()
        );
        assert!(list_for_recipient(&db, ann.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_one_bad_recipient_does_not_stop_fan_out() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;
        let bob = create_test_user(&db, "bob@x.com").await?;

        let delivered = notify_users(&db, [ann.id, -1, bob.id], &expense_added(0)).await;
        assert_eq!(delivered, 2);
        assert_eq!(list_for_recipient(&db, bob.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_notify_plan_members_reaches_everyone() -> Result<()> {
        let (db, owner, plan) = setup_with_plan().await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        let cat = create_test_user(&db, "cat@x.com").await?;
        add_test_member(&db, plan.id, bob.id, PlanRole::Editor).await?;
        add_test_member(&db, plan.id, cat.id, PlanRole::Viewer).await?;

        let delivered = notify_plan_members(&db, plan.id, &expense_added(0).with_actor(owner.id)).await;
        assert_eq!(delivered, 3);
        for user_id in [owner.id, bob.id, cat.id] {
            assert_eq!(unread_count(&db, user_id).await?, 1);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_as_read_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;
        let stored = send(&db, expense_added(ann.id)).await.unwrap();

        let first = mark_as_read(&db, ann.id, stored.id).await?;
        let second = mark_as_read(&db, ann.id, stored.id).await?;
        assert!(first.is_read);
        assert_eq!(first, second);
        assert_eq!(unread_count(&db, ann.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_users_notifications_are_invisible() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;
        let bob = create_test_user(&db, "bob@x.com").await?;
        let stored = send(&db, expense_added(ann.id)).await.unwrap();

        let result = mark_as_read(&db, bob.id, stored.id).await;
        assert!(matches!(result, Err(Error::NotificationNotFound { .. })));
        let result = delete_notification(&db, bob.id, stored.id).await;
        assert!(matches!(result, Err(Error::NotificationNotFound { .. })));

        delete_notification(&db, ann.id, stored.id).await?;
        assert!(list_for_recipient(&db, ann.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_all_and_prune() -> Result<()> {
        let db = setup_test_db().await?;
        let ann = create_test_user(&db, "ann@x.com").await?;
        send(&db, expense_added(ann.id)).await.unwrap();
        send(&db, expense_added(ann.id)).await.unwrap();

        assert_eq!(mark_all_read(&db, ann.id).await?, 2);
        assert_eq!(mark_all_read(&db, ann.id).await?, 0);

        let unread = send(&db, expense_added(ann.id)).await.unwrap();
        let pruned =
            prune_read_before(&db, chrono::Utc::now() + chrono::Duration::seconds(5)).await?;
        assert_eq!(pruned, 2);

        let remaining = list_for_recipient(&db, ann.id).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, unread.id);
        Ok(())
    }
}
