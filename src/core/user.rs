//! User directory - registration and lookup of the users plans refer to.

use crate::{
    entities::{User, user},
    errors::{Error, Result, is_unique_violation},
};
use sea_orm::{Set, prelude::*};
use tracing::{info, warn};

/// Normalizes an e-mail address the way it is stored: trimmed and lower-cased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registers a new user in the directory.
///
/// The e-mail is normalized before storage and must be unique.
pub async fn register_user(
    db: &DatabaseConnection,
    email: &str,
    display_name: &str,
    requires_approval: bool,
) -> Result<user::Model> {
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation(format!("'{email}' is not a valid email")));
    }
    if display_name.trim().is_empty() {
        return Err(Error::validation("Display name cannot be empty"));
    }

    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        display_name: Set(display_name.trim().to_string()),
        requires_approval: Set(requires_approval),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let user = new_user.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::EmailTaken {
                email: email.clone(),
            }
        } else {
            Error::from(e)
        }
    })?;
    info!("Registered user {} <{}>", user.id, user.email);
    Ok(user)
}

/// Finds a user by id.
pub async fn get_user<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by id, failing with [`Error::UserNotFound`] if absent.
pub async fn require_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user(db, user_id)
        .await?
        .ok_or(Error::UserNotFound { user_id })
}

/// Resolves an e-mail address (in any case) to a registered user.
pub async fn find_user_by_email<C>(db: &C, email: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Display name for notification text. Never fails: a missing user or a storage error
/// yields `User <id>`.
pub async fn display_name_or_default<C>(db: &C, user_id: i64) -> String
where
    C: ConnectionTrait,
{
    match get_user(db, user_id).await {
        Ok(Some(user)) => user.display_name,
        Ok(None) => format!("User {user_id}"),
        Err(e) => {
            warn!("Could not load user {user_id} for notification text: {e}");
            format!("User {user_id}")
        }
    }
}
