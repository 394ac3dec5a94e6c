//! Database configuration module.
//!
//! Handles the database connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`; the
//! few constraints the entity macros cannot express (partial and composite unique
//! indexes) are created with raw SQL afterwards.

use crate::entities::{
    Notification, Plan, PlanCategoryLimit, PlanExpense, PlanInvite, PlanMember, User,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/plan_buddy.sqlite?mode=rwc";

/// Unique indexes that back invariants the application relies on.
const UNIQUE_INDEXES: [&str; 2] = [
    // At most one pending invite per (plan, invitee)
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_unique_pending_invite
        ON plan_invites(plan_id, invitee_user_id)
        WHERE status = 'pending'",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_unique_plan_category_limit
        ON plan_category_limits(plan_id, category)",
];

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set.
#[instrument]
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables and unique indexes if they do not exist yet.
///
/// Tables are created parent-first so that foreign keys resolve.
#[instrument(skip(db))]
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statements = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Plan),
        schema.create_table_from_entity(PlanMember),
        schema.create_table_from_entity(PlanInvite),
        schema.create_table_from_entity(PlanExpense),
        schema.create_table_from_entity(PlanCategoryLimit),
        schema.create_table_from_entity(Notification),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(builder.build(&*statement)).await?;
    }

    for index in UNIQUE_INDEXES {
        db.execute_unprepared(index).await?;
    }

    info!("Database tables ensured.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NotificationModel, PlanMemberModel, UserModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<PlanMemberModel> = PlanMember::find().limit(1).all(&db).await?;
        let _: Vec<NotificationModel> = Notification::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
