use dotenvy::dotenv;
use plan_buddy::{
    api::{self, AppState},
    config::{database, settings},
    core::notification,
    errors::Result,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load application settings (config.toml is optional)
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Drop old read notifications
    if let Some(days) = settings.notifications.retention_days.filter(|d| *d > 0) {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
        notification::prune_read_before(&db, cutoff).await?;
    }

    // 6. Serve
    let state = AppState {
        db: Arc::new(db),
        settings: Arc::new(settings),
    };
    api::run_serve(state).await
}
