use std::sync::Arc;
use std::time::Duration;

use herald_common::config::AppConfig;
use herald_common::db;
use herald_engine::registry::{ChannelRegistry, standard_channels};
use herald_engine::resolver::PreferenceResolver;
use herald_engine::router::NotificationRouter;
use herald_platform::asana::AsanaClient;
use herald_platform::discord::DiscordClient;
use herald_platform::stores::{PgIdentityMap, PgPreferenceStore};
use herald_platform::{ChatClient, WorkItemClient};
use herald_scheduler::{SweepContext, due_soon, missed_deadlines};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_scheduler=info,herald_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("TaskHerald scheduler starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let items: Arc<dyn WorkItemClient> = Arc::new(AsanaClient::new(
        &config.asana_access_token,
        &config.asana_project_gid,
        timeout,
    )?);
    let chat: Arc<dyn ChatClient> = Arc::new(DiscordClient::new(
        &config.discord_bot_token,
        &config.discord_guild_id,
        timeout,
    )?);

    // Rebuild channel bindings by rescanning; only genuinely missing
    // channels get created. A failure here degrades to skipped channel
    // sends rather than aborting the scheduler.
    let registry = Arc::new(ChannelRegistry::new(chat.clone()));
    match registry
        .ensure_category(&config.notify_category_name, &standard_channels())
        .await
    {
        Ok(report) => tracing::info!(
            working = report.working,
            total = report.total,
            "Channel bindings restored"
        ),
        Err(e) => tracing::warn!(
            error = %e,
            "Channel discovery failed at startup; channel sends skipped until repair"
        ),
    }

    let router = Arc::new(NotificationRouter::new(registry, chat.clone()));
    let resolver = Arc::new(PreferenceResolver::new(
        Arc::new(PgIdentityMap::new(pool.clone())),
        Arc::new(PgPreferenceStore::new(pool.clone())),
        chat.clone(),
    ));

    let ctx = SweepContext {
        items,
        router,
        resolver,
    };

    tracing::info!(
        deadline_sweep_hour_utc = config.deadline_sweep_hour_utc,
        due_soon_interval_secs = config.due_soon_interval_secs,
        "Starting reminder sweeps"
    );

    let daily = tokio::spawn(missed_deadlines::run_daily(
        ctx.clone(),
        config.deadline_sweep_hour_utc,
    ));
    let hourly = tokio::spawn(due_soon::run_interval(
        ctx,
        Duration::from_secs(config.due_soon_interval_secs),
    ));

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = daily => {
            tracing::error!("Missed-deadline sweep task exited unexpectedly");
        }
        _ = hourly => {
            tracing::error!("Due-soon sweep task exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("TaskHerald scheduler stopped.");
    Ok(())
}
