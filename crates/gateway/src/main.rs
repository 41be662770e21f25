//! TaskHerald gateway server binary entrypoint.

use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_classifier::EventClassifier;
use herald_common::config::AppConfig;
use herald_common::db::create_pool;
use herald_engine::processor::WebhookProcessor;
use herald_engine::registry::{ChannelRegistry, standard_channels};
use herald_engine::resolver::PreferenceResolver;
use herald_engine::router::NotificationRouter;
use herald_platform::asana::AsanaClient;
use herald_platform::discord::DiscordClient;
use herald_platform::stores::{PgIdentityMap, PgPreferenceStore};
use herald_platform::{ChatClient, WorkItemClient};

use herald_gateway::routes::create_router;
use herald_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("herald_gateway=debug,herald_engine=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting TaskHerald gateway server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Platform clients
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

    // Rebuild channel bindings by rescanning. A failure degrades to skipped
    // channel sends until an admin runs setup/repair.
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

    // Webhook pipeline
    let router = Arc::new(NotificationRouter::new(registry.clone(), chat.clone()));
    let resolver = Arc::new(PreferenceResolver::new(
        Arc::new(PgIdentityMap::new(pool.clone())),
        Arc::new(PgPreferenceStore::new(pool.clone())),
        chat.clone(),
    ));
    let processor = Arc::new(WebhookProcessor::new(
        EventClassifier::new(items.clone()),
        router,
        resolver,
    ));

    // Build application state
    let state = AppState::new(config.clone(), processor, registry, chat, items);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr: std::net::SocketAddr = config.gateway_bind_addr.parse()?;
    tracing::info!("Gateway server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
