use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Personal access token for the work-item service API
    pub asana_access_token: String,

    /// Project whose tasks are swept for reminders (also the default list scope)
    pub asana_project_gid: String,

    /// Chat platform bot token
    pub discord_bot_token: String,

    /// Guild (server) that hosts the notification channels
    pub discord_guild_id: String,

    /// Name of the channel category the registry provisions under
    pub notify_category_name: String,

    /// UTC hour (0-23) at which the daily missed-deadline sweep runs
    pub deadline_sweep_hour_utc: u32,

    /// Interval between due-soon sweeps in seconds (default: 3600)
    pub due_soon_interval_secs: u64,

    /// Per-call timeout for outbound HTTP requests in seconds (default: 10)
    pub http_timeout_secs: u64,

    /// Public URL the work-item service should push webhooks to
    pub webhook_target_url: Option<String>,

    /// Bind address for the gateway HTTP server (default: 0.0.0.0:3000)
    pub gateway_bind_addr: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            asana_access_token: std::env::var("ASANA_ACCESS_TOKEN").map_err(|_| {
                anyhow::anyhow!("ASANA_ACCESS_TOKEN environment variable is required")
            })?,
            asana_project_gid: std::env::var("ASANA_PROJECT_GID").map_err(|_| {
                anyhow::anyhow!("ASANA_PROJECT_GID environment variable is required")
            })?,
            discord_bot_token: std::env::var("DISCORD_BOT_TOKEN").map_err(|_| {
                anyhow::anyhow!("DISCORD_BOT_TOKEN environment variable is required")
            })?,
            discord_guild_id: std::env::var("DISCORD_GUILD_ID").map_err(|_| {
                anyhow::anyhow!("DISCORD_GUILD_ID environment variable is required")
            })?,
            notify_category_name: std::env::var("NOTIFY_CATEGORY_NAME")
                .unwrap_or_else(|_| "task updates".to_string()),
            deadline_sweep_hour_utc: std::env::var("DEADLINE_SWEEP_HOUR_UTC")
                .unwrap_or_else(|_| "9".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DEADLINE_SWEEP_HOUR_UTC must be an hour (0-23)"))?,
            due_soon_interval_secs: std::env::var("DUE_SOON_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DUE_SOON_INTERVAL_SECS must be a valid u64"))?,
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a valid u64"))?,
            webhook_target_url: std::env::var("WEBHOOK_TARGET_URL").ok(),
            gateway_bind_addr: std::env::var("GATEWAY_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
