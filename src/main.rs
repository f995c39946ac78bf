use anyhow::Context;
use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use helpdesk::core::config::AppConfig;
use helpdesk::core::directory::UserProvisioningService;
use helpdesk::core::shared::state::AppState;
use helpdesk::core::shared::utils::{create_conn, run_migrations};
use helpdesk::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(
        "Starting helpdesk {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address()
    );

    let pool = create_conn(&config.database).context("Failed to connect to the database")?;

    if config.database.run_migrations {
        let migration_pool = pool.clone();
        tokio::task::spawn_blocking(move || run_migrations(&migration_pool))
            .await?
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Failed to run migrations")?;
    } else {
        warn!("database.run_migrations is off, assuming the schema is current");
    }

    if let Some(admin) = &config.bootstrap_admin {
        UserProvisioningService::new(pool.clone())
            .ensure_bootstrap_admin(admin)
            .await?;
    }

    let state = Arc::new(AppState::new(pool, config));

    #[cfg(feature = "sla-sweep")]
    {
        let sweep = helpdesk::notifications::SlaSweepService::new(Arc::clone(&state));
        tokio::spawn(sweep.spawn());
    }

    run_server(state).await.context("HTTP server failed")?;
    info!("Helpdesk stopped");
    Ok(())
}
