use std::sync::Arc;

use grocer_agent::AgentContext;
use grocer_core::config::{AppConfig, ConfigError, LoadOptions};
use grocer_db::{connect, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agents: Arc<AgentContext>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("agent context setup failed: {0:#}")]
    Agents(anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connects the database, applies migrations and wires the agent context.
/// Agents, the model handle and gateway tools stay unbuilt until first use.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        model_id = %config.model.model_id,
        region = %config.model.region,
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let agents = AgentContext::from_config(&config).await.map_err(BootstrapError::Agents)?;
    info!(
        event_name = "system.bootstrap.agents_wired",
        correlation_id = "bootstrap",
        gateway_config = %config.gateway.config_path.display(),
        "agent context ready for lazy initialization"
    );

    Ok(Application { config, db_pool, agents })
}
