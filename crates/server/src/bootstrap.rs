use std::sync::Arc;
use std::time::Duration;

use deskbot_autoresponder::AutoresponderEngine;
use deskbot_core::config::{AppConfig, ConfigError, LoadOptions};
use deskbot_db::{connect_with_settings, migrations, DbPool, SqlStateStore};
use deskbot_slack::events::{EventDispatcher, MemberJoinedHandler, MessageHandler};
use deskbot_slack::sender::SlackAutoresponseSender;
use deskbot_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};
use deskbot_slack::web::{SlackApiError, SlackWebClient};
use deskbot_slack::welcome::WelcomeResponder;
use thiserror::Error;
use tracing::{info, warn};

use crate::inbound::EngineInbound;

pub type ServerEngine =
    AutoresponderEngine<SqlStateStore, SlackAutoresponseSender<Arc<SlackWebClient>>>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<ServerEngine>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    Slack(#[source] SlackApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let chat = Arc::new(
        SlackWebClient::new(
            config.slack.bot_token.clone(),
            Duration::from_secs(config.autoresponder.send_timeout_secs),
        )
        .map_err(BootstrapError::Slack)?,
    );

    let sender =
        SlackAutoresponseSender::new(chat.clone(), &config.slack, config.autoresponder.clone());
    let engine = Arc::new(AutoresponderEngine::new(
        SqlStateStore::new(db_pool.clone()),
        sender,
        config.autoresponder.clone(),
    ));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(EngineInbound::new(
        engine.clone(),
        config.autoresponder.company_email_domain.clone(),
    )));
    dispatcher.register(MemberJoinedHandler::new(WelcomeResponder::new(
        chat,
        config.welcome.clone(),
        &config.slack,
        &config.autoresponder.support_email,
    )));

    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        dispatcher,
        ReconnectPolicy::default(),
    );
    if !slack_runner.has_inbound_transport() {
        warn!(
            event_name = "system.bootstrap.no_inbound_transport",
            correlation_id = "bootstrap",
            "no inbound slack transport configured; messages will not be queued"
        );
    }
    info!(
        event_name = "system.bootstrap.wired",
        correlation_id = "bootstrap",
        rooms = ?config.autoresponder.rooms,
        welcome_enabled = config.welcome.enabled,
        "autoresponder engine and slack handlers wired"
    );

    Ok(Application { config, db_pool, engine, slack_runner })
}
