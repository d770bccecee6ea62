mod bootstrap;
mod health;
mod inbound;

use std::time::Duration;

use anyhow::Result;
use deskbot_autoresponder::Scheduler;
use deskbot_core::config::{AppConfig, LoadOptions};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use deskbot_core::config::LogFormat::*;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Config first so logging honours the configured level and format.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let (stop_scheduler, scheduler_stopped) = oneshot::channel::<()>();
    let scheduler = Scheduler::from_policy(app.engine.clone());
    let scheduler_task = tokio::spawn(scheduler.run_until(async move {
        let _ = scheduler_stopped.await;
    }));

    let slack_runner = app.slack_runner;
    let slack_task = tokio::spawn(async move { slack_runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        rooms = ?app.config.autoresponder.rooms,
        job_interval_secs = app.config.autoresponder.job_interval_secs,
        "deskbot-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "deskbot-server stopping"
    );

    let _ = stop_scheduler.send(());
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, scheduler_task).await {
        Ok(Ok(ticks)) => tracing::info!(
            event_name = "system.server.scheduler_stopped",
            correlation_id = "shutdown",
            ticks,
            "autoresponder scheduler drained"
        ),
        Ok(Err(join_error)) => tracing::warn!(
            event_name = "system.server.scheduler_stopped",
            correlation_id = "shutdown",
            error = %join_error,
            "autoresponder scheduler task ended abnormally"
        ),
        Err(_) => tracing::warn!(
            event_name = "system.server.scheduler_stopped",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "autoresponder scheduler did not drain before the grace period"
        ),
    }

    slack_task.abort();
    // A tick that outlived the grace period still holds the state lock.
    app.engine.flush().await;
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
