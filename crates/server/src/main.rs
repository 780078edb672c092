mod bootstrap;
mod health;
mod reload;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use autoreply_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use autoreply_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState { rules: app.rules.clone(), source: app.rules_source.clone() },
    )
    .await?;
    reload::spawn(app.rules.clone(), app.rules_source.clone())?;

    let runner = Arc::new(app.runner);
    let mut polling = tokio::spawn({
        let runner = Arc::clone(&runner);
        async move { runner.start().await }
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport = runner.transport_name(),
        "autoreply-server started"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        finished = &mut polling => {
            finished??;
            tracing::warn!(
                event_name = "system.server.polling_stopped",
                correlation_id = "shutdown",
                "polling runner stopped; shutting down"
            );
            return Ok(());
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        graceful_shutdown_secs = app.config.server.graceful_shutdown_secs,
        "autoreply-server stopping"
    );
    runner.request_shutdown();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, &mut polling).await {
        Ok(finished) => finished??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                "polling runner did not stop in time; aborting"
            );
            polling.abort();
        }
    }

    Ok(())
}
