mod bootstrap;
mod health;
mod secrets_http;
mod webhook;

use std::sync::Arc;

use anyhow::Result;
use herald_core::config::{AppConfig, HostMode, LoadOptions};
use herald_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};

fn init_logging(config: &AppConfig) {
    use herald_core::config::LogFormat::*;
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

    // Bootstrap resolves every credential before traffic is accepted
    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::from_config(&app.config),
    )
    .await?;

    match app.config.server.host {
        HostMode::Socket => run_socket_host(&app).await?,
        HostMode::Webhook => run_webhook_host(&app).await?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        channel_id = "unknown",
        thread_id = "unknown",
        "herald-server stopping"
    );

    Ok(())
}

async fn run_socket_host(app: &bootstrap::Application) -> Result<()> {
    let runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        app.dispatcher.clone(),
        ReconnectPolicy::default(),
    );

    tracing::info!(
        event_name = "system.server.slack_transport_mode",
        transport_mode = runner.transport_label(),
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
        "slack runner transport mode initialized"
    );

    runner.start().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
        host = "socket",
        "herald-server started"
    );
    wait_for_shutdown().await
}

async fn run_webhook_host(app: &bootstrap::Application) -> Result<()> {
    let state = webhook::WebhookState {
        dispatcher: app.dispatcher.clone(),
        agent: app.agent.clone(),
        signing_secret: app.config.slack.signing_secret.clone(),
        process_before_response: app.config.server.process_before_response,
    };

    let address =
        format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
        host = "webhook",
        bind_address = %address,
        process_before_response = app.config.server.process_before_response,
        "herald-server listening for slack events"
    );

    axum::serve(listener, webhook::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
