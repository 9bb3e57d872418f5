use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use herald_core::config::{AppConfig, HostMode};

#[derive(Clone)]
pub struct HealthState {
    host: HostMode,
    agent_base_url: String,
    allowed_channel: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            host: config.server.host,
            agent_base_url: config.agent.base_url.clone(),
            allowed_channel: config.slack.channel.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub host: String,
    pub service: HealthCheck,
    pub agent: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(serve_error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                channel_id = "unknown",
                thread_id = "unknown",
                error = %serve_error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let agent = agent_check(&state);
    let ready = agent.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        host: format!("{:?}", state.host).to_lowercase(),
        service: HealthCheck {
            status: "ready",
            detail: format!("relaying `{}` to the agent", state.allowed_channel),
        },
        agent,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn agent_check(state: &HealthState) -> HealthCheck {
    if state.agent_base_url.is_empty() {
        return HealthCheck {
            status: "degraded",
            detail: "agent endpoint is not configured".to_string(),
        };
    }

    HealthCheck {
        status: "ready",
        detail: format!("agent endpoint configured at `{}`", state.agent_base_url),
    }
}
