use herald_core::config::{AppConfig, LoadOptions};
use herald_slack::events::{
    offline_dispatcher, DispatchStatus, EventContext, MessageEvent, WebhookPayload,
};

use super::CommandResult;

/// Offline readiness check: drives the two canonical payloads through the
/// dispatcher with inert collaborators. No network access.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(load_error) => {
            return CommandResult::failure("smoke", "config_validation", load_error.to_string(), 2)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(runtime_error) => {
            return CommandResult::failure(
                "smoke",
                "runtime",
                format!("failed to initialize async runtime: {runtime_error}"),
                3,
            );
        }
    };

    let outcome = runtime.block_on(async {
        let dispatcher = offline_dispatcher(config.slack.channel.clone());
        let ctx = EventContext { correlation_id: "smoke".to_owned() };

        let challenge = dispatcher
            .dispatch(
                &WebhookPayload::UrlVerification { challenge: "smoke-check".to_owned() },
                &ctx,
            )
            .await;
        if challenge.reply.as_deref() != Some("smoke-check") {
            return Err("url verification challenge was not echoed".to_owned());
        }

        let message = dispatcher
            .dispatch(
                &WebhookPayload::EventCallback {
                    event: MessageEvent {
                        kind: "message".to_owned(),
                        channel: Some("C-smoke".to_owned()),
                        user: Some("U-smoke".to_owned()),
                        text: Some("hello from the smoke check".to_owned()),
                        ts: Some("1730000000.0001".to_owned()),
                        ..MessageEvent::default()
                    },
                },
                &ctx,
            )
            .await;

        match message.status {
            DispatchStatus::Ok => Ok(()),
            other => Err(format!("unexpected dispatch status: {other:?}")),
        }
    });

    match outcome {
        Ok(()) => CommandResult::success(
            "smoke",
            format!("dispatch pipeline healthy for channel `{}`", config.slack.channel),
        ),
        Err(detail) => CommandResult::failure("smoke", "dispatch", detail, 6),
    }
}
