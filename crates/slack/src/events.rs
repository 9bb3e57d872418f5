use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use herald_core::domain::{AgentConnector, AgentRequest, AgentResult};
use herald_core::errors::AgentError;

use crate::mrkdwn::MrkdwnRenderer;

/// One inbound webhook body, tagged by its top-level `type`. Anything the
/// platform may send beyond the two recognized shapes lands in `Other`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WebhookPayload {
    #[serde(rename = "url_verification")]
    UrlVerification { challenge: String },
    #[serde(rename = "event_callback")]
    EventCallback { event: MessageEvent },
    #[serde(other)]
    Other,
}

/// The nested event of an `event_callback`. Every field is optional on the
/// wire; `bot_id` presence marks a bot-authored message.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct MessageEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    /// Body the host should echo back to the platform. Only set for the
    /// URL-verification challenge.
    pub reply: Option<String>,
}

impl DispatchOutcome {
    pub fn ok() -> Self {
        Self { status: DispatchStatus::Ok, reply: None }
    }

    pub fn challenge(text: &str) -> Self {
        Self { status: DispatchStatus::Ok, reply: Some(text.to_owned()) }
    }

    pub fn ignored(reason: IgnoreReason) -> Self {
        Self { status: DispatchStatus::Ignored(reason), reply: None }
    }

    pub fn error() -> Self {
        Self { status: DispatchStatus::Error, reply: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStatus {
    Ok,
    Ignored(IgnoreReason),
    /// The agent failed; an apology was delivered in place of a reply.
    /// Hosts still acknowledge the platform normally.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    BotAuthored,
    ChannelNotAllowed,
    EmptyText,
    UnsupportedEvent,
}

impl IgnoreReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BotAuthored => "bot_authored",
            Self::ChannelNotAllowed => "channel_not_allowed",
            Self::EmptyText => "empty_text",
            Self::UnsupportedEvent => "unsupported_event",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("channel lookup failed for `{channel_id}`: {detail}")]
    Lookup { channel_id: String, detail: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("reply delivery failed for channel `{channel_id}`: {detail}")]
    Delivery { channel_id: String, detail: String },
}

/// Resolves a channel id to its normalized display name.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_name(&self, channel_id: &str) -> Result<String, DirectoryError>;
}

/// Posts one threaded reply. Best-effort single attempt; callers log and
/// swallow failures because the inbound acknowledgment may already be out.
#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    async fn post_reply(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), PublishError>;
}

/// Maps every channel id to one fixed name. Used by tests and the offline
/// smoke path.
pub struct StaticChannelDirectory {
    name: String,
}

impl StaticChannelDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ChannelDirectory for StaticChannelDirectory {
    async fn channel_name(&self, _channel_id: &str) -> Result<String, DirectoryError> {
        Ok(self.name.clone())
    }
}

#[derive(Default)]
pub struct NoopReplyPublisher;

#[async_trait]
impl ReplyPublisher for NoopReplyPublisher {
    async fn post_reply(
        &self,
        _channel_id: &str,
        _thread_ts: &str,
        _text: &str,
    ) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Completes every run without an agent-authored fragment, so the reply is
/// the fixed fallback phrase.
#[derive(Default)]
pub struct NoopAgentConnector;

#[async_trait]
impl AgentConnector for NoopAgentConnector {
    async fn run(&self, _request: &AgentRequest) -> Result<AgentResult, AgentError> {
        Ok(AgentResult::from_messages(Vec::new()))
    }
}

/// Single dispatch path shared by the socket and webhook hosts. Constructed
/// once at startup from already-resolved credentials; holds no mutable
/// state of its own.
pub struct EventDispatcher {
    allowed_channel: String,
    agent: Arc<dyn AgentConnector>,
    directory: Arc<dyn ChannelDirectory>,
    publisher: Arc<dyn ReplyPublisher>,
    renderer: MrkdwnRenderer,
}

impl EventDispatcher {
    pub fn new(
        allowed_channel: impl Into<String>,
        agent: Arc<dyn AgentConnector>,
        directory: Arc<dyn ChannelDirectory>,
        publisher: Arc<dyn ReplyPublisher>,
    ) -> Self {
        Self {
            allowed_channel: allowed_channel.into(),
            agent,
            directory,
            publisher,
            renderer: MrkdwnRenderer::new(),
        }
    }

    /// At most one agent run per payload. Filtered payloads are deliberate
    /// no-ops; the same payload delivered twice runs twice (at-least-once,
    /// no dedup).
    pub async fn dispatch(&self, payload: &WebhookPayload, ctx: &EventContext) -> DispatchOutcome {
        match payload {
            WebhookPayload::UrlVerification { challenge } => {
                info!(
                    event_name = "dispatch.url_verification",
                    correlation_id = %ctx.correlation_id,
                    channel_id = "unknown",
                    thread_id = "unknown",
                    "echoing url verification challenge"
                );
                DispatchOutcome::challenge(challenge)
            }
            WebhookPayload::EventCallback { event } => self.dispatch_message(event, ctx).await,
            WebhookPayload::Other => {
                debug!(
                    event_name = "dispatch.unrecognized_payload",
                    correlation_id = %ctx.correlation_id,
                    channel_id = "unknown",
                    thread_id = "unknown",
                    "acknowledging unrecognized payload without side effects"
                );
                DispatchOutcome::ok()
            }
        }
    }

    async fn dispatch_message(&self, event: &MessageEvent, ctx: &EventContext) -> DispatchOutcome {
        let channel_id = event.channel.as_deref().unwrap_or("unknown");
        let thread_id = event.ts.as_deref().unwrap_or("unknown");

        if (event.kind != "message" && event.kind != "app_mention") || event.subtype.is_some() {
            debug!(
                event_name = "dispatch.event_ignored",
                correlation_id = %ctx.correlation_id,
                channel_id,
                thread_id,
                reason = IgnoreReason::UnsupportedEvent.label(),
                inner_type = %event.kind,
                "ignoring unsupported inner event"
            );
            return DispatchOutcome::ignored(IgnoreReason::UnsupportedEvent);
        }

        // Our own replies come back as events; reacting to them would loop.
        if event.bot_id.is_some() {
            debug!(
                event_name = "dispatch.event_ignored",
                correlation_id = %ctx.correlation_id,
                channel_id,
                thread_id,
                reason = IgnoreReason::BotAuthored.label(),
                "ignoring bot-authored message"
            );
            return DispatchOutcome::ignored(IgnoreReason::BotAuthored);
        }

        let (Some(channel_id), Some(thread_id)) = (event.channel.as_deref(), event.ts.as_deref())
        else {
            return DispatchOutcome::ignored(IgnoreReason::UnsupportedEvent);
        };

        let channel_name = match self.directory.channel_name(channel_id).await {
            Ok(name) => name,
            Err(lookup_error) => {
                warn!(
                    event_name = "dispatch.channel_lookup_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id,
                    thread_id,
                    error = %lookup_error,
                    "channel lookup failed; not processing"
                );
                return DispatchOutcome::ignored(IgnoreReason::ChannelNotAllowed);
            }
        };

        if channel_name != self.allowed_channel {
            warn!(
                event_name = "dispatch.event_ignored",
                correlation_id = %ctx.correlation_id,
                channel_id,
                thread_id,
                channel_name = %channel_name,
                reason = IgnoreReason::ChannelNotAllowed.label(),
                "message from non-allow-listed channel; not processing"
            );
            return DispatchOutcome::ignored(IgnoreReason::ChannelNotAllowed);
        }

        let text = match event.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => {
                warn!(
                    event_name = "dispatch.event_ignored",
                    correlation_id = %ctx.correlation_id,
                    channel_id,
                    thread_id,
                    reason = IgnoreReason::EmptyText.label(),
                    "no message text found in the event"
                );
                return DispatchOutcome::ignored(IgnoreReason::EmptyText);
            }
        };

        let request =
            AgentRequest { thread_id: thread_id.to_owned(), input_text: text.to_owned() };
        info!(
            event_name = "dispatch.agent_run_started",
            correlation_id = %ctx.correlation_id,
            channel_id,
            thread_id,
            "forwarding message to the agent"
        );

        match self.agent.run(&request).await {
            Ok(result) => {
                info!(
                    event_name = "dispatch.agent_run_completed",
                    correlation_id = %ctx.correlation_id,
                    channel_id,
                    thread_id,
                    message_count = result.messages.len(),
                    "agent run completed"
                );
                let rendered = self.renderer.render(&result.reply_text);
                self.deliver(channel_id, thread_id, &rendered, ctx).await;
                DispatchOutcome::ok()
            }
            Err(agent_error) => {
                warn!(
                    event_name = "dispatch.agent_run_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id,
                    thread_id,
                    error = %agent_error,
                    "agent run failed; replying with apology"
                );
                self.deliver(channel_id, thread_id, agent_error.user_message(), ctx).await;
                DispatchOutcome::error()
            }
        }
    }

    async fn deliver(&self, channel_id: &str, thread_id: &str, text: &str, ctx: &EventContext) {
        if let Err(publish_error) = self.publisher.post_reply(channel_id, thread_id, text).await {
            warn!(
                event_name = "egress.slack.reply_failed",
                correlation_id = %ctx.correlation_id,
                channel_id,
                thread_id,
                error = %publish_error,
                "reply delivery failed; not retried"
            );
        } else {
            debug!(
                event_name = "egress.slack.reply_posted",
                correlation_id = %ctx.correlation_id,
                channel_id,
                thread_id,
                "threaded reply posted"
            );
        }
    }
}

/// Dispatcher wired with inert collaborators, for offline smoke checks.
pub fn offline_dispatcher(allowed_channel: impl Into<String>) -> EventDispatcher {
    let allowed_channel = allowed_channel.into();
    EventDispatcher::new(
        allowed_channel.clone(),
        Arc::new(NoopAgentConnector),
        Arc::new(StaticChannelDirectory::new(allowed_channel)),
        Arc::new(NoopReplyPublisher),
    )
}
