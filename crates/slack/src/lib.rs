//! Slack Integration - event ingestion and reply delivery
//!
//! This crate provides the Slack interface for herald:
//! - **Events** (`events`) - Webhook payload model and the event dispatcher
//! - **Web API** (`api`) - `conversations.info` lookup and threaded replies
//! - **Signatures** (`signature`) - Request-signing verification for webhooks
//! - **Socket Mode** (`socket`) - Long-lived connection runner (no public URL needed)
//! - **mrkdwn** (`mrkdwn`) - Markdown to Slack mrkdwn rendering
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Subscribe to `message.channels` events (Socket Mode or Request URL)
//! 3. Grant bot scopes: `channels:history`, `channels:read`, `chat:write`
//! 4. Set env vars: `HERALD_SLACK_BOT_TOKEN`, and `HERALD_SLACK_APP_TOKEN`
//!    (socket host) or `HERALD_SLACK_SIGNING_SECRET` (webhook host)
//!
//! # Architecture
//!
//! ```text
//! Slack Event → EventDispatcher → (filter) → AgentConnector → ReplyPublisher
//!                     ↓
//!               DispatchOutcome → host acknowledgment
//! ```
//!
//! Both hosts drive the same dispatcher; filtering and routing logic is
//! never duplicated per host.

pub mod api;
pub mod events;
pub mod mrkdwn;
pub mod signature;
pub mod socket;
