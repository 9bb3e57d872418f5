//! Slack Web API client: channel lookup and threaded reply delivery.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::events::{ChannelDirectory, DirectoryError, PublishError, ReplyPublisher};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

pub struct SlackApiClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct ConversationsInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<ChannelInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub name_normalized: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackApiClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
        }
    }
}

#[async_trait]
impl ChannelDirectory for SlackApiClient {
    async fn channel_name(&self, channel_id: &str) -> Result<String, DirectoryError> {
        let lookup_error = |detail: String| DirectoryError::Lookup {
            channel_id: channel_id.to_owned(),
            detail,
        };

        let response = self
            .http
            .get(format!("{}/conversations.info", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("channel", channel_id)])
            .send()
            .await
            .map_err(|send_error| lookup_error(send_error.to_string()))?
            .json::<ConversationsInfoResponse>()
            .await
            .map_err(|decode_error| lookup_error(decode_error.to_string()))?;

        if !response.ok {
            return Err(lookup_error(
                response.error.unwrap_or_else(|| "unknown slack api error".to_owned()),
            ));
        }

        response
            .channel
            .map(|channel| channel.name_normalized)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| lookup_error("response carried no channel name".to_owned()))
    }
}

#[async_trait]
impl ReplyPublisher for SlackApiClient {
    async fn post_reply(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), PublishError> {
        let delivery_error = |detail: String| PublishError::Delivery {
            channel_id: channel_id.to_owned(),
            detail,
        };

        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({
                "channel": channel_id,
                "thread_ts": thread_ts,
                "text": text,
            }))
            .send()
            .await
            .map_err(|send_error| delivery_error(send_error.to_string()))?
            .json::<PostMessageResponse>()
            .await
            .map_err(|decode_error| delivery_error(decode_error.to_string()))?;

        if !response.ok {
            return Err(delivery_error(
                response.error.unwrap_or_else(|| "unknown slack api error".to_owned()),
            ));
        }

        debug!(
            event_name = "egress.slack.post_message_ok",
            channel_id,
            thread_id = thread_ts,
            "chat.postMessage accepted"
        );
        Ok(())
    }
}
