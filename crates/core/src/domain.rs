use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Reply used when a completed run carries no agent-authored fragment.
pub const FALLBACK_REPLY: &str = "I processed your message successfully.";

/// One forwarded workspace message. Exactly one request is built per
/// accepted inbound event; `thread_id` anchors the eventual reply and is
/// never sent upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentRequest {
    pub thread_id: String,
    pub input_text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum MessageRole {
    Human,
    Ai,
    System,
    Tool,
    Other,
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "human" => Self::Human,
            "ai" => Self::Ai,
            "system" => Self::System,
            "tool" => Self::Tool,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(rename = "type")]
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
}

/// Terminal output of one upstream run: the ordered role-tagged fragments
/// plus the reply derived from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentResult {
    pub reply_text: String,
    pub messages: Vec<AgentMessage>,
}

impl AgentResult {
    /// The reply is the last agent-authored fragment. A run that finishes
    /// without one still yields a usable reply rather than an error.
    pub fn from_messages(messages: Vec<AgentMessage>) -> Self {
        let reply_text = messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::Ai)
            .map(|message| message.content.clone())
            .unwrap_or_else(|| FALLBACK_REPLY.to_owned());

        Self { reply_text, messages }
    }
}

/// Stateless request/response capability of the upstream agent service.
/// Each call starts a fresh run; no conversational memory is assumed.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResult, AgentError>;
}
