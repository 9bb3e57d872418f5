use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use herald_core::domain::{AgentConnector, AgentMessage, AgentRequest, AgentResult};
use herald_core::errors::AgentError;

const MAX_ERROR_DETAIL_LEN: usize = 256;

/// HTTP client for the upstream agent's run endpoint. The timeout bounds
/// the otherwise open-ended blocking wait for a terminal state.
pub struct HttpAgentClient {
    http: Client,
    base_url: String,
    assistant_id: String,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct RunSubmission<'a> {
    assistant_id: &'a str,
    input: RunInput<'a>,
}

#[derive(Debug, Serialize)]
struct RunInput<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunCompletion {
    #[serde(default)]
    messages: Vec<AgentMessage>,
}

impl HttpAgentClient {
    pub fn new(
        base_url: impl Into<String>,
        assistant_id: impl Into<String>,
        api_key: Option<SecretString>,
        timeout_secs: u64,
    ) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|build_error| AgentError::Transport(build_error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            assistant_id: assistant_id.into(),
            api_key,
            timeout_secs,
        })
    }
}

#[async_trait]
impl AgentConnector for HttpAgentClient {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResult, AgentError> {
        let submission = RunSubmission {
            assistant_id: &self.assistant_id,
            input: RunInput { message: &request.input_text },
        };

        let mut call = self.http.post(format!("{}/runs/wait", self.base_url)).json(&submission);
        if let Some(api_key) = &self.api_key {
            call = call.bearer_auth(api_key.expose_secret());
        }

        let response = call.send().await.map_err(|send_error| {
            if send_error.is_timeout() {
                AgentError::Timeout { timeout_secs: self.timeout_secs }
            } else {
                AgentError::Transport(send_error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamStatus {
                status: status.as_u16(),
                detail: truncate_detail(detail),
            });
        }

        let completion = response
            .json::<RunCompletion>()
            .await
            .map_err(|decode_error| AgentError::MalformedResponse(decode_error.to_string()))?;

        debug!(
            event_name = "agent.run_completed",
            assistant_id = %self.assistant_id,
            message_count = completion.messages.len(),
            "agent run reached terminal state"
        );

        Ok(AgentResult::from_messages(completion.messages))
    }
}

fn truncate_detail(detail: String) -> String {
    if detail.len() <= MAX_ERROR_DETAIL_LEN {
        return detail;
    }

    let mut cut = MAX_ERROR_DETAIL_LEN;
    while !detail.is_char_boundary(cut) {
        cut -= 1;
    }
    detail[..cut].to_owned()
}
