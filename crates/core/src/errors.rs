use thiserror::Error;

/// Failure modes of one upstream agent run. Every variant is recovered
/// locally by the dispatcher; none of them reach the chat surface.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent transport failure: {0}")]
    Transport(String),
    #[error("agent run timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("agent endpoint returned status {status}: {detail}")]
    UpstreamStatus { status: u16, detail: String },
    #[error("agent response could not be decoded: {0}")]
    MalformedResponse(String),
}

impl AgentError {
    /// Fixed user-facing apology. Internal detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        "Sorry, I ran into a problem while processing your message. Please try again."
    }
}
