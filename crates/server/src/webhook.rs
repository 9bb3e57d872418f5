//! Request/response webhook host.
//!
//! One invocation per platform event. The URL-verification challenge is
//! answered synchronously inside the platform's short response budget;
//! event callbacks are either processed before the acknowledgment
//! (`process_before_response`, the FaaS pattern) or spawned after an
//! immediate 200. Agent failures never surface as 5xx once an event has
//! been accepted, so the platform has no reason to redeliver.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use herald_core::domain::{AgentConnector, AgentRequest};
use herald_slack::events::{
    DispatchStatus, EventContext, EventDispatcher, WebhookPayload,
};
use herald_slack::signature;

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<EventDispatcher>,
    pub agent: Arc<dyn AgentConnector>,
    pub signing_secret: SecretString,
    pub process_before_response: bool,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/agent/run", post(agent_run))
        .with_state(state)
}

async fn slack_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if !verify_request(&state, &headers, &body) {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            correlation_id = %correlation_id,
            channel_id = "unknown",
            thread_id = "unknown",
            "rejecting request with invalid signature"
        );
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid signature"})))
            .into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(parse_error) => {
            warn!(
                event_name = "ingress.slack.malformed_body",
                correlation_id = %correlation_id,
                channel_id = "unknown",
                thread_id = "unknown",
                error = %parse_error,
                "rejecting unparseable webhook body"
            );
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})))
                .into_response();
        }
    };

    let ctx = EventContext { correlation_id };

    // the challenge must come back raw and fast; it never leaves this task
    if matches!(payload, WebhookPayload::UrlVerification { .. }) {
        let outcome = state.dispatcher.dispatch(&payload, &ctx).await;
        let challenge = outcome.reply.unwrap_or_default();
        return (StatusCode::OK, challenge).into_response();
    }

    if state.process_before_response {
        let outcome = state.dispatcher.dispatch(&payload, &ctx).await;
        return (StatusCode::OK, Json(json!({"status": status_label(outcome.status)})))
            .into_response();
    }

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        // outcome detail is logged inside the dispatcher
        let _ = dispatcher.dispatch(&payload, &ctx).await;
    });

    (StatusCode::OK, Json(json!({"status": "accepted"}))).into_response()
}

fn verify_request(state: &WebhookState, headers: &HeaderMap, body: &[u8]) -> bool {
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());
    let provided = headers.get("x-slack-signature").and_then(|value| value.to_str().ok());

    let (Some(timestamp), Some(provided)) = (timestamp, provided) else {
        return false;
    };

    signature::verify(
        state.signing_secret.expose_secret(),
        timestamp,
        Utc::now().timestamp(),
        provided,
        body,
    )
}

fn status_label(status: DispatchStatus) -> &'static str {
    match status {
        DispatchStatus::Ok => "success",
        DispatchStatus::Ignored(_) => "ignored",
        DispatchStatus::Error => "error",
    }
}

#[derive(Debug, Deserialize)]
struct DirectRunRequest {
    #[serde(default)]
    message: String,
}

/// Direct invocation path: run the agent for one message without any Slack
/// context. Used for smoke checks against a deployed stack.
async fn agent_run(State(state): State<WebhookState>, body: Bytes) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let request: DirectRunRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})))
                .into_response();
        }
    };

    if request.message.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "message is required"})))
            .into_response();
    }

    info!(
        event_name = "ingress.direct.run_started",
        correlation_id = %correlation_id,
        channel_id = "unknown",
        thread_id = "unknown",
        "running direct agent invocation"
    );

    let agent_request =
        AgentRequest { thread_id: correlation_id.clone(), input_text: request.message };
    match state.agent.run(&agent_request).await {
        Ok(result) => {
            (StatusCode::OK, Json(json!({"response": result.reply_text}))).into_response()
        }
        Err(agent_error) => {
            error!(
                event_name = "ingress.direct.run_failed",
                correlation_id = %correlation_id,
                channel_id = "unknown",
                thread_id = "unknown",
                error = %agent_error,
                "direct agent invocation failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal server error"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use herald_core::domain::{
        AgentConnector, AgentMessage, AgentRequest, AgentResult, MessageRole,
    };
    use herald_core::errors::AgentError;
    use herald_slack::events::{
        EventDispatcher, PublishError, ReplyPublisher, StaticChannelDirectory,
    };
    use herald_slack::signature;

    use super::{router, WebhookState};

    const SECRET: &str = "test-signing-secret";
    const ALLOWED: &str = "all-ai-tools-testing";

    struct ScriptedAgent {
        requests: Mutex<Vec<AgentRequest>>,
        fail: bool,
    }

    impl ScriptedAgent {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { requests: Mutex::new(Vec::new()), fail })
        }
    }

    #[async_trait]
    impl AgentConnector for ScriptedAgent {
        async fn run(&self, request: &AgentRequest) -> Result<AgentResult, AgentError> {
            self.requests.lock().await.push(request.clone());
            if self.fail {
                return Err(AgentError::Transport("boom".to_owned()));
            }
            Ok(AgentResult::from_messages(vec![AgentMessage {
                role: MessageRole::Ai,
                content: "the final answer".to_owned(),
            }]))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        replies: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ReplyPublisher for RecordingPublisher {
        async fn post_reply(
            &self,
            channel_id: &str,
            thread_ts: &str,
            text: &str,
        ) -> Result<(), PublishError> {
            self.replies.lock().await.push((
                channel_id.to_owned(),
                thread_ts.to_owned(),
                text.to_owned(),
            ));
            Ok(())
        }
    }

    fn state(
        agent: Arc<ScriptedAgent>,
        publisher: Arc<RecordingPublisher>,
        process_before_response: bool,
    ) -> WebhookState {
        let dispatcher = Arc::new(EventDispatcher::new(
            ALLOWED,
            agent.clone(),
            Arc::new(StaticChannelDirectory::new(ALLOWED)),
            publisher,
        ));
        WebhookState {
            dispatcher,
            agent,
            signing_secret: SECRET.to_owned().into(),
            process_before_response,
        }
    }

    fn signed_request(body: &str) -> Request<Body> {
        let timestamp = Utc::now().timestamp();
        let signature = signature::compute(SECRET, timestamp, body.as_bytes())
            .expect("signature should compute");

        Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .header("x-slack-request-timestamp", timestamp.to_string())
            .header("x-slack-signature", signature)
            .body(Body::from(body.to_owned()))
            .expect("request should build")
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    fn message_body(text: &str) -> String {
        json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "user": "U1",
                "text": text,
                "ts": "1730000000.1000"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn challenge_is_answered_synchronously_with_raw_text() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher, false));

        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;
        let response =
            app.oneshot(signed_request(body)).await.expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        assert_eq!(&bytes[..], b"abc123");
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_before_parsing() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent.clone(), publisher, true));

        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("x-slack-request-timestamp", Utc::now().timestamp().to_string())
            .header("x-slack-signature", "v0=deadbeef")
            .body(Body::from(message_body("hello")))
            .expect("request should build");

        let response = app.oneshot(request).await.expect("handler should respond");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(agent.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_signature_headers_are_rejected() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher, true));

        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .body(Body::from(message_body("hello")))
            .expect("request should build");

        let response = app.oneshot(request).await.expect("handler should respond");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher, true));

        let response = app
            .oneshot(signed_request("{not json"))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn accepted_message_is_processed_before_the_response() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent.clone(), publisher.clone(), true));

        let response = app
            .oneshot(signed_request(&message_body("hello")))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"status": "success"}));

        let requests = agent.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].input_text, "hello");

        let replies = publisher.replies.lock().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, "1730000000.1000");
        assert_eq!(replies[0].2, "the final answer");
    }

    #[tokio::test]
    async fn bot_message_is_acknowledged_as_ignored() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent.clone(), publisher, true));

        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "bot_id": "B1",
                "text": "self reply",
                "ts": "1730000000.2000"
            }
        })
        .to_string();

        let response =
            app.oneshot(signed_request(&body)).await.expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"status": "ignored"}));
        assert!(agent.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn agent_failure_still_acknowledges_with_200() {
        let agent = ScriptedAgent::new(true);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher.clone(), true));

        let response = app
            .oneshot(signed_request(&message_body("hello")))
            .await
            .expect("handler should respond");

        // no 5xx once accepted: a retry would just fail the same way
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"status": "error"}));

        let replies = publisher.replies.lock().await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].2.starts_with("Sorry"));
        assert!(!replies[0].2.contains("boom"));
    }

    #[tokio::test]
    async fn deferred_mode_acknowledges_immediately_and_processes_after() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher.clone(), false));

        let response = app
            .oneshot(signed_request(&message_body("hello")))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"status": "accepted"}));

        let mut delivered = false;
        for _ in 0..50 {
            if publisher.replies.lock().await.len() == 1 {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(delivered, "spawned dispatch should deliver the reply");
    }

    #[tokio::test]
    async fn unknown_payload_type_is_acknowledged() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent.clone(), publisher, true));

        let response = app
            .oneshot(signed_request(r#"{"type":"app_rate_limited"}"#))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"status": "success"}));
        assert!(agent.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn direct_run_requires_a_message() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher, true));

        let request = Request::builder()
            .method("POST")
            .uri("/agent/run")
            .header("content-type", "application/json")
            .body(Body::from(r#"{}"#))
            .expect("request should build");

        let response = app.oneshot(request).await.expect("handler should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await, json!({"error": "message is required"}));
    }

    #[tokio::test]
    async fn direct_run_returns_the_agent_reply() {
        let agent = ScriptedAgent::new(false);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher, true));

        let request = Request::builder()
            .method("POST")
            .uri("/agent/run")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"how do I use the search API?"}"#))
            .expect("request should build");

        let response = app.oneshot(request).await.expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"response": "the final answer"}));
    }

    #[tokio::test]
    async fn direct_run_failure_is_a_generic_internal_error() {
        let agent = ScriptedAgent::new(true);
        let publisher = Arc::new(RecordingPublisher::default());
        let app = router(state(agent, publisher, true));

        let request = Request::builder()
            .method("POST")
            .uri("/agent/run")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"hello"}"#))
            .expect("request should build");

        let response = app.oneshot(request).await.expect("handler should respond");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_json(response).await, json!({"error": "internal server error"}));
    }
}
