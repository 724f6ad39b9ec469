//! HTTP server for Sentry webhooks.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn, Level};

use crate::config::Config;
use crate::error::RelayError;
use crate::format::format_payload;
use crate::payload::{ResourceType, WebhookEnvelope};
use crate::signature::{verify_request, Verification};
use crate::slack::MessageSink;

/// Header naming the webhook resource.
pub const RESOURCE_HEADER: &str = "sentry-hook-resource";

/// Header carrying the hex HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "sentry-hook-signature";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Arc<Config>,
    /// Where composed messages are sent.
    pub sink: Arc<dyn MessageSink>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }
}

/// Build the HTTP router for the relay.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/webhooks/sentry", any(sentry_webhook_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "sentry-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// How a webhook that passed validation was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Message posted to Slack.
    Delivered,
    /// Resource type not handled; nothing was sent.
    Ignored { resource: String },
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let body = match self {
            Self::Delivered => json!({
                "success": true,
                "message": "Notification sent to Slack"
            }),
            Self::Ignored { resource } => json!({
                "success": true,
                "message": "Webhook received but not processed",
                "resource": resource
            }),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

/// Handle incoming Sentry webhooks.
///
/// This handler:
/// 1. Rejects anything but `POST`
/// 2. Verifies the body signature (if a secret is configured)
/// 3. Acknowledges unsupported resources without notifying
/// 4. Decodes, formats and posts the message to Slack
pub async fn sentry_webhook_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process_webhook(&state, &method, &headers, &body).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(error = %err, "Failed to process Sentry webhook");
            }
            err.into_http_response(!state.config.production)
        }
    }
}

async fn process_webhook(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Outcome, RelayError> {
    if *method != Method::POST {
        warn!(method = %method, "Rejecting non-POST webhook request");
        return Err(RelayError::MethodNotAllowed);
    }

    let resource_header = header_str(headers, RESOURCE_HEADER);
    let signature = header_str(headers, SIGNATURE_HEADER);

    info!(
        resource = resource_header.unwrap_or("unknown"),
        body_bytes = body.len(),
        "Received Sentry webhook"
    );

    match verify_request(body, signature, state.config.webhook_secret.as_deref()) {
        Verification::Verified => debug!("Webhook signature verified"),
        Verification::Skipped => {
            warn!("No webhook secret configured, skipping signature verification");
        }
        Verification::MissingSignature => {
            warn!("Missing Sentry-Hook-Signature header");
            return Err(RelayError::SignatureInvalid);
        }
        Verification::Mismatch => {
            warn!("Invalid webhook signature");
            return Err(RelayError::SignatureInvalid);
        }
    }

    let Some(resource) = resource_header.and_then(ResourceType::parse) else {
        let resource = resource_header.unwrap_or_default().to_string();
        info!(resource = %resource, "Ignoring unsupported Sentry resource");
        return Ok(Outcome::Ignored { resource });
    };

    let envelope = WebhookEnvelope::from_slice(resource, body)?;
    let payload = envelope.decode();
    let blocks = format_payload(&payload);

    debug!(
        resource = %resource,
        action = %envelope.action,
        title = %payload.title(),
        block_count = blocks.len(),
        "Formatted Sentry webhook"
    );

    let channel = state.config.channel_id.as_str();
    if channel.is_empty() {
        return Err(RelayError::Unhandled(
            "CHANNEL_ID is not configured".to_string(),
        ));
    }

    state.sink.post_message(channel, &blocks).await?;

    info!(
        resource = %resource,
        action = %envelope.action,
        channel = %channel,
        "Notification sent to Slack"
    );

    Ok(Outcome::Delivered)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::signature::compute_signature;
    use crate::slack::MockMessageSink;
    use axum::http::HeaderValue;

    const ISSUE_BODY: &[u8] =
        br#"{"action":"resolved","data":{"issue":{"title":"X","status":"resolved","count":5,"userCount":2}}}"#;

    fn state_with(sink: MockMessageSink, config: Config) -> AppState {
        AppState::new(config, Arc::new(sink))
    }

    fn headers(resource: &str, signature: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RESOURCE_HEADER, HeaderValue::from_str(resource).unwrap());
        if let Some(sig) = signature {
            headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(sig).unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn test_non_post_never_notifies() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message().times(0);
        let state = state_with(sink, Config::new("xoxb", "C1"));

        let result =
            process_webhook(&state, &Method::GET, &headers("issue", None), ISSUE_BODY).await;
        assert!(matches!(result, Err(RelayError::MethodNotAllowed)));
    }

    #[tokio::test]
    async fn test_unknown_resource_never_notifies() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message().times(0);
        let state = state_with(sink, Config::new("xoxb", "C1"));

        let result = process_webhook(
            &state,
            &Method::POST,
            &headers("installation", None),
            ISSUE_BODY,
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            Outcome::Ignored {
                resource: "installation".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_resource_header_is_ignored() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message().times(0);
        let state = state_with(sink, Config::new("xoxb", "C1"));

        let result = process_webhook(&state, &Method::POST, &HeaderMap::new(), ISSUE_BODY)
            .await
            .unwrap();
        assert_eq!(
            result,
            Outcome::Ignored {
                resource: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_signature_checked_before_dispatch() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message().times(0);
        let state = state_with(sink, Config::new("xoxb", "C1").with_webhook_secret("s3cret"));

        let result = process_webhook(
            &state,
            &Method::POST,
            &headers("installation", None),
            ISSUE_BODY,
        )
        .await;
        assert!(matches!(result, Err(RelayError::SignatureInvalid)));

        let result = process_webhook(
            &state,
            &Method::POST,
            &headers("issue", Some("deadbeef")),
            ISSUE_BODY,
        )
        .await;
        assert!(matches!(result, Err(RelayError::SignatureInvalid)));
    }

    #[tokio::test]
    async fn test_signed_issue_is_delivered_once() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message()
            .withf(|channel, blocks| channel.to_string() == "C1" && blocks.len() == 3)
            .times(1)
            .returning(|_, _| Ok(()));
        let state = state_with(sink, Config::new("xoxb", "C1").with_webhook_secret("s3cret"));

        let sig = compute_signature(ISSUE_BODY, "s3cret").unwrap();
        let result = process_webhook(
            &state,
            &Method::POST,
            &headers("issue", Some(&sig)),
            ISSUE_BODY,
        )
        .await
        .unwrap();
        assert_eq!(result, Outcome::Delivered);
    }

    #[tokio::test]
    async fn test_delivery_failure_propagates() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message()
            .times(1)
            .returning(|_, _| Err(ChannelError::Api("channel_not_found".to_string())));
        let state = state_with(sink, Config::new("xoxb", "C1"));

        let err = process_webhook(&state, &Method::POST, &headers("issue", None), ISSUE_BODY)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotificationDeliveryFailed(_)));
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_server_error() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message().times(0);
        let state = state_with(sink, Config::new("xoxb", "C1"));

        let err = process_webhook(&state, &Method::POST, &headers("error", None), b"not json")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_channel_is_unhandled() {
        let mut sink = MockMessageSink::new();
        sink.expect_post_message().times(0);
        let state = state_with(sink, Config::new("xoxb", ""));

        let err = process_webhook(&state, &Method::POST, &headers("issue", None), ISSUE_BODY)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Unhandled(_)));
    }
}
