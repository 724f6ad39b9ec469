//! Error types for the relay.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::error::Error as StdError;
use thiserror::Error;

/// Errors that can occur when posting a message to Slack.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack accepted the request but reported `ok: false`
    #[error("Slack API error: {0}")]
    Api(String),

    /// Slack answered with a non-success HTTP status
    #[error("Slack returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors surfaced by the webhook handler.
///
/// Every variant maps to an HTTP response; nothing is retried.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The webhook endpoint only accepts `POST`.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Signature header missing or not matching the body.
    #[error("Invalid signature")]
    SignatureInvalid,

    /// The body is not a JSON object.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Slack rejected the message or could not be reached.
    #[error("Failed to deliver notification: {0}")]
    NotificationDeliveryFailed(#[from] ChannelError),

    /// Anything else that prevented the relay from completing.
    #[error("{0}")]
    Unhandled(String),
}

impl RelayError {
    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::MalformedPayload(_)
            | Self::NotificationDeliveryFailed(_)
            | Self::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the JSON response returned to Sentry.
    ///
    /// With `expose_details` set, internal errors also carry the error source
    /// chain under `details`. Production deployments leave it off.
    #[must_use]
    pub fn into_http_response(self, expose_details: bool) -> Response {
        let status = self.status_code();

        let body = match &self {
            Self::MethodNotAllowed | Self::SignatureInvalid => json!({ "error": self.to_string() }),
            _ => {
                let mut body = json!({
                    "error": "Internal server error",
                    "message": self.to_string(),
                });
                if expose_details {
                    body["details"] = Value::from(self.source_chain());
                }
                body
            }
        };

        (status, Json(body)).into_response()
    }

    fn source_chain(&self) -> Vec<String> {
        let mut chain = vec![format!("{self:?}")];
        let mut source = StdError::source(self);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain
    }
}
