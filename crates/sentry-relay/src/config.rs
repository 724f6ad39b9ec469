//! Configuration for the relay service.

use std::env;
use std::time::Duration;

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Default maximum accepted webhook body size (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Relay configuration.
///
/// Built once at startup and handed to the server as part of its state.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Sentry client secret used to verify `Sentry-Hook-Signature`.
    ///
    /// Verification is skipped when unset.
    pub webhook_secret: Option<String>,
    /// Slack bot token used as the bearer credential.
    pub slack_token: String,
    /// Slack channel receiving every notification.
    pub channel_id: String,
    /// Slack Web API base URL (overridable for testing).
    pub slack_api_url: String,
    /// Timeout applied to the outbound Slack request.
    pub slack_timeout: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Whether this is a production deployment (hides error details).
    pub production: bool,
}

impl Config {
    /// Create a configuration with the given Slack credentials and defaults
    /// for everything else.
    #[must_use]
    pub fn new(slack_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            port: 8080,
            webhook_secret: None,
            slack_token: slack_token.into(),
            channel_id: channel_id.into(),
            slack_api_url: DEFAULT_SLACK_API_URL.to_string(),
            slack_timeout: Duration::from_secs(10),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            production: false,
        }
    }

    /// Set the webhook signing secret.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `SENTRY_CLIENT_SECRET`: webhook signing secret (empty means unset)
    /// - `SLACK_ACCESS_TOKEN`: Slack bot token
    /// - `CHANNEL_ID`: destination Slack channel
    /// - `SLACK_API_URL`: Slack Web API base URL
    /// - `SLACK_TIMEOUT_SECS`: outbound request timeout (default: 10, `0` means unset)
    /// - `RELAY_PORT`: HTTP port (default: 8080)
    /// - `RELAY_MAX_BODY_BYTES`: body size limit (default: 1 MiB, `0` means unset)
    /// - `RELAY_ENV`: `production` or `prod` hides error details
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env::var("RELAY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            webhook_secret: env::var("SENTRY_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            slack_token: env::var("SLACK_ACCESS_TOKEN").unwrap_or_default(),
            channel_id: env::var("CHANNEL_ID").unwrap_or_default(),
            slack_api_url: env::var("SLACK_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
            slack_timeout: Duration::from_secs(positive_var("SLACK_TIMEOUT_SECS").unwrap_or(10)),
            max_body_bytes: positive_var("RELAY_MAX_BODY_BYTES")
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            production: env::var("RELAY_ENV")
                .map(|v| v.eq_ignore_ascii_case("production") || v.eq_ignore_ascii_case("prod"))
                .unwrap_or(false),
        }
    }
}

/// Numeric variable that must be non-zero; zero or unparseable means unset.
fn positive_var<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|v: &T| *v != T::default())
}
