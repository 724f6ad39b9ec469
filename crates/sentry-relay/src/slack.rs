//! Slack `chat.postMessage` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::blocks::DisplayBlock;
use crate::config::Config;
use crate::error::ChannelError;

/// Destination for composed messages.
///
/// [`SlackClient`] is the production implementation; the handler only sees
/// this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Post `blocks` to `channel`. A single attempt, no retries.
    async fn post_message(&self, channel: &str, blocks: &[DisplayBlock])
        -> Result<(), ChannelError>;
}

/// Slack Web API client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackClient {
    /// Create a client for the given API base URL and bot token.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        })
    }

    /// Create a client from the relay configuration.
    pub fn from_config(config: &Config) -> Result<Self, ChannelError> {
        Self::new(
            config.slack_api_url.clone(),
            config.slack_token.clone(),
            config.slack_timeout,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat.postMessage", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl MessageSink for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        blocks: &[DisplayBlock],
    ) -> Result<(), ChannelError> {
        let payload = PostMessageRequest { channel, blocks };

        debug!(
            channel = %channel,
            block_count = blocks.len(),
            "Posting message to Slack"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            warn!(
                status = %status,
                body = %body,
                "Slack request failed"
            );

            return Err(ChannelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Slack returns 200 for application-level errors; check the `ok` flag
        let reply: PostMessageResponse = response.json().await?;
        if reply.ok {
            debug!(channel = %channel, "Message posted to Slack");
            Ok(())
        } else {
            let error = reply.error.unwrap_or_else(|| "unknown_error".to_string());
            warn!(channel = %channel, error = %error, "Slack rejected message");
            Err(ChannelError::Api(error))
        }
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    blocks: &'a [DisplayBlock],
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}
