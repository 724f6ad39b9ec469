//! Sentry webhook relay for Slack.
//!
//! This crate receives webhook notifications from Sentry's integration
//! platform and relays a formatted summary to a Slack channel:
//!
//! - Signature verification of the raw request body (`Sentry-Hook-Signature`)
//! - Typed decoding of the four supported resource payloads
//! - Block Kit formatting of each payload
//! - Delivery through Slack's `chat.postMessage` API
//! - An axum HTTP server wiring the pipeline together
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sentry_relay::{server, Config, SlackClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let slack = SlackClient::from_config(&config)?;
//! let app = server::build_router(server::AppState::new(config, Arc::new(slack)));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! See [`Config::from_env`] for the environment variables the service reads.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error variants are documented on the enums

pub mod blocks;
pub mod config;
pub mod error;
pub mod format;
pub mod payload;
pub mod server;
pub mod signature;
pub mod slack;

pub use blocks::{DisplayBlock, Field};
pub use config::Config;
pub use error::{ChannelError, RelayError};
pub use format::{format_payload, Icon};
pub use payload::{ResourceType, SentryPayload, WebhookEnvelope};
pub use signature::{verify_request, verify_webhook_signature, Verification};
pub use slack::{MessageSink, SlackClient};
