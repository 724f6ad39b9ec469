//! Sentry relay binary.
//!
//! Standalone HTTP service receiving Sentry webhooks and posting them to Slack.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentry_relay::{server, Config, SlackClient};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "sentry-relay", version, about = "Relay Sentry webhooks to Slack")]
struct Cli {
    /// Port to listen on (overrides RELAY_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    info!("Starting Sentry relay...");

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }

    if config.webhook_secret.is_none() {
        warn!("SENTRY_CLIENT_SECRET is not set. Webhook signatures will not be verified.");
    }
    if config.slack_token.is_empty() {
        warn!("SLACK_ACCESS_TOKEN is not set. Slack will reject notifications.");
    }
    if config.channel_id.is_empty() {
        warn!("CHANNEL_ID is not set. Webhooks will fail until it is configured.");
    }

    let slack = SlackClient::from_config(&config).context("Failed to create Slack client")?;
    let port = config.port;
    let app = server::build_router(server::AppState::new(config, Arc::new(slack)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = port, "Sentry relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Sentry relay stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("sentry_relay=info".parse()?)
        .add_directive("tower_http=info".parse()?);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
