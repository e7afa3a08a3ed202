//! # huddle
//!
//! Huddle server binary: resolves configuration, installs logging and
//! serves the poll until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_server::config::ServerConfig;
use huddle_server::server::HuddleServer;

/// Live group feedback server.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "Live group feedback server")]
struct Cli {
    /// Host to bind (overrides settings and `HUDDLE_HOST`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings and `HUDDLE_PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn resolve_config(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())
            .context("Failed to load settings")?;
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    huddle_server::logging::init_subscriber(&args.log_level);

    let config = args.resolve_config()?;
    let shutdown_timeout = config.shutdown_timeout();
    tracing::debug!(?config, "configuration resolved");

    let server = Arc::new(HuddleServer::new(config));
    let listener = server
        .bind()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;

    let serving = Arc::clone(&server);
    let handle = tokio::spawn(async move {
        if let Err(e) = serving.run(listener).await {
            tracing::error!(error = %e, "server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;
    tracing::info!("Shutting down");

    server
        .shutdown()
        .graceful_shutdown(vec![handle], shutdown_timeout)
        .await;
    Ok(())
}
