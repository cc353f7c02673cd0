//! # huddle
//!
//! huddle server binary: wires the bus, both session state services and the
//! connection gateway into one process and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_core::logging::{self, LogFormat};
use huddle_gateway::{GatewayConfig, GatewayServer};
use huddle_settings::HuddleSettings;
use huddle_state::{Chat, ChatService, Workspace, WorkspaceService};

/// huddle collaboration server.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "Real-time chat and shared workspace server")]
struct Cli {
    /// Settings file (defaults to `~/.huddle/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Load layered settings, then apply CLI flags on top.
    fn settings(&self) -> Result<HuddleSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(huddle_settings::settings_path);
        let mut settings = huddle_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let format = settings
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or_default();
    logging::init_subscriber(&settings.logging.level, format);

    let metrics = match huddle_gateway::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let bus = huddle_bus::connect(&settings.bus.url, settings.bus.subscription_capacity)
        .with_context(|| format!("Failed to connect to bus at {}", settings.bus.url))?;

    let chat = huddle_state::start(Arc::new(ChatService::new(Chat, bus.clone())))
        .await
        .context("Failed to start chat service")?;
    let workspace = huddle_state::start(Arc::new(WorkspaceService::new(Workspace, bus.clone())))
        .await
        .context("Failed to start workspace service")?;

    let mut server = GatewayServer::new(GatewayConfig::from_settings(&settings), bus.clone());
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }
    let ingest = server
        .start_ingest()
        .await
        .context("Failed to subscribe to broadcasts")?;
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("huddle listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let _ = server.begin_shutdown();
    let _ = handle.await;
    ingest.stop().await;
    chat.stop().await;
    workspace.stop().await;
    bus.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_flags_are_optional() {
        let cli = Cli::parse_from(["huddle"]);
        assert!(cli.config.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn cli_flags_override_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"host": "10.0.0.1", "port": 7000}}}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let cli = Cli::parse_from(["huddle", "--config", &path, "--port", "8123"]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.server.host, "10.0.0.1");
        assert_eq!(settings.server.port, 8123);
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let cli = Cli::parse_from(["huddle", "--config", &path]);
        let err = cli.settings().unwrap_err();
        assert!(err.to_string().contains("Failed to load settings"));
    }
}
