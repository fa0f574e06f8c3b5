//! Endpoints Proxy: local development front for Endpoints style APIs.
//!
//! Accepts REST and JSON-RPC calls under `/_ah/api/` and forwards them to the
//! backend SPI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use endpoints_proxy::{ProxyConfig, ProxyService, ReqwestTransport};

/// Endpoints Proxy: REST and JSON-RPC front for a local API backend
#[derive(Parser, Debug)]
#[command(name = "endpoints-proxy")]
#[command(about = "Local development proxy for Endpoints style APIs", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides the config file)
    #[arg(long)]
    host: Option<std::net::IpAddr>,

    /// Port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend host serving `/_ah/spi/*`
    #[arg(long)]
    backend_url: Option<String>,

    /// Discovery document generator host
    #[arg(long)]
    discovery_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &Args) -> Result<ProxyConfig> {
    let mut config = match &args.config {
        Some(path) => ProxyConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ProxyConfig::default(),
    };

    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(url) = &args.backend_url {
        config.backend.url = url.clone();
    }
    if let Some(url) = &args.discovery_url {
        config.discovery.url = url.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;
    info!(
        addr = %config.http_addr(),
        backend = %config.backend.url,
        "Loaded configuration"
    );

    let transport = ReqwestTransport::from_config(&config).context("building HTTP client")?;
    let service = ProxyService::new(config, Arc::new(transport))?;

    service
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
