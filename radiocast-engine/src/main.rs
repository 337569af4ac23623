//! Radiocast engine (radiocast-engine) - main entry point
//!
//! Loads configuration, wires the catalog, narration resolver and device
//! bridge into a `RadioEngine`, and serves the HTTP control surface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use radiocast_common::events::EventBus;
use radiocast_engine::api::{self, AppContext};
use radiocast_engine::assets::{LocalDirResolver, NarrationResolver, PublicUrlResolver};
use radiocast_engine::catalog::{CatalogSource, StaticCatalog};
use radiocast_engine::config::TomlConfig;
use radiocast_engine::device::{DeviceControl, HttpDeviceBridge, LoggingDevice};
use radiocast_engine::RadioEngine;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Narration directory used when neither a URL nor a root is configured
const DEFAULT_NARRATION_DIR: &str = "narration";

/// Command-line arguments for radiocast-engine
#[derive(Parser, Debug)]
#[command(name = "radiocast-engine")]
#[command(about = "Narrated radio sequencing engine")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "RADIOCAST_PORT")]
    port: Option<u16>,

    /// Configuration file
    #[arg(short, long, env = "RADIOCAST_CONFIG")]
    config: Option<PathBuf>,

    /// JSON catalog file (overrides config file)
    #[arg(long, env = "RADIOCAST_CATALOG")]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config: TomlConfig = radiocast_common::config::load_or_default(
        args.config.as_deref(),
        "RADIOCAST_CONFIG",
        "radiocast",
    )
    .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("radiocast_engine={0},radiocast_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting radiocast-engine v{}", env!("CARGO_PKG_VERSION"));
    config.validate().context("Invalid configuration")?;

    let port = args.port.unwrap_or(config.port);
    let catalog = build_catalog(args.catalog.or_else(|| config.catalog_path.clone()))?;
    let resolver = build_resolver(&config);
    let device = build_device(&config)?;

    let engine = Arc::new(RadioEngine::new(
        config.engine_settings(),
        catalog,
        resolver,
        device,
        Arc::new(EventBus::default()),
    ));
    info!("Radio engine initialized");

    let ctx = AppContext {
        engine: Arc::clone(&engine),
        port,
    };
    api::server::run(ctx, shutdown_signal())
        .await
        .context("Server error")?;

    engine.stop().await;
    info!("Server shutdown complete");
    Ok(())
}

fn build_catalog(path: Option<PathBuf>) -> Result<Arc<dyn CatalogSource>> {
    match path {
        Some(path) => {
            let catalog = StaticCatalog::from_json_file(&path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?;
            info!("Catalog loaded from {}", path.display());
            Ok(Arc::new(catalog))
        }
        None => {
            warn!("No catalog configured; every sequence will be empty");
            Ok(Arc::new(StaticCatalog::new()))
        }
    }
}

fn build_resolver(config: &TomlConfig) -> Arc<dyn NarrationResolver> {
    let narration = &config.narration;
    if let Some(root) = &narration.local_root {
        info!("Narration assets from {}", root.display());
        Arc::new(LocalDirResolver::new(root.clone()))
    } else if let Some(url) = &narration.public_base_url {
        info!("Narration assets from {}", url);
        Arc::new(PublicUrlResolver::new(url.clone()))
    } else {
        warn!(
            "No narration source configured, looking in ./{}",
            DEFAULT_NARRATION_DIR
        );
        Arc::new(LocalDirResolver::new(DEFAULT_NARRATION_DIR))
    }
}

fn build_device(config: &TomlConfig) -> Result<Arc<dyn DeviceControl>> {
    match &config.device.bridge_url {
        Some(url) => {
            let timeout = Duration::from_millis(config.device.request_timeout_ms);
            let bridge = HttpDeviceBridge::new(url, timeout).context("Failed to build device bridge")?;
            Ok(Arc::new(bridge))
        }
        None => {
            info!("No device bridge configured; device commands are logged only");
            Ok(Arc::new(LoggingDevice))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
