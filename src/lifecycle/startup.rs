//! Startup orchestration.
//!
//! Order matters: configuration, then logging and metrics, then the server,
//! and the listener last so no traffic arrives before everything is ready.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::watcher::ConfigWatcher;
use crate::config::ProxyConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::Shutdown;
use crate::observability::{logging, metrics};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub upstream_url: Option<String>,
}

/// Load the config file (or defaults), apply overrides and validate.
pub fn resolve_config(overrides: &Overrides) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &overrides.config_path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &overrides.bind_address {
        config.listener.bind_address = bind.clone();
    }
    if let Some(url) = &overrides.upstream_url {
        config.upstream.base_url = url.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Start logging and, if enabled, the metrics exporter.
pub fn init_observability(config: &ProxyConfig) {
    if let Err(e) = logging::init(&config.observability) {
        eprintln!("logging already initialized: {e}");
    }

    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse::<SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics exporter");
            }
        }
        Err(e) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            error = %e,
            "Failed to parse metrics address"
        ),
    }
}

/// Watch the config file, if there is one.
pub fn watch_config(
    path: Option<&Path>,
    config: &ProxyConfig,
) -> Result<(Option<RecommendedWatcher>, mpsc::UnboundedReceiver<ProxyConfig>), StartupError> {
    match path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            Ok((Some(watcher.run()?), updates))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            Ok((None, updates))
        }
    }
}

/// Run the proxy until SIGINT/SIGTERM.
pub async fn run(overrides: Overrides) -> Result<(), StartupError> {
    let config = resolve_config(&overrides)?;
    init_observability(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        max_active_calls = config.queue.max_active_calls,
        max_retries = config.queue.max_retries_per_window,
        "Configuration loaded"
    );

    let (_watcher, updates) = watch_config(overrides.config_path.as_deref(), &config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    server
        .run(listener, updates, shutdown.subscribe())
        .await
        .map_err(ServerError::from)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
