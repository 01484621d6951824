//! Radio sync server (radiosync-server) - Main entry point
//!
//! Runs one shared radio timeline: accepts track requests over HTTP, acquires
//! media in the background, and broadcasts the schedule and server clock to
//! every listener over SSE.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use radiosync_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radiosync_server::acquisition::CommandAcquirer;
use radiosync_server::api::{self, AppContext};
use radiosync_server::clock::{EpochClock, SystemClock, TimesyncBroadcaster};
use radiosync_server::config::{Args, Config};
use radiosync_server::media::MediaRegistry;
use radiosync_server::playback::PlaybackCoordinator;
use radiosync_server::server::{self, Services};

/// Broadcast channel depth; slower observers drop the oldest events
const EVENT_CAPACITY: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments and resolve configuration
    let args = Args::parse();
    let config = Config::load(&args).context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG wins over the config file)
    let default_filter = config
        .log_level
        .clone()
        .unwrap_or_else(|| "radiosync_server=debug,tower_http=debug".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting radiosync-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Media directory: {}", config.media_dir.display());
    info!("Public base URL: {}", config.public_base_url);

    let events = EventBus::new(EVENT_CAPACITY);
    let clock: Arc<dyn EpochClock> = Arc::new(SystemClock);

    // Media registry + orphan sweeper
    let registry = Arc::new(MediaRegistry::new(config.registry_settings()));
    registry
        .ensure_media_dir()
        .await
        .context("Failed to create media directory")?;
    registry.start_sweeper();

    let acquirer = Arc::new(CommandAcquirer::new(config.command_settings()));
    let coordinator = PlaybackCoordinator::new(
        config.coordinator_settings(),
        events.clone(),
        Arc::clone(&registry),
        acquirer,
        Arc::clone(&clock),
    );

    let timesync = Arc::new(TimesyncBroadcaster::new(
        Arc::clone(&clock),
        events.clone(),
        config.timesync_interval,
    ));
    timesync.start();

    let shutdown = CancellationToken::new();
    let app = api::create_router(AppContext {
        coordinator: coordinator.clone(),
        registry: Arc::clone(&registry),
        events,
        clock,
        shutdown: shutdown.clone(),
    });

    let addr = config.socket_addr()?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Cleanup runs on the signal, before open event streams are closed
    let services = Services {
        coordinator,
        timesync,
        registry,
        shutdown,
    };
    server::serve(listener, app, services, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
