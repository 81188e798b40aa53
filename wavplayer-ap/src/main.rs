//! Audio Player (wavplayer-ap) - Main entry point
//!
//! Loads configuration, starts the player service and serves the HTTP API
//! until Ctrl+C / SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wavplayer_ap::api::{self, AppState};
use wavplayer_ap::audio::CpalBackend;
use wavplayer_ap::config::{Args, Config};
use wavplayer_ap::PlayerService;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args).context("Failed to load configuration")?;

    init_tracing(&config)?;

    info!(
        "Starting wavplayer-ap v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        config.http_port
    );
    info!("Audio files directory: {}", config.wav_dir.display());
    info!("Audio device: {}", config.audio_device);
    info!("Player uuid: {}", config.player_uuid);

    let backend = Arc::new(CpalBackend::new(config.playback.sink_buffer_ms));
    let (player, service_thread) =
        PlayerService::spawn(backend, &config).context("Failed to start player service")?;
    info!("Player service initialized");

    let app_state = AppState {
        player: player.clone(),
        wav_dir: config.wav_dir.clone(),
        player_uuid: config.player_uuid.clone(),
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let shutdown_player = player.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends the status broadcast so open SSE streams close
            if let Err(e) = shutdown_player.shutdown().await {
                warn!("Player service shutdown failed: {}", e);
            }
        })
        .await
        .context("Server error")?;

    drop(player);
    if service_thread.join().is_err() {
        warn!("Player service thread panicked");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Install the tracing subscriber: `RUST_LOG` wins over the configured level
fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
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
