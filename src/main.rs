//! TrueCheckIA usage limits server.
//!
//! Loads configuration from the environment, picks a cache backend and
//! serves the rate limit API until Ctrl+C or SIGTERM.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use truecheckia::adapters::cache::select_cache_provider;
use truecheckia::adapters::http::{rate_limit_router, RateLimitAppState};
use truecheckia::config::{AppConfig, ServerConfig};
use truecheckia::ports::{Clock, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server)?;
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backend = select_cache_provider(&config, clock.clone()).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = backend.sweeper.map(|sweeper| {
        tokio::spawn(async move {
            sweeper.run(shutdown_rx).await;
        })
    });

    let state = RateLimitAppState::new(
        backend.provider.clone(),
        clock,
        config.server.admin_token.clone(),
    );
    let app = rate_limit_router(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        environment = ?config.server.environment,
        cache = backend.provider.backend_name(),
        "TrueCheckIA usage limits listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper_task {
        if let Err(e) = task.await {
            tracing::warn!("Cache sweeper ended abnormally: {}", e);
        }
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(server: &ServerConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&server.log_level))?;

    let fmt_layer = if server.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
    }
}
