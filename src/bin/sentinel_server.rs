//! Sentinel Monitor Service Binary
//!
//! Runs the monitoring backend as an HTTP service with production-grade
//! features:
//! - Structured JSON or pretty logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown that drains in-flight worker pool tasks
//! - Health check endpoints
//!
//! ## Configuration
//!
//! See [`sentinel_monitor::config::Config::from_env`] for the full list of
//! environment variables.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use sentinel_monitor::config::Config;
use sentinel_monitor::service::{build_router, AppState};
use sentinel_monitor::store::PostgresStore;

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sentinel_monitor=info,tower_http=info,sqlx=warn".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env().map_err(|e| {
        // Logging is not initialized yet; this is the one place stderr is appropriate.
        eprintln!("fatal: {e}");
        e
    })?;

    init_tracing(&config.log_format);

    let version = env!("CARGO_PKG_VERSION");
    info!(version, "starting sentinel-monitor");

    info!("connecting to PostgreSQL...");
    let connect_start = Instant::now();
    let store = match tokio::time::timeout(
        std::time::Duration::from_secs(30),
        PostgresStore::new(&config.database),
    )
    .await
    {
        Ok(Ok(store)) => store,
        Ok(Err(e)) => {
            error!(error = %e, "failed to connect to PostgreSQL");
            return Err(e.into());
        }
        Err(_) => {
            error!("PostgreSQL connection timeout after 30s");
            return Err("database connection timeout".into());
        }
    };
    info!(latency_ms = connect_start.elapsed().as_millis() as u64, "PostgreSQL connection established");

    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), Arc::new(store));
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(address = %addr, version, "sentinel-monitor listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install ctrl+c handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received ctrl+c, initiating graceful shutdown"),
            _ = terminate => info!("received SIGTERM, initiating graceful shutdown"),
        }
    };

    info!("ready to accept connections");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    info!("sentinel-monitor shutdown complete");

    Ok(())
}
