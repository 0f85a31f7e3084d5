//! Service entry point: configuration, startup, serving, and shutdown.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use scangate::api::{self, AppState};
use scangate::{Config, DetectionCache, Metrics, Scanner};

/// How long inflight scans may drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--version" || arg == "-v") {
        println!("scangate {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "Fatal startup error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let level = match std::env::var("LOG_LEVEL").as_deref() {
        Ok("debug") => tracing::Level::DEBUG,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_env()?);

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tracing::info!(path = %config.upload_dir.display(), "Upload directory ready");

    let cache = DetectionCache::with_defaults();
    let scanner = Arc::new(Scanner::new(Arc::clone(&config), cache));
    scanner.start().await;

    for health in scanner.check_health().await {
        if health.healthy {
            tracing::info!(engine = %health.engine, "Engine is healthy");
        } else {
            tracing::warn!(engine = %health.engine, error = ?health.error, "Engine is unhealthy");
        }
    }

    let state = AppState {
        scanner: Arc::clone(&scanner),
        config: Arc::clone(&config),
        metrics: Arc::new(Metrics::new()),
    };
    let app = api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        port = config.port,
        engine = %config.active_engine,
        "AV scanner service started"
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    let graceful = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .into_future();
    let grace_expired = async {
        shutdown.cancelled().await;
        tracing::info!("Shutting down server");
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        result = graceful => result?,
        _ = grace_expired => {
            tracing::warn!("Shutdown grace period expired with requests still inflight");
        }
    }

    scanner.stop();
    tracing::info!("Server exited");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
