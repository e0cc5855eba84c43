use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_hub::config::Config;
use notification_hub::gateway::hub::HubHandle;
use notification_hub::AppState;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env if present; variables may also be set externally.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notification_hub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    tracing::info!(
        queue_capacity = config.outbound_queue_capacity,
        ping_interval = ?config.ping_interval,
        pong_wait = ?config.pong_wait,
        "notification-hub configured"
    );

    let state = AppState::new(config);
    let hub = state.hub.clone();

    // Consumers are browsers and terminals on arbitrary origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(notification_hub::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "notification-hub listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    tracing::info!("notification-hub stopped");
    Ok(())
}

/// Resolve on SIGINT/SIGTERM, after asking the hub to close every session so
/// writers can send their close frames.
async fn shutdown_signal(hub: HubHandle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    match hub.shutdown().await {
        Ok(closed) => tracing::info!(closed, "closed live sessions"),
        Err(err) => tracing::warn!(%err, "hub already stopped"),
    }
}
