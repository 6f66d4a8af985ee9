mod config;
mod endpoint;
mod keepalive;
mod matchmaker;
mod registry;
mod rng;
mod room;
mod session;

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ServerError, load_port};
use crate::registry::Registry;

#[tokio::main]
/// Initializes tracing, spawns the keep-alive sweep, and serves the three
/// routes a peer ever talks to: a liveness page, a health check, and the
/// WebSocket upgrade itself.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let port = match load_port() {
        Ok(port) => port,
        Err(err) => {
            tracing::error!(%err, "invalid server configuration");
            std::process::exit(1);
        }
    };

    let registry = Registry::new();
    tokio::spawn(keepalive::run(registry.clone()));

    let app = Router::new()
        .route("/", get(|| async { "pong-server-ok" }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/ws", get(websocket_handler))
        .with_state(registry);

    let addr = format!("0.0.0.0:{port}");
    let listener = match bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, "failed to start server");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "pong server listening");
    axum::serve(listener, app).await.expect("server loop exited");
}

async fn bind(addr: &str) -> Result<tokio::net::TcpListener, ServerError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.to_owned(), source })
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<Registry>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket: WebSocket| endpoint::handle_connection(socket, registry))
}
