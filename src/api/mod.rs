//! Thin Axum layer in front of the engine (§9 module map: "API boundary
//! (thin)"). Mounts exactly what the live push hub needs: a health check,
//! the push endpoint, and the WebSocket upgrade — the REST/WebSocket
//! transport framing for monitor/channel CRUD is out of scope (§1).

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod websocket;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;

#[cfg(feature = "api")]
use axum::{routing::get, Router};
use std::net::SocketAddr;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            enable_cors: true,
        }
    }
}

/// Spawns the API server in a background task, returning its bound address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::trace::TraceLayer;
    use tracing::info;

    info!("starting API server on {}", config.bind_addr);

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/push/:monitor_id", get(routes::push::record_push).post(routes::push::record_push))
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        use tower_http::cors::{Any, CorsLayer};
        app = app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
