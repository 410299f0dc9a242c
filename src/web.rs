//! HTTP server runner

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{self, ApiState};
use crate::config::ServerConfig;

/// Bind and serve the API until the process is stopped
pub async fn run(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(api::health))
        .nest("/api", api::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server running at http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
