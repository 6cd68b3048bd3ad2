pub mod handlers;

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::index::cache::InvalidationCache;
use crate::index::notifier::ChangeNotifier;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub cache: InvalidationCache,
    pub notifier: ChangeNotifier,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/index.json", get(handlers::index_json))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Runs the HTTP server until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("story index server listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
