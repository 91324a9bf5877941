use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use chrono::Duration;
use crate::storage::EdgeStore;

pub mod routes;

/// Server state
///
/// The store sits behind an async mutex because one rusqlite
/// connection serves all handlers; no handler awaits while holding it.
pub struct AppState {
    pub store: Mutex<EdgeStore>,
    pub stuck_threshold: Duration,
}

pub async fn start_server(
    port: u16,
    database_path: PathBuf,
    stuck_threshold: Duration,
) -> anyhow::Result<()> {
    let store = EdgeStore::open(&database_path)?;
    let state = Arc::new(AppState {
        store: Mutex::new(store),
        stuck_threshold,
    });

    let app = Router::new()
        .route("/edges", put(routes::upsert_edge).get(routes::list_edges))
        .route("/items/presence", get(routes::item_presence))
        .route("/items/presence/batch", post(routes::batch_presence))
        .route("/collections/{id}/presence", get(routes::collection_presence))
        .route(
            "/collections/{id}/presence/refresh",
            post(routes::refresh_collection),
        )
        .route("/sync-status", get(routes::sync_status))
        .route("/stats", get(routes::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting query service on {}", addr);
    println!("🌍 Query service running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
