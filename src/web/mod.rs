//! Web server module

pub mod auth;
pub mod middleware;
mod routes;

use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::proxy::ProxyService;

pub struct AppState {
    pub db: Database,
    pub proxy: ProxyService,
}

/// Paths that match no route
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html("<!DOCTYPE html><html><head><title>404 Not Found</title></head><body><h1>Not Found</h1><p>The requested URL was not found on this server.</p></body></html>"),
    )
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sites", get(routes::api_list_sites).post(routes::api_create_site))
        .route("/api/statistics", get(routes::api_statistics))
        // Everything else with at least two segments goes through the proxy
        .route("/:site_name/*url_path", get(routes::proxy_page))
        .fallback(not_found)
        .layer(middleware::RequestLoggingLayer::new())
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);

    let addr = config.bind_addr();
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
