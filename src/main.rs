//! siteproxy server entry point

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use siteproxy::config::Config;
use siteproxy::db::{Database, SiteStore};
use siteproxy::proxy::{Fetcher, ProxyService};
use siteproxy::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting siteproxy...");

    let db = Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    let fetcher = Fetcher::new(&config.fetcher)?;
    let store: Arc<dyn SiteStore> = Arc::new(db.clone());
    let proxy = ProxyService::new(store, fetcher, &config.proxy);
    if config.proxy.enforce_ownership {
        info!("Ownership check enabled: users may only proxy their own sites");
    }

    let state = Arc::new(AppState { db, proxy });
    web::start_server(&config, state).await?;

    Ok(())
}
