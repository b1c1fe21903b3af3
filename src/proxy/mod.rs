//! Fetch-rewrite-record pipeline behind the proxy endpoint
//!
//! A request for `/{site_name}/{url_path}` is served by:
//! - looking up a registered site from the first segment of `url_path`
//! - fetching the page from the origin
//! - recording traffic for the site's owner
//! - rewriting asset paths, then anchors, so navigation stays proxied

pub mod assets;
pub mod fetcher;
pub mod links;
pub mod stats;

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;
use crate::db::{Site, SiteStore};

pub use assets::rewrite_asset_paths;
pub use fetcher::{FetchOutcome, Fetcher};
pub use links::rewrite_links;
pub use stats::{record_traffic, TrafficStats};

/// Per-request proxy state, built from the inbound path and dropped once
/// the response is produced.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Id of the authenticated caller
    pub user_id: i64,
    /// First path segment of the inbound URL
    pub site_name: String,
    /// Everything after the site name, starting with the origin domain.
    /// Never ends with `/`.
    pub url_path: String,
}

impl ProxyRequest {
    pub fn new(user_id: i64, site_name: impl Into<String>, url_path: impl Into<String>) -> Self {
        let mut url_path = url_path.into();
        if url_path.ends_with('/') {
            url_path.pop();
        }
        Self {
            user_id,
            site_name: site_name.into(),
            url_path,
        }
    }

    /// First `/`-delimited segment of the requested path
    pub fn origin_domain(&self) -> &str {
        self.url_path.split('/').next().unwrap_or_default()
    }
}

pub struct ProxyService {
    store: Arc<dyn SiteStore>,
    fetcher: Fetcher,
    enforce_ownership: bool,
}

impl ProxyService {
    pub fn new(store: Arc<dyn SiteStore>, fetcher: Fetcher, config: &ProxyConfig) -> Self {
        Self {
            store,
            fetcher,
            enforce_ownership: config.enforce_ownership,
        }
    }

    /// Serve one proxied page. Returns an empty string when no site matches.
    pub async fn handle(&self, request: &ProxyRequest) -> String {
        let origin_domain = request.origin_domain();

        let Some(site) = self.lookup_site(request, origin_domain).await else {
            return String::new();
        };

        let scheme = site.scheme();
        let target = format!("{}{}", scheme, request.url_path);
        info!(
            "Proxying {} for user {} via /{} (matched site {})",
            target, request.user_id, request.site_name, site.name
        );

        let (content, stats) = self.fetcher.fetch(&target).await.into_parts();
        record_traffic(self.store.as_ref(), &site, stats).await;

        let content = rewrite_asset_paths(&content, scheme, origin_domain);
        rewrite_links(&content, origin_domain, &site, scheme)
    }

    async fn lookup_site(&self, request: &ProxyRequest, origin_domain: &str) -> Option<Site> {
        let site = match self.store.find_site_by_domain_substring(origin_domain).await {
            Ok(Some(site)) => site,
            Ok(None) => {
                debug!("No site registered for domain '{}'", origin_domain);
                return None;
            }
            Err(e) => {
                error!("Site lookup for '{}' failed: {}", origin_domain, e);
                return None;
            }
        };

        if self.enforce_ownership && site.user_id != request.user_id {
            warn!(
                "User {} attempted to proxy site {} owned by user {}",
                request.user_id, site.id, site.user_id
            );
            return None;
        }

        Some(site)
    }
}
