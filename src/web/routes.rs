//! HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::AppState;
use crate::db::{NewSite, Site, SiteStatistics};
use crate::error::{AppError, AppResult};
use crate::proxy::ProxyRequest;

/// Proxy a page of a registered site: `/{site_name}/{origin_domain}/{path}`
pub async fn proxy_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path((site_name, url_path)): Path<(String, String)>,
) -> Html<String> {
    let request = ProxyRequest::new(user_id, site_name, url_path);
    Html(state.proxy.handle(&request).await)
}

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SiteResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub protocol_security: bool,
    /// Where to browse the site through the proxy
    pub proxy_url: String,
}

impl From<Site> for SiteResponse {
    fn from(site: Site) -> Self {
        let proxy_url = site.proxy_url();
        Self {
            id: site.id,
            name: site.name,
            url: site.url,
            protocol_security: site.protocol_security,
            proxy_url,
        }
    }
}

/// Validate a registration request into a storable site.
///
/// Spaces in the name become underscores so it can be used as a path
/// segment, and the URL scheme decides whether the site is fetched over
/// https.
pub fn new_site_from_request(request: &CreateSiteRequest, user_id: i64) -> AppResult<NewSite> {
    let name = request.name.trim().replace(' ', "_");
    if name.is_empty() {
        return Err(AppError::InvalidSite("name cannot be empty".to_string()));
    }
    if name.contains('/') {
        return Err(AppError::InvalidSite("name cannot contain '/'".to_string()));
    }

    let parsed = url::Url::parse(request.url.trim())
        .map_err(|e| AppError::InvalidSite(format!("invalid URL '{}': {}", request.url, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::InvalidSite(format!(
            "unsupported scheme '{}', expected http or https",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(AppError::InvalidSite(format!("URL '{}' has no host", request.url)));
    }

    Ok(NewSite {
        name,
        url: request.url.trim().to_string(),
        protocol_security: parsed.scheme() == "https",
        user_id,
    })
}

/// API: Register a site for the caller
pub async fn api_create_site(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateSiteRequest>,
) -> AppResult<(StatusCode, Json<SiteResponse>)> {
    let new_site = new_site_from_request(&request, user_id)?;
    let site = state.db.insert_site(&new_site).await?;
    tracing::info!("User {} registered site {} ({})", user_id, site.name, site.url);
    Ok((StatusCode::CREATED, Json(site.into())))
}

/// API: List the caller's sites with their proxy entry points
pub async fn api_list_sites(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Vec<SiteResponse>>> {
    let sites = state.db.list_sites_for_user(user_id).await?;
    Ok(Json(sites.into_iter().map(SiteResponse::from).collect()))
}

/// API: Traffic statistics of the caller, one row per site
pub async fn api_statistics(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Vec<SiteStatistics>>> {
    Ok(Json(state.db.list_statistics_for_user(user_id).await?))
}
