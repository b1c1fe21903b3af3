// Router tests: identity, site registration, statistics and proxy routing

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use siteproxy::config::{DatabaseConfig, FetcherConfig, ProxyConfig};
use siteproxy::db::{Database, SiteStore};
use siteproxy::proxy::{Fetcher, ProxyService};
use siteproxy::web::{build_router, AppState};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

async fn create_app() -> (TempDir, Database, Router) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: temp_dir.path().join("api.db").to_string_lossy().into_owned(),
    };
    let db = Database::new(&config).await.unwrap();
    db.run_migrations().await.unwrap();

    let store: Arc<dyn SiteStore> = Arc::new(db.clone());
    let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
    let proxy = ProxyService::new(store, fetcher, &ProxyConfig::default());
    let router = build_router(Arc::new(AppState { db: db.clone(), proxy }));
    (temp_dir, db, router)
}

fn get(uri: &str, user_id: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, user_id: i64, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_proxy_requires_identity() {
    let (_dir, _db, app) = create_app().await;

    let response = app.clone().oneshot(get("/MySite/example.com/page", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/api/sites", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_numeric_identity_rejected() {
    let (_dir, _db, app) = create_app().await;

    let request = Request::builder()
        .uri("/api/statistics")
        .header("x-user-id", "alice")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Proxy route
// ============================================================================

#[tokio::test]
async fn test_unknown_site_returns_empty_ok() {
    let (_dir, _db, app) = create_app().await;

    let response = app.oneshot(get("/MySite/unknown.test/page", Some(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_proxy_route_serves_rewritten_html() {
    let mock_server = MockServer::start().await;
    let origin = mock_server.address().to_string();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(r#"<a href="http://{origin}/next">next</a>"#)),
        )
        .mount(&mock_server)
        .await;

    let (_dir, _db, app) = create_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/sites",
            1,
            json!({ "name": "Local Site", "url": format!("http://{}/", origin) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get(&format!("/Local_Site/{}/start", origin), Some(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    assert_eq!(
        body_string(response).await,
        format!(r#"<a href="/Local_Site/{origin}/next">next</a>"#)
    );

    let response = app.oneshot(get("/api/statistics", Some(1))).await.unwrap();
    let rows: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(rows[0]["site_name"], "Local_Site");
    assert_eq!(rows[0]["page_transitions"], 1);
}

// ============================================================================
// Site API
// ============================================================================

#[tokio::test]
async fn test_create_and_list_sites() {
    let (_dir, _db, app) = create_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/sites",
            4,
            json!({ "name": "My Docs", "url": "https://docs.example.com/guide/" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(created["name"], "My_Docs");
    assert_eq!(created["protocol_security"], true);
    assert_eq!(created["proxy_url"], "/My_Docs/docs.example.com/guide/");

    // Another user's list stays empty
    let response = app.clone().oneshot(get("/api/sites", Some(5))).await.unwrap();
    assert_eq!(body_string(response).await, "[]");

    let response = app.oneshot(get("/api/sites", Some(4))).await.unwrap();
    let sites: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(sites.as_array().unwrap().len(), 1);
    assert_eq!(sites[0]["url"], "https://docs.example.com/guide/");
}

#[tokio::test]
async fn test_create_site_rejects_bad_url() {
    let (_dir, db, app) = create_app().await;

    let response = app
        .oneshot(post_json("/api/sites", 1, json!({ "name": "Bad", "url": "nope" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(error["error"].as_str().unwrap().starts_with("Invalid site"));

    assert!(db.list_sites_for_user(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_segment_path_is_not_found() {
    let (_dir, _db, app) = create_app().await;

    let response = app.oneshot(get("/justone", Some(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
