//! Database module

mod schema;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite, SqlitePool};

use crate::config::DatabaseConfig;

/// A user-registered target website
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    pub id: i64,
    /// Path segment used in proxy URLs, never contains spaces
    pub name: String,
    pub url: String,
    /// `true` when the site was registered with an https URL
    pub protocol_security: bool,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Scheme prefix used for outbound fetches and rewritten asset URLs
    pub fn scheme(&self) -> &'static str {
        if self.protocol_security {
            "https://"
        } else {
            "http://"
        }
    }

    /// Entry point into the proxy for this site: `/{name}/{host[:port]}{path}`
    pub fn proxy_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(parsed) => {
                let host = parsed.host_str().unwrap_or_default();
                let netloc = match parsed.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                format!("/{}/{}{}", self.name, netloc, parsed.path())
            }
            Err(_) => format!("/{}/", self.name),
        }
    }
}

/// Fields required to register a site
#[derive(Debug, Clone)]
pub struct NewSite {
    pub name: String,
    pub url: String,
    pub protocol_security: bool,
    pub user_id: i64,
}

/// Accumulated traffic for one (user, site) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStatistics {
    pub user_id: i64,
    pub site_id: i64,
    pub page_transitions: i64,
    pub data_sent: f64,
    pub data_received: f64,
    pub updated_at: DateTime<Utc>,
}

/// Statistics row joined with the site it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct SiteStatistics {
    pub site_name: String,
    pub url: String,
    pub page_transitions: i64,
    pub data_sent: f64,
    pub data_received: f64,
}

/// Site lookup used by the proxy endpoint
#[async_trait]
pub trait SiteRegistry: Send + Sync {
    /// First site (lowest id) whose URL contains `domain`, ignoring case.
    ///
    /// This is a plain substring test, not a hostname comparison: a domain
    /// appearing anywhere in a stored URL (path, query) is a match.
    async fn find_site_by_domain_substring(&self, domain: &str) -> Result<Option<Site>>;
}

/// Sink for per-(user, site) traffic counters
#[async_trait]
pub trait StatisticsSink: Send + Sync {
    /// Create the row on first use, then add the deltas in place.
    /// Implementations must apply the increment atomically.
    async fn increment_statistics(
        &self,
        user_id: i64,
        site_id: i64,
        delta_sent: f64,
        delta_received: f64,
        delta_transitions: i64,
    ) -> Result<()>;
}

/// Everything the proxy endpoint needs from storage
pub trait SiteStore: SiteRegistry + StatisticsSink {}

impl<T: SiteRegistry + StatisticsSink> SiteStore for T {}

type SiteRow = (i64, String, String, bool, i64, i64);

fn site_from_row((id, name, url, protocol_security, user_id, created_at): SiteRow) -> Site {
    Site {
        id,
        name,
        url,
        protocol_security,
        user_id,
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.url)).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        // WAL lets the proxy read sites while statistics are being written
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(schema::CREATE_SITES_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_STATISTICS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_SITES_USER)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_STATISTICS_USER)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_site(&self, site: &NewSite) -> Result<Site> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO sites (name, url, protocol_security, user_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&site.name)
        .bind(&site.url)
        .bind(site.protocol_security)
        .bind(site.user_id)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(Site {
            id: result.last_insert_rowid(),
            name: site.name.clone(),
            url: site.url.clone(),
            protocol_security: site.protocol_security,
            user_id: site.user_id,
            created_at,
        })
    }

    pub async fn list_sites_for_user(&self, user_id: i64) -> Result<Vec<Site>> {
        let rows: Vec<SiteRow> = sqlx::query_as(
            "SELECT id, name, url, protocol_security, user_id, created_at FROM sites WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(site_from_row).collect())
    }

    pub async fn get_statistics(&self, user_id: i64, site_id: i64) -> Result<Option<UserStatistics>> {
        let row: Option<(i64, i64, i64, f64, f64, i64)> = sqlx::query_as(
            r#"
            SELECT user_id, site_id, page_transitions, data_sent, data_received, updated_at
            FROM user_statistics
            WHERE user_id = ? AND site_id = ?
            "#,
        )
        .bind(user_id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, site_id, page_transitions, data_sent, data_received, updated_at)| UserStatistics {
            user_id,
            site_id,
            page_transitions,
            data_sent,
            data_received,
            updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_else(Utc::now),
        }))
    }

    pub async fn list_statistics_for_user(&self, user_id: i64) -> Result<Vec<SiteStatistics>> {
        let rows: Vec<(String, String, i64, f64, f64)> = sqlx::query_as(
            r#"
            SELECT s.name, s.url, st.page_transitions, st.data_sent, st.data_received
            FROM user_statistics st
            JOIN sites s ON s.id = st.site_id
            WHERE st.user_id = ?
            ORDER BY st.site_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(site_name, url, page_transitions, data_sent, data_received)| SiteStatistics {
                site_name,
                url,
                page_transitions,
                data_sent,
                data_received,
            })
            .collect())
    }
}

#[async_trait]
impl SiteRegistry for Database {
    async fn find_site_by_domain_substring(&self, domain: &str) -> Result<Option<Site>> {
        let row: Option<SiteRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, protocol_security, user_id, created_at
            FROM sites
            WHERE instr(lower(url), lower(?)) > 0
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(site_from_row))
    }
}

#[async_trait]
impl StatisticsSink for Database {
    async fn increment_statistics(
        &self,
        user_id: i64,
        site_id: i64,
        delta_sent: f64,
        delta_received: f64,
        delta_transitions: i64,
    ) -> Result<()> {
        sqlx::query(schema::INCREMENT_STATISTICS)
            .bind(user_id)
            .bind(site_id)
            .bind(delta_transitions)
            .bind(delta_sent)
            .bind(delta_received)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
