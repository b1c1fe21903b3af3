//! Per-fetch traffic counters and their accumulation into storage

use serde::Serialize;
use tracing::{debug, error};

use crate::db::{Site, StatisticsSink};

/// Traffic produced by one fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub page_transitions: u64,
}

/// Add `stats` to the counters of the site's owner for that site.
///
/// Zero-valued stats still create the row. Storage failures are logged and
/// swallowed so the proxied page is always returned.
pub async fn record_traffic<S>(sink: &S, site: &Site, stats: TrafficStats)
where
    S: StatisticsSink + ?Sized,
{
    let result = sink
        .increment_statistics(
            site.user_id,
            site.id,
            stats.sent_bytes as f64,
            stats.received_bytes as f64,
            stats.page_transitions as i64,
        )
        .await;

    match result {
        Ok(()) => debug!(
            "Recorded traffic for site {} (user {}): sent={} received={} transitions={}",
            site.id, site.user_id, stats.sent_bytes, stats.received_bytes, stats.page_transitions
        ),
        Err(e) => error!("Failed to record traffic for site {}: {}", site.id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, NewSite};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Database, Site) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: temp_dir.path().join("stats.db").to_string_lossy().into_owned(),
        };
        let db = Database::new(&config).await.unwrap();
        db.run_migrations().await.unwrap();
        let site = db
            .insert_site(&NewSite {
                name: "MySite".to_string(),
                url: "https://example.com".to_string(),
                protocol_security: true,
                user_id: 42,
            })
            .await
            .unwrap();
        (temp_dir, db, site)
    }

    #[tokio::test]
    async fn test_failed_fetches_create_zero_row() {
        let (_dir, db, site) = setup().await;

        record_traffic(&db, &site, TrafficStats::default()).await;
        record_traffic(&db, &site, TrafficStats::default()).await;

        let row = db.get_statistics(42, site.id).await.unwrap().unwrap();
        assert_eq!(row.page_transitions, 0);
        assert_eq!(row.data_sent, 0.0);
        assert_eq!(row.data_received, 0.0);
    }

    #[tokio::test]
    async fn test_successful_fetches_accumulate() {
        let (_dir, db, site) = setup().await;

        let first = TrafficStats { sent_bytes: 10, received_bytes: 20, page_transitions: 1 };
        let second = TrafficStats { sent_bytes: 5, received_bytes: 7, page_transitions: 1 };
        record_traffic(&db, &site, first).await;
        record_traffic(&db, &site, second).await;

        let row = db.get_statistics(42, site.id).await.unwrap().unwrap();
        assert_eq!(row.data_sent, 15.0);
        assert_eq!(row.data_received, 27.0);
        assert_eq!(row.page_transitions, 2);
    }
}
