//! Outbound page fetching

use encoding_rs::{Encoding, UTF_8};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, warn};

use super::stats::TrafficStats;
use crate::config::FetcherConfig;

/// Result of a single fetch. Both variants carry something to render and
/// something to record, so callers never branch on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched { content: String, stats: TrafficStats },
    /// Placeholder page describing the error; stats are always zero
    Failed { content: String, stats: TrafficStats },
}

impl FetchOutcome {
    pub fn into_parts(self) -> (String, TrafficStats) {
        match self {
            FetchOutcome::Fetched { content, stats } | FetchOutcome::Failed { content, stats } => {
                (content, stats)
            }
        }
    }

    fn failed(error: &reqwest::Error) -> Self {
        let message = html_escape::encode_text(&error.to_string()).into_owned();
        FetchOutcome::Failed {
            content: format!("An error occurred while requesting the server.\nError {}", message),
            stats: TrafficStats::default(),
        }
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// GET `url`. Transport errors and non-2xx statuses become
    /// [`FetchOutcome::Failed`].
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.try_fetch(url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Fetch of {} failed: {}", url, e);
                FetchOutcome::failed(&e)
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> reqwest::Result<FetchOutcome> {
        let request = self.client.get(url).build()?;
        let sent_bytes = request
            .body()
            .and_then(|body| body.as_bytes())
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0);

        let response = self.client.execute(request).await?.error_for_status()?;
        let status = response.status();
        let encoding = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_label)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        let body = response.bytes().await?;

        debug!("Fetched {} ({}, {} bytes)", url, status, body.len());

        let stats = TrafficStats {
            sent_bytes,
            received_bytes: body.len() as u64,
            page_transitions: if body.is_empty() { 0 } else { 1 },
        };
        Ok(FetchOutcome::Fetched {
            content: encoding.decode(&body).0.into_owned(),
            stats,
        })
    }
}

/// `charset` parameter of a `Content-Type` value, unquoted
fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}
