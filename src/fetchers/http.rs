//! Plain HTTP fetcher backed by reqwest.

use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::traits::fetcher::{FetchedPage, Fetcher};

// Sites routinely block obvious bot user agents, so present a plain
// browser profile.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// [`Fetcher`] that retrieves pages over HTTP without executing
/// scripts. Follows redirects and reports the final URL.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with a fresh connection pool.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a fetcher sharing an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        debug!(url = %url, "fetching page");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, ACCEPT)
            .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ScrapeError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    ScrapeError::fetch(url, err)
                }
            })?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(ScrapeError::fetch(
                url,
                format!("unexpected status {status}"),
            ));
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                ScrapeError::Timeout {
                    url: url.to_string(),
                }
            } else {
                ScrapeError::fetch(url, err)
            }
        })?;

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "page fetched");
        Ok(FetchedPage::new(status.as_u16(), body, final_url))
    }

    fn name(&self) -> &str {
        "http"
    }
}
