//! Firecrawl-backed renderer implementation.
//!
//! Uses the Firecrawl API for JavaScript-heavy sites with anti-bot
//! protection: the service loads the page in a real browser, runs its
//! scripts, and returns the rendered document HTML.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::traits::renderer::Renderer;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// [`Renderer`] backed by the Firecrawl scrape API.
///
/// # Example
///
/// ```rust,ignore
/// let renderer = FirecrawlRenderer::from_env()?;
/// let html = renderer.render("https://example.com", Duration::from_secs(60)).await?;
/// ```
pub struct FirecrawlRenderer {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<String>,
    /// Milliseconds Firecrawl may spend loading the page
    timeout: u64,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    html: Option<String>,
}

impl FirecrawlRenderer {
    /// Create a renderer with the given API key.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: FIRECRAWL_API_URL.to_string(),
        }
    }

    /// Create from environment variable `FIRECRAWL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY")
            .map_err(|_| ScrapeError::validation("FIRECRAWL_API_KEY not set"))?;
        Ok(Self::new(api_key.into()))
    }

    /// Set a custom base URL (self-hosted Firecrawl, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl Renderer for FirecrawlRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!(url = %url, "requesting rendered page from firecrawl");

        let request = ScrapeRequest {
            url: url.to_string(),
            formats: vec!["html".to_string()],
            timeout: timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ScrapeError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    ScrapeError::render(url, err)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ScrapeError::render(
                url,
                format!("firecrawl API error: {status} - {text}"),
            ));
        }

        let scrape: ScrapeResponse = response
            .json()
            .await
            .map_err(|err| ScrapeError::render(url, err))?;

        if !scrape.success {
            return Err(ScrapeError::render(
                url,
                scrape
                    .error
                    .unwrap_or_else(|| "firecrawl scrape failed".to_string()),
            ));
        }

        scrape
            .data
            .and_then(|data| data.html)
            .filter(|html| !html.trim().is_empty())
            .ok_or_else(|| ScrapeError::render(url, "no rendered HTML returned"))
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}
