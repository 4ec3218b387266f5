//! Fetcher trait for plain network retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::Result;

/// A page fetched without script execution.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,

    /// Response body (HTML)
    pub body: String,

    /// Final URL after redirects
    pub final_url: String,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Create a fetched page with the current timestamp.
    pub fn new(status: u16, body: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            final_url: final_url.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Whether the response carries a usable body.
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Plain network retrieval capability.
///
/// Implementations must honor `timeout` and map failures into
/// [`ScrapeError::Fetch`] / [`ScrapeError::Timeout`].
///
/// [`ScrapeError::Fetch`]: crate::error::ScrapeError::Fetch
/// [`ScrapeError::Timeout`]: crate::error::ScrapeError::Timeout
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve a URL without executing page scripts.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage>;

    /// Implementation name, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_body() {
        assert!(FetchedPage::new(200, "<html></html>", "https://example.com").has_body());
        assert!(!FetchedPage::new(204, "  ", "https://example.com").has_body());
    }
}
