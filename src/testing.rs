//! Deterministic in-memory mocks for the capability traits.
//!
//! Every mock is cheaply cloneable and shares its state across clones,
//! so tests can keep a handle for assertions after moving a clone into
//! the system under test. Locks are never held across await points.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{Result, ScrapeError};
use crate::traits::fetcher::{FetchedPage, Fetcher};
use crate::traits::generator::{CandidateMapping, SelectorGenerator, StructureSummary};
use crate::traits::renderer::Renderer;
use crate::types::schema::FieldSchema;

#[derive(Clone)]
enum PageBehavior {
    Page { body: String, delay: Duration },
    Error(String),
    Timeout,
}

/// Scripted [`Fetcher`]: serves registered bodies by exact URL and
/// records every fetch.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, PageBehavior>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page body for a URL.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(
            url.into(),
            PageBehavior::Page {
                body: body.into(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Register a page body that takes `delay` to arrive.
    pub fn with_slow_page(
        self,
        url: impl Into<String>,
        body: impl Into<String>,
        delay: Duration,
    ) -> Self {
        self.pages.write().unwrap().insert(
            url.into(),
            PageBehavior::Page {
                body: body.into(),
                delay,
            },
        );
        self
    }

    /// Make fetches of a URL fail with a fetch error.
    pub fn with_error(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(url.into(), PageBehavior::Error(reason.into()));
        self
    }

    /// Make fetches of a URL fail with a timeout.
    pub fn with_timeout(self, url: impl Into<String>) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(url.into(), PageBehavior::Timeout);
        self
    }

    /// Every URL fetched so far, in call order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        let behavior = self.pages.read().unwrap().get(url).cloned();
        match behavior {
            Some(PageBehavior::Page { body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(FetchedPage::new(200, body, url))
            }
            Some(PageBehavior::Error(reason)) => Err(ScrapeError::fetch(url, reason)),
            Some(PageBehavior::Timeout) => Err(ScrapeError::Timeout {
                url: url.to_string(),
            }),
            None => Err(ScrapeError::fetch(url, "no mock page registered")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Scripted [`Renderer`]: serves registered rendered documents by URL
/// and counts renders.
#[derive(Clone, Default)]
pub struct MockRenderer {
    pages: Arc<RwLock<HashMap<String, PageBehavior>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rendered document for a URL.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(
            url.into(),
            PageBehavior::Page {
                body: html.into(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Register a rendered document that takes `delay` to arrive.
    pub fn with_slow_page(
        self,
        url: impl Into<String>,
        html: impl Into<String>,
        delay: Duration,
    ) -> Self {
        self.pages.write().unwrap().insert(
            url.into(),
            PageBehavior::Page {
                body: html.into(),
                delay,
            },
        );
        self
    }

    /// Make renders of a URL fail.
    pub fn with_error(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(url.into(), PageBehavior::Error(reason.into()));
        self
    }

    /// Number of renders performed.
    pub fn render_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Every URL rendered so far, in call order.
    pub fn rendered_urls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, url: &str, _timeout: Duration) -> Result<String> {
        self.calls.write().unwrap().push(url.to_string());

        let behavior = self.pages.read().unwrap().get(url).cloned();
        match behavior {
            Some(PageBehavior::Page { body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(body)
            }
            Some(PageBehavior::Error(reason)) => Err(ScrapeError::render(url, reason)),
            Some(PageBehavior::Timeout) => Err(ScrapeError::Timeout {
                url: url.to_string(),
            }),
            None => Err(ScrapeError::render(url, "no rendered page registered")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Scripted [`SelectorGenerator`].
///
/// Fails the first `fail_times` calls, then serves the registered
/// mappings in order, repeating the last one. With nothing registered
/// it returns an empty mapping, which callers treat as a failed
/// generation.
#[derive(Clone, Default)]
pub struct MockSelectorGenerator {
    mappings: Arc<RwLock<Vec<CandidateMapping>>>,
    fail_remaining: Arc<AtomicUsize>,
    cursor: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl MockSelectorGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a mapping response.
    pub fn with_mapping(self, mapping: CandidateMapping) -> Self {
        self.mappings.write().unwrap().push(mapping);
        self
    }

    /// Fail the next `n` calls before serving mappings.
    pub fn fail_times(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Number of generation calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelectorGenerator for MockSelectorGenerator {
    async fn generate(
        &self,
        _summary: &StructureSummary,
        _schema: &FieldSchema,
    ) -> Result<CandidateMapping> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ScrapeError::SelectorGeneration(
                "mock generation failure".to_string(),
            ));
        }

        let mappings = self.mappings.read().unwrap();
        if mappings.is_empty() {
            return Ok(CandidateMapping::new());
        }
        let idx = self
            .cursor
            .fetch_add(1, Ordering::SeqCst)
            .min(mappings.len() - 1);
        Ok(mappings[idx].clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
