//! Renderer trait for JavaScript-executing page fetches, plus the
//! bounded pool that rations render capacity.
//!
//! Rendering is the scarce resource in this system: static fetches are
//! preferred exactly so that extraction tasks only queue for a render
//! slot when escalation actually triggers.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Result, ScrapeError};

/// JavaScript-executing page retrieval capability.
///
/// Returns the rendered document HTML after page scripts have run,
/// bounded by `timeout`.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL and return the resulting document HTML.
    async fn render(&self, url: &str, timeout: Duration) -> Result<String>;

    /// Implementation name, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// A renderer wrapper that bounds concurrent renders with a semaphore.
///
/// Callers queue for a slot; a closed pool yields
/// [`ScrapeError::Capacity`].
pub struct RenderPool<R: Renderer> {
    inner: R,
    permits: Arc<Semaphore>,
    pool_size: usize,
}

impl<R: Renderer> RenderPool<R> {
    /// Create a pool with `pool_size` concurrent render slots.
    pub fn new(renderer: R, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            inner: renderer,
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
        }
    }

    /// Number of render slots.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Render, queueing for a slot if the pool is busy.
    pub async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ScrapeError::Capacity {
                reason: "render pool closed".to_string(),
            })?;

        debug!(url = %url, renderer = self.inner.name(), "render slot acquired");
        self.inner.render(url, timeout).await
    }

    /// Render only if a slot is immediately free.
    pub async fn try_render(&self, url: &str, timeout: Duration) -> Result<String> {
        let _permit = self
            .permits
            .try_acquire()
            .map_err(|_| ScrapeError::Capacity {
                reason: "render pool exhausted".to_string(),
            })?;

        self.inner.render(url, timeout).await
    }

    /// Shut the pool down; queued and future renders fail with a
    /// capacity error.
    pub fn close(&self) {
        self.permits.close();
    }
}
