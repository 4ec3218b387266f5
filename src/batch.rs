//! Bounded-concurrency batch extraction.
//!
//! One slow or hung URL must never stall the rest of the batch: each
//! URL gets its own deadline, and exceeding it abandons only that URL's
//! work. Results always come back in input order, one per input URL.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::ErrorKind;
use crate::traits::fetcher::Fetcher;
use crate::traits::generator::SelectorGenerator;
use crate::traits::renderer::Renderer;
use crate::traits::store::TemplateRepository;
use crate::types::config::BatchConfig;
use crate::types::result::{ExtractionResult, OutputFormat};
use crate::types::template::normalize_domain;

/// Extract every URL in `urls` with at most `config.max_concurrent`
/// in flight, returning one result per URL in input order.
///
/// A URL that exceeds `config.per_task_timeout` yields a failed result
/// with a timeout category; its abandoned extraction records no outcome
/// against any template.
pub async fn scrape_batch<F, R, G, S>(
    engine: &Engine<F, R, G, S>,
    urls: &[String],
    format: OutputFormat,
    config: &BatchConfig,
) -> Vec<ExtractionResult>
where
    F: Fetcher,
    R: Renderer,
    G: SelectorGenerator,
    S: TemplateRepository,
{
    info!(
        total = urls.len(),
        max_concurrent = config.max_concurrent,
        "starting batch extraction"
    );

    let mut indexed: Vec<(usize, ExtractionResult)> = stream::iter(urls.iter().enumerate())
        .map(|(idx, url)| async move {
            let result = scrape_with_deadline(engine, url, format, config).await;
            (idx, result)
        })
        .buffer_unordered(config.max_concurrent)
        .collect()
        .await;

    indexed.sort_by_key(|(idx, _)| *idx);

    let succeeded = indexed.iter().filter(|(_, r)| r.success).count();
    info!(
        total = urls.len(),
        succeeded,
        failed = urls.len() - succeeded,
        "batch extraction complete"
    );

    indexed.into_iter().map(|(_, result)| result).collect()
}

async fn scrape_with_deadline<F, R, G, S>(
    engine: &Engine<F, R, G, S>,
    url: &str,
    format: OutputFormat,
    config: &BatchConfig,
) -> ExtractionResult
where
    F: Fetcher,
    R: Renderer,
    G: SelectorGenerator,
    S: TemplateRepository,
{
    debug!(url = %url, "batch task started");

    // The select drops the in-flight extraction on deadline, which
    // abandons it before any outcome is recorded
    tokio::select! {
        result = engine.scrape_url(url, format) => result,
        _ = tokio::time::sleep(config.per_task_timeout) => {
            warn!(url = %url, timeout = ?config.per_task_timeout, "batch task deadline exceeded");
            ExtractionResult::failed(url, normalize_domain(url).unwrap_or_default(), ErrorKind::Timeout)
        }
    }
}
