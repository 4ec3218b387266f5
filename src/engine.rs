//! The extraction engine: template resolution, page retrieval with
//! static-to-rendered escalation, selector application, and outcome
//! reporting behind one facade.
//!
//! Extraction calls never raise: every scrape returns an
//! [`ExtractionResult`] with an explicit success flag, folding hard
//! failures into a structured error category. Only training and
//! preview, which have nothing useful to return on failure, use
//! `Result`.

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batch;
use crate::dom::{self, Dom};
use crate::error::{ErrorKind, Result, ScrapeError};
use crate::normalize::normalize;
use crate::trainer::{self, TrainedTemplate};
use crate::traits::fetcher::Fetcher;
use crate::traits::generator::SelectorGenerator;
use crate::traits::renderer::{RenderPool, Renderer};
use crate::traits::store::TemplateRepository;
use crate::types::config::{BatchConfig, EngineConfig, TrainerConfig};
use crate::types::result::{ExtractionResult, OutputFormat, TemplateUsed};
use crate::types::schema::{FieldSchema, CONTENT_FIELD};
use crate::types::template::{normalize_domain, Template, TemplateStatus};

/// A non-extracting look at a page, for inspecting a site before
/// committing to a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePreview {
    /// The previewed URL
    pub url: String,

    /// Normalized domain
    pub domain: String,

    /// Document title, if any
    pub title: Option<String>,

    /// Meta description, if any
    pub description: Option<String>,

    /// The cleaned structure summary a training run would ship to the
    /// AI service
    pub structure_summary: String,
}

/// The extraction engine, generic over its four capabilities.
pub struct Engine<F, R, G, S>
where
    F: Fetcher,
    R: Renderer,
    G: SelectorGenerator,
    S: TemplateRepository,
{
    fetcher: F,
    renderer: RenderPool<R>,
    generator: G,
    store: S,
    config: EngineConfig,
    trainer_config: TrainerConfig,
}

impl<F, R, G, S> Engine<F, R, G, S>
where
    F: Fetcher,
    R: Renderer,
    G: SelectorGenerator,
    S: TemplateRepository,
{
    /// Create an engine with default configuration.
    pub fn new(fetcher: F, renderer: R, generator: G, store: S) -> Self {
        Self::with_config(fetcher, renderer, generator, store, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(
        fetcher: F,
        renderer: R,
        generator: G,
        store: S,
        config: EngineConfig,
    ) -> Self {
        let renderer = RenderPool::new(renderer, config.render_slots);
        Self {
            fetcher,
            renderer,
            generator,
            store,
            config,
            trainer_config: TrainerConfig::default(),
        }
    }

    /// Override the training configuration.
    pub fn with_trainer_config(mut self, trainer_config: TrainerConfig) -> Self {
        self.trainer_config = trainer_config;
        self
    }

    /// The template store backing this engine.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Train a template for `url`'s domain against `schema` and install
    /// it subject to the store's replacement policy.
    pub async fn train_template(
        &self,
        url: &str,
        schema: &FieldSchema,
    ) -> Result<TrainedTemplate> {
        trainer::train_template(
            url,
            schema,
            &self.fetcher,
            &self.renderer,
            &self.generator,
            &self.store,
            &self.trainer_config,
        )
        .await
    }

    /// Extract one URL with its domain's template.
    ///
    /// If the domain has no active template, one is trained from this
    /// very page against the generic title-and-content schema; if that
    /// fails too, built-in selector heuristics are applied and the
    /// result is marked [`TemplateUsed::Auto`].
    pub async fn scrape_url(&self, url: &str, format: OutputFormat) -> ExtractionResult {
        self.scrape_inner(url, format, None).await
    }

    /// Extract one URL with an explicitly chosen template, regardless of
    /// which domain it is active for.
    pub async fn scrape_url_with_template(
        &self,
        url: &str,
        template_id: Uuid,
        format: OutputFormat,
    ) -> ExtractionResult {
        self.scrape_inner(url, format, Some(template_id)).await
    }

    /// Extract one URL, abandoning the attempt when `cancel` fires. A
    /// cancelled extraction reports a timeout failure.
    pub async fn scrape_url_cancellable(
        &self,
        url: &str,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> ExtractionResult {
        let domain = normalize_domain(url).unwrap_or_default();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(url = %url, "extraction cancelled");
                ExtractionResult::failed(url, domain, ErrorKind::Timeout)
            }
            result = self.scrape_inner(url, format, None) => result,
        }
    }

    /// Extract a batch of URLs under the batch concurrency bound,
    /// returning results in input order.
    pub async fn scrape_batch(
        &self,
        urls: &[String],
        format: OutputFormat,
        config: &BatchConfig,
    ) -> Vec<ExtractionResult> {
        batch::scrape_batch(self, urls, format, config).await
    }

    /// Fetch a page and report what a training run would see, without
    /// calling the AI service or touching the store.
    pub async fn preview_url(&self, url: &str) -> Result<PagePreview> {
        let domain = normalize_domain(url)?;
        let (html, _) = self.fetch_html(url).await?;
        Ok(build_preview(
            url,
            &domain,
            &html,
            self.trainer_config.max_summary_len,
        ))
    }

    async fn scrape_inner(
        &self,
        url: &str,
        format: OutputFormat,
        explicit: Option<Uuid>,
    ) -> ExtractionResult {
        let domain = match normalize_domain(url) {
            Ok(domain) => domain,
            Err(err) => return ExtractionResult::failed(url, "", ErrorKind::from(&err)),
        };

        let (html, rendered) = match self.fetch_html(url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(url = %url, error = %err, "page retrieval failed");
                return ExtractionResult::failed(url, domain, ErrorKind::from(&err));
            }
        };

        let choice = match self.resolve_template(url, &domain, &html, rendered, explicit).await {
            Ok(choice) => choice,
            Err(err) => {
                warn!(url = %url, error = %err, "template resolution failed");
                return ExtractionResult::failed(url, domain, ErrorKind::from(&err));
            }
        };

        match choice {
            TemplateChoice::Stored(template) => {
                let mut applied = apply_selectors(
                    &html,
                    url,
                    &template.selectors,
                    format,
                    &self.config.required_fields,
                );

                // Second escalation trigger: a required selector that finds
                // nothing in the static DOM may still match once page
                // scripts have run
                if applied.error == Some(ErrorKind::SelectorResolution) && !rendered {
                    match self.renderer.render(url, self.config.render_timeout).await {
                        Ok(rendered_html) => {
                            debug!(url = %url, "required selector missed statically, retrying against rendered DOM");
                            applied = apply_selectors(
                                &rendered_html,
                                url,
                                &template.selectors,
                                format,
                                &self.config.required_fields,
                            );
                        }
                        Err(err) => {
                            warn!(url = %url, error = %err, "render escalation failed");
                        }
                    }
                }

                self.report_outcome(template.id, applied.success).await;
                info!(
                    url = %url,
                    template_id = %template.id,
                    success = applied.success,
                    fields = applied.values.len(),
                    "extraction complete"
                );
                ExtractionResult {
                    url: url.to_string(),
                    domain,
                    template_used: TemplateUsed::Template(template.id),
                    scraped_at: Utc::now(),
                    field_values: applied.values,
                    success: applied.success,
                    error: applied.error,
                }
            }
            TemplateChoice::Heuristic => {
                let selectors = probe_heuristics(&html, url);
                let applied = apply_selectors(
                    &html,
                    url,
                    &selectors,
                    format,
                    &self.config.required_fields,
                );
                info!(
                    url = %url,
                    success = applied.success,
                    fields = applied.values.len(),
                    "heuristic extraction complete"
                );
                ExtractionResult {
                    url: url.to_string(),
                    domain,
                    template_used: TemplateUsed::Auto,
                    scraped_at: Utc::now(),
                    field_values: applied.values,
                    success: applied.success,
                    error: applied.error,
                }
            }
        }
    }

    /// Pick the template for an extraction. Auto-training trains on the
    /// document already fetched for this extraction rather than fetching
    /// the page a second time.
    async fn resolve_template(
        &self,
        url: &str,
        domain: &str,
        html: &str,
        rendered: bool,
        explicit: Option<Uuid>,
    ) -> Result<TemplateChoice> {
        if let Some(id) = explicit {
            let template = self
                .store
                .get_by_id(id)
                .await?
                .ok_or_else(|| ScrapeError::validation(format!("no template with id {id}")))?;
            if template.status == TemplateStatus::Deleted {
                return Err(ScrapeError::validation(format!("template {id} is deleted")));
            }
            return Ok(TemplateChoice::Stored(template));
        }

        if let Some(template) = self.store.get_active(domain).await? {
            return Ok(TemplateChoice::Stored(template));
        }

        debug!(domain = %domain, "no active template, training from this page");
        let trained = trainer::train_on_document(
            url,
            html,
            rendered,
            &FieldSchema::default_auto(),
            &self.renderer,
            &self.generator,
            &self.store,
            &self.trainer_config,
        )
        .await;
        match trained {
            Ok(trained) => Ok(TemplateChoice::Stored(trained.template)),
            Err(err) => {
                warn!(
                    domain = %domain,
                    error = %err,
                    "auto-training failed, falling back to heuristics"
                );
                Ok(TemplateChoice::Heuristic)
            }
        }
    }

    /// Retrieve a page, escalating to a rendered fetch when the static
    /// body carries too little visible text. Returns the document and
    /// whether it came from the renderer.
    async fn fetch_html(&self, url: &str) -> Result<(String, bool)> {
        let page = self.fetcher.fetch(url, self.config.fetch_timeout).await?;
        let html = page.body;

        if dom::visible_text_len(&html, url) < self.config.min_static_text_len {
            debug!(url = %url, "static page too thin, escalating to rendered fetch");
            let rendered = self.renderer.render(url, self.config.render_timeout).await?;
            return Ok((rendered, true));
        }

        Ok((html, false))
    }

    /// Outcome reporting must never fail an extraction that already
    /// produced a result.
    async fn report_outcome(&self, template_id: Uuid, success: bool) {
        if let Err(err) = self.store.record_outcome(template_id, success).await {
            warn!(
                template_id = %template_id,
                error = %err,
                "failed to record extraction outcome"
            );
        }
    }
}

enum TemplateChoice {
    Stored(Template),
    Heuristic,
}

struct Applied {
    values: IndexMap<String, String>,
    success: bool,
    error: Option<ErrorKind>,
}

/// Apply a selector mapping to a document. The content field collects
/// ordered fragments across every match and is normalized to the
/// requested format; every other field takes the first non-empty text.
fn apply_selectors(
    html: &str,
    base_url: &str,
    selectors: &IndexMap<String, String>,
    format: OutputFormat,
    required: &[String],
) -> Applied {
    let dom = Dom::parse(html, base_url);

    let mut values = IndexMap::new();
    for (field, selector) in selectors {
        let value = if field == CONTENT_FIELD {
            let fragments = dom.collect_fragments(selector);
            if fragments.is_empty() {
                None
            } else {
                Some(normalize(&fragments, format))
            }
        } else {
            dom.first_text(selector)
        };

        match value {
            Some(value) => {
                values.insert(field.clone(), value);
            }
            None => debug!(field = %field, selector = %selector, "selector yielded no value"),
        }
    }

    let success = required
        .iter()
        .all(|f| values.get(f).map_or(false, |v| !v.is_empty()));

    let error = if success {
        None
    } else if required
        .iter()
        .any(|f| selectors.contains_key(f) && !values.contains_key(f))
    {
        Some(ErrorKind::SelectorResolution)
    } else {
        Some(ErrorKind::Validation)
    };

    Applied {
        values,
        success,
        error,
    }
}

/// Probe the built-in selector ladders against a document and keep the
/// first rung of each ladder that yields content.
fn probe_heuristics(html: &str, base_url: &str) -> IndexMap<String, String> {
    let dom = Dom::parse(html, base_url);

    let mut selectors = IndexMap::new();
    for (field, ladder) in dom::heuristic_ladders() {
        let found = ladder.into_iter().find(|selector| {
            if field == CONTENT_FIELD {
                !dom.collect_fragments(selector).is_empty()
            } else {
                dom.first_text(selector).is_some()
            }
        });
        if let Some(selector) = found {
            selectors.insert(field, selector);
        }
    }
    selectors
}

fn build_preview(url: &str, domain: &str, html: &str, max_summary_len: usize) -> PagePreview {
    let dom = Dom::parse(html, url);
    PagePreview {
        url: url.to_string(),
        domain: domain.to_string(),
        title: dom.title(),
        description: dom.meta_description(),
        structure_summary: dom::clean_for_summary(html, max_summary_len),
    }
}
