//! Template training: learn a field-to-selector mapping for a domain
//! from one sample page.
//!
//! Training fetches the sample, ships a condensed structure summary to
//! the AI service, then validates every proposed selector against the
//! live DOM. Fields the first proposal misses get one targeted
//! refinement call before the scarcer rendered fetch is considered.
//! Confidence is computed here from what actually matched; anything the
//! service claims about itself is ignored.

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::dom::{self, Dom};
use crate::error::{Result, ScrapeError};
use crate::traits::fetcher::Fetcher;
use crate::traits::generator::{
    CandidateMapping, GenerationFeedback, SelectorGenerator, StructureSummary,
};
use crate::traits::renderer::{RenderPool, Renderer};
use crate::traits::store::{TemplateRepository, UpsertOutcome};
use crate::types::config::TrainerConfig;
use crate::types::schema::{FieldSchema, FieldType};
use crate::types::template::{normalize_domain, Template};

/// Outcome of a training run.
#[derive(Debug)]
pub struct TrainedTemplate {
    /// The trained template, as submitted to the store
    pub template: Template,

    /// Schema fields no candidate selector resolved for
    pub unresolved: Vec<String>,

    /// What the store did with the template
    pub outcome: UpsertOutcome,
}

/// Train a template for `url`'s domain against `schema` and submit it
/// to the store.
///
/// The sample fetch escalates to a rendered fetch at most once: either
/// up front when the static page has too little visible text, or after
/// validation when a required field (or every field) fails to resolve
/// against the static DOM.
///
/// Fails with [`ScrapeError::Validation`] when zero schema fields
/// resolve; a partially resolved schema trains a template covering the
/// resolved fields, with the rest reported in `unresolved`.
pub async fn train_template<F, R, G, S>(
    url: &str,
    schema: &FieldSchema,
    fetcher: &F,
    renderer: &RenderPool<R>,
    generator: &G,
    store: &S,
    config: &TrainerConfig,
) -> Result<TrainedTemplate>
where
    F: Fetcher,
    R: Renderer,
    G: SelectorGenerator,
    S: TemplateRepository,
{
    if schema.is_empty() {
        return Err(ScrapeError::validation("field schema is empty"));
    }

    let page = fetcher.fetch(url, config.fetch_timeout).await?;
    let mut html = page.body;
    let mut rendered = false;

    if dom::visible_text_len(&html, url) < config.min_static_text_len {
        debug!(url = %url, "static sample too thin, escalating to rendered fetch");
        html = renderer.render(url, config.render_timeout).await?;
        rendered = true;
    }

    train_on_document(url, &html, rendered, schema, renderer, generator, store, config).await
}

/// Train against an already retrieved document.
///
/// Used by the extraction engine's auto-train path so the page fetched
/// for extraction is not fetched a second time for training. The
/// renderer is still consulted when a required field fails to resolve
/// against a document that was not rendered.
#[allow(clippy::too_many_arguments)]
pub async fn train_on_document<R, G, S>(
    url: &str,
    html: &str,
    already_rendered: bool,
    schema: &FieldSchema,
    renderer: &RenderPool<R>,
    generator: &G,
    store: &S,
    config: &TrainerConfig,
) -> Result<TrainedTemplate>
where
    R: Renderer,
    G: SelectorGenerator,
    S: TemplateRepository,
{
    if schema.is_empty() {
        return Err(ScrapeError::validation("field schema is empty"));
    }
    let domain = normalize_domain(url)?;

    let mapping = propose(generator, url, &domain, html, schema, config).await?;
    let mut validated = validate_candidates(html, url, schema, &mapping);

    // A missed field may just mean a bad proposal; one refinement call
    // with the rejected candidates is cheaper than a rendered fetch
    if !validated.unresolved.is_empty() {
        let feedback = feedback_for(&validated, &mapping);
        let summary = build_summary(url, &domain, html, config);
        match generator.refine(&summary, schema, &feedback).await {
            Ok(refined) if !refined.is_empty() => {
                let merged = merge_candidates(&mapping, &refined, schema);
                validated = validate_candidates(html, url, schema, &merged);
            }
            Ok(_) => debug!(url = %url, "refinement mapped no fields"),
            Err(err) => warn!(url = %url, error = %err, "selector refinement failed"),
        }
    }

    // Escalate once when a required field is still unresolved: the page
    // may only carry that content after its scripts have run
    if !already_rendered && needs_render(&validated, config) {
        debug!(url = %url, "required field unresolved statically, retrying against rendered DOM");
        let rendered_html = renderer.render(url, config.render_timeout).await?;
        let mapping = propose(generator, url, &domain, &rendered_html, schema, config).await?;
        validated = validate_candidates(&rendered_html, url, schema, &mapping);
    }

    if validated.selectors.is_empty() {
        return Err(ScrapeError::validation(format!(
            "no selectors resolved for domain {domain}"
        )));
    }

    let template =
        Template::new(&domain, validated.selectors).with_confidence(validated.confidence);
    info!(
        domain = %domain,
        template_id = %template.id,
        confidence = template.confidence_score,
        resolved = template.selectors.len(),
        unresolved = validated.unresolved.len(),
        "trained template"
    );

    let outcome = store.upsert(template.clone()).await?;
    Ok(TrainedTemplate {
        template,
        unresolved: validated.unresolved,
        outcome,
    })
}

/// Summarize the page and call the generation service under the
/// configured retry budget. An empty mapping counts as a failure.
async fn propose<G: SelectorGenerator>(
    generator: &G,
    url: &str,
    domain: &str,
    html: &str,
    schema: &FieldSchema,
    config: &TrainerConfig,
) -> Result<CandidateMapping> {
    let summary = build_summary(url, domain, html, config);

    let attempts = config.generation_retries + 1;
    let mut last_err = ScrapeError::SelectorGeneration("no attempts made".to_string());

    for attempt in 1..=attempts {
        match generator.generate(&summary, schema).await {
            Ok(mapping) if !mapping.is_empty() => return Ok(mapping),
            Ok(_) => {
                warn!(url = %url, attempt, "generation service mapped no fields");
                last_err =
                    ScrapeError::SelectorGeneration("service mapped no fields".to_string());
            }
            Err(err) => {
                warn!(url = %url, attempt, error = %err, "selector generation failed");
                last_err = err;
            }
        }
    }

    Err(last_err)
}

fn build_summary(url: &str, domain: &str, html: &str, config: &TrainerConfig) -> StructureSummary {
    StructureSummary::new(url, domain, dom::clean_for_summary(html, config.max_summary_len))
}

fn feedback_for(validated: &Validated, mapping: &CandidateMapping) -> GenerationFeedback {
    let mut rejected = IndexMap::new();
    for field in &validated.unresolved {
        let tried = mapping.candidates_for(field).to_vec();
        if !tried.is_empty() {
            rejected.insert(field.clone(), tried);
        }
    }
    GenerationFeedback {
        unresolved: validated.unresolved.clone(),
        rejected,
    }
}

/// Append refinement candidates after the originals, so fields that
/// already resolved keep their chosen selector.
fn merge_candidates(
    base: &CandidateMapping,
    extra: &CandidateMapping,
    schema: &FieldSchema,
) -> CandidateMapping {
    let mut merged = CandidateMapping::new();
    for field in schema.field_names() {
        let candidates = base
            .candidates_for(field)
            .iter()
            .chain(extra.candidates_for(field))
            .map(String::as_str);
        merged = merged.with_alternatives(field, candidates);
    }
    merged
}

/// Whether validation results justify a rendered fetch: nothing
/// resolved at all, or a required field is among the unresolved.
fn needs_render(validated: &Validated, config: &TrainerConfig) -> bool {
    validated.selectors.is_empty()
        || validated
            .unresolved
            .iter()
            .any(|field| config.required_fields.contains(field))
}

struct Validated {
    selectors: IndexMap<String, String>,
    unresolved: Vec<String>,
    confidence: f64,
}

/// Check every candidate against the live DOM: for each field, the
/// first candidate that parses, matches at least one node, and yields
/// actual content wins. Confidence is the mean per-field score over the
/// whole schema, unresolved fields scoring zero.
fn validate_candidates(
    html: &str,
    base_url: &str,
    schema: &FieldSchema,
    mapping: &CandidateMapping,
) -> Validated {
    let dom = Dom::parse(html, base_url);

    let mut selectors = IndexMap::new();
    let mut unresolved = Vec::new();
    let mut score_sum = 0.0;

    for (field, field_type) in schema.iter() {
        let chosen = mapping
            .candidates_for(field)
            .iter()
            .find(|candidate| yields_content(&dom, candidate, field_type));

        match chosen {
            Some(selector) => {
                score_sum += field_score(&dom, selector, field_type);
                selectors.insert(field.to_string(), selector.clone());
            }
            None => {
                debug!(field = %field, "no candidate selector resolved");
                unresolved.push(field.to_string());
            }
        }
    }

    let confidence = if schema.is_empty() {
        0.0
    } else {
        score_sum / schema.len() as f64
    };

    Validated {
        selectors,
        unresolved,
        confidence,
    }
}

/// Whether a selector produces usable content for a field of this type.
fn yields_content(dom: &Dom, selector: &str, field_type: FieldType) -> bool {
    match dom.match_count(selector) {
        None | Some(0) => false,
        Some(_) => match field_type {
            // Rich content keeps every match; any fragment will do
            FieldType::Html => !dom.collect_fragments(selector).is_empty(),
            _ => dom.first_text(selector).is_some(),
        },
    }
}

/// Score one resolved selector.
///
/// A unique match is fully trusted. Rich-content fields are expected to
/// match many nodes, so multiplicity does not penalize them. A singular
/// field matching several nodes is ambiguous: a class/id/attribute
/// qualified selector keeps most of its credit, a bare tag only half.
fn field_score(dom: &Dom, selector: &str, field_type: FieldType) -> f64 {
    match dom.match_count(selector) {
        None | Some(0) => 0.0,
        Some(1) => 1.0,
        Some(_) if field_type == FieldType::Html => 1.0,
        Some(_) => {
            if dom::is_specific_selector(selector) {
                0.75
            } else {
                0.5
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryTemplateStore;
    use crate::testing::{MockFetcher, MockRenderer, MockSelectorGenerator};
    use crate::types::template::TemplateStatus;

    const SAMPLE: &str = r#"
        <html><head><title>Sample</title></head><body>
        <h1 class="headline">A Long Headline For The Sample Article</h1>
        <div class="byline">Jane Doe</div>
        <div class="body">
            <p>The first paragraph carries enough visible text to keep the
            static fetch from escalating to a rendered one during training,
            which calls for a healthy amount of prose in each paragraph.</p>
            <p>A second paragraph with an inline
            <img src="/img/chart.png" alt="Chart"> image in the middle of
            the sentence, so fragment ordering is exercised here as well.</p>
            <p>And a closing third paragraph to round out the body copy of
            this synthetic article used by the training tests, pushing the
            visible character total comfortably past the threshold.</p>
        </div>
        </body></html>
    "#;

    // A hydrated shell: headline present statically, body container
    // empty until page scripts run
    const HYDRATED_SHELL: &str = r#"
        <html><body>
        <h1 class="headline">A Long Headline For The Sample Article</h1>
        <div class="filler">
            <p>This shell page ships its headline in static markup but fills
            the body container from a script after load, the way single page
            applications tend to hydrate their article content.</p>
            <p>The filler prose here keeps the static document's visible text
            above the escalation threshold, so only the missing body content
            can justify a rendered fetch, not the page length.</p>
        </div>
        <div class="body"></div>
        </body></html>
    "#;

    const URL: &str = "https://www.Example.com/articles/sample";

    fn good_mapping() -> CandidateMapping {
        CandidateMapping::new()
            .with_selector("title", "h1.headline")
            .with_selector("author", ".byline")
            .with_selector("content", ".body p")
    }

    fn schema() -> FieldSchema {
        FieldSchema::new()
            .field("title", FieldType::Text)
            .field("author", FieldType::Text)
            .field("content", FieldType::Html)
    }

    #[tokio::test]
    async fn test_training_installs_validated_template() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(MockRenderer::new(), 1);
        let generator = MockSelectorGenerator::new().with_mapping(good_mapping());
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &schema(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        assert!(trained.outcome.is_installed());
        assert!(trained.unresolved.is_empty());
        assert_eq!(trained.template.domain, "example.com");
        assert_eq!(trained.template.selector("title"), Some("h1.headline"));
        assert_eq!(trained.template.selector("content"), Some(".body p"));
        // Every field resolved unambiguously
        assert!((trained.template.confidence_score - 1.0).abs() < 1e-9);

        let active = store.get_active("example.com").await.unwrap().unwrap();
        assert_eq!(active.id, trained.template.id);
        assert_eq!(active.status, TemplateStatus::Active);
    }

    #[tokio::test]
    async fn test_invalid_candidates_fall_through_to_alternatives() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(MockRenderer::new(), 1);
        let mapping = CandidateMapping::new()
            .with_alternatives("title", ["h1[", ".missing-title", "h1.headline"])
            .with_selector("content", ".body p");
        let generator = MockSelectorGenerator::new().with_mapping(mapping);
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &FieldSchema::default_auto(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(trained.template.selector("title"), Some("h1.headline"));
    }

    #[tokio::test]
    async fn test_partial_resolution_reports_unresolved() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let mock_renderer = MockRenderer::new();
        let renderer = RenderPool::new(mock_renderer.clone(), 1);
        let mapping = CandidateMapping::new()
            .with_selector("title", "h1.headline")
            .with_selector("author", ".no-such-byline")
            .with_selector("content", ".body p");
        let generator = MockSelectorGenerator::new().with_mapping(mapping);
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &schema(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(trained.unresolved, vec!["author".to_string()]);
        assert!(trained.template.selector("author").is_none());
        // Two of three fields resolved cleanly
        assert!((trained.template.confidence_score - 2.0 / 3.0).abs() < 1e-9);
        // An optional field alone never justifies a rendered fetch
        assert_eq!(mock_renderer.render_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_resolution_is_validation_error() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(MockRenderer::new().with_page(URL, SAMPLE), 1);
        let mapping = CandidateMapping::new()
            .with_selector("title", ".nope")
            .with_selector("content", ".also-nope");
        let generator = MockSelectorGenerator::new().with_mapping(mapping);
        let store = MemoryTemplateStore::new();

        let err = train_template(
            URL,
            &FieldSchema::default_auto(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::Validation { .. }));
        assert!(store.get_active("example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generation_failures_retry_within_budget() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(MockRenderer::new(), 1);
        let generator = MockSelectorGenerator::new()
            .fail_times(2)
            .with_mapping(good_mapping());
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &schema(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default().with_generation_retries(2),
        )
        .await
        .unwrap();

        assert!(trained.outcome.is_installed());
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_generation_failure_exhausts_budget() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(MockRenderer::new(), 1);
        let generator = MockSelectorGenerator::new().fail_times(10);
        let store = MemoryTemplateStore::new();

        let err = train_template(
            URL,
            &schema(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default().with_generation_retries(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::SelectorGeneration(_)));
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_thin_static_page_escalates_to_render() {
        let thin = "<html><body><div id=\"app\"></div></body></html>";
        let fetcher = MockFetcher::new().with_page(URL, thin);
        let mock_renderer = MockRenderer::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(mock_renderer.clone(), 1);
        let generator = MockSelectorGenerator::new().with_mapping(good_mapping());
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &schema(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        assert!(trained.outcome.is_installed());
        assert_eq!(mock_renderer.render_count(), 1);
    }

    #[tokio::test]
    async fn test_required_field_missing_statically_escalates_to_render() {
        let fetcher = MockFetcher::new().with_page(URL, HYDRATED_SHELL);
        let mock_renderer = MockRenderer::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(mock_renderer.clone(), 1);
        let mapping = CandidateMapping::new()
            .with_selector("title", "h1.headline")
            .with_selector("content", ".body p");
        let generator = MockSelectorGenerator::new().with_mapping(mapping);
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &FieldSchema::default_auto(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        // The shell is above the length threshold, so only the missing
        // required content field triggered the rendered fetch
        assert_eq!(mock_renderer.render_count(), 1);
        assert!(trained.unresolved.is_empty());
        assert_eq!(trained.template.selector("content"), Some(".body p"));
        assert!((trained.template.confidence_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_refinement_recovers_fields_the_first_proposal_missed() {
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let mock_renderer = MockRenderer::new();
        let renderer = RenderPool::new(mock_renderer.clone(), 1);
        let first = CandidateMapping::new()
            .with_selector("title", "h1.headline")
            .with_selector("content", ".missing-container p");
        let second = CandidateMapping::new().with_selector("content", ".body p");
        let generator = MockSelectorGenerator::new()
            .with_mapping(first)
            .with_mapping(second);
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &FieldSchema::default_auto(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(trained.template.selector("title"), Some("h1.headline"));
        assert_eq!(trained.template.selector("content"), Some(".body p"));
        assert!(trained.unresolved.is_empty());
        assert_eq!(generator.call_count(), 2);
        // The follow-up proposal made rendering unnecessary
        assert_eq!(mock_renderer.render_count(), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_singular_selector_lowers_confidence() {
        // "p" matches three nodes for a singular text field
        let fetcher = MockFetcher::new().with_page(URL, SAMPLE);
        let renderer = RenderPool::new(MockRenderer::new(), 1);
        let mapping = CandidateMapping::new()
            .with_selector("title", "p")
            .with_selector("content", ".body p");
        let generator = MockSelectorGenerator::new().with_mapping(mapping);
        let store = MemoryTemplateStore::new();

        let trained = train_template(
            URL,
            &FieldSchema::default_auto(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap();

        // (0.5 for the bare-tag ambiguous title + 1.0 for content) / 2
        assert!((trained.template.confidence_score - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_schema_rejected() {
        let fetcher = MockFetcher::new();
        let renderer = RenderPool::new(MockRenderer::new(), 1);
        let generator = MockSelectorGenerator::new();
        let store = MemoryTemplateStore::new();

        let err = train_template(
            URL,
            &FieldSchema::new(),
            &fetcher,
            &renderer,
            &generator,
            &store,
            &TrainerConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::Validation { .. }));
        assert!(fetcher.fetched_urls().is_empty());
    }
}
