//! End-to-end tests of the train-once, extract-many lifecycle against
//! mocked network and AI capabilities.

use std::time::Duration;

use sitemold::testing::{MockFetcher, MockRenderer, MockSelectorGenerator};
use sitemold::{
    BatchConfig, CandidateMapping, Engine, ErrorKind, FieldSchema, FieldType,
    MemoryTemplateStore, OutputFormat, StorePolicy, TemplateRepository, TemplateStatus,
    TemplateUsed,
};

const ARTICLE_ONE: &str = r#"
    <html><head><title>Site News</title></head><body>
    <h1>Template Learning Ships</h1>
    <div class="byline">Jane Doe</div>
    <div class="body">
        <p>The opening paragraph of the first article carries a healthy
        amount of prose so the static fetch comfortably clears the
        escalation threshold and no rendering is involved in these tests.</p>
        <p>A middle paragraph with an inline
        <img src="/media/diagram.png" alt="Diagram"> figure placed between
        two runs of text to exercise fragment ordering end to end.</p>
        <p>The closing paragraph rounds out the body of the first article
        with a few more sentences of plain filler text for good measure.</p>
    </div>
    </body></html>
"#;

const ARTICLE_TWO: &str = r#"
    <html><head><title>Site News</title></head><body>
    <h1>Second Article, Same Layout</h1>
    <div class="byline">John Roe</div>
    <div class="body">
        <p>The second article shares the first one's markup exactly, which
        is the whole premise: the template learned from one sample page
        extracts every other page on the domain without further AI calls.</p>
        <p>More prose here to keep this page comfortably above the visible
        text threshold that would otherwise trigger a rendered fetch.</p>
        <p>And one final paragraph so the page looks like a real article
        rather than a stub, with enough characters to matter.</p>
    </div>
    </body></html>
"#;

const REDESIGNED: &str = r#"
    <html><head><title>Site News</title></head><body>
    <h2 class="title-new">After The Redesign</h2>
    <div class="post-content">
        <p>The redesign renamed the headline element and the body container,
        so selectors learned against the old layout stop resolving while the
        page itself still carries plenty of visible text to avoid rendering.</p>
        <p>A second paragraph of the redesigned layout, present so that the
        freshly retrained template has several content nodes to collect.</p>
        <p>A third paragraph keeps the redesigned page above the escalation
        threshold just like the pages of the original layout did.</p>
    </div>
    </body></html>
"#;

fn old_mapping() -> CandidateMapping {
    CandidateMapping::new()
        .with_selector("title", "h1")
        .with_selector("author", ".byline")
        .with_selector("content", ".body p")
}

fn new_mapping() -> CandidateMapping {
    CandidateMapping::new()
        .with_selector("title", "h2.title-new")
        .with_selector("content", ".post-content p")
}

fn schema() -> FieldSchema {
    FieldSchema::new()
        .field("title", FieldType::Text)
        .field("author", FieldType::Text)
        .field("content", FieldType::Html)
}

fn engine_for(
    fetcher: MockFetcher,
    generator: MockSelectorGenerator,
    store: MemoryTemplateStore,
) -> Engine<MockFetcher, MockRenderer, MockSelectorGenerator, MemoryTemplateStore> {
    Engine::new(fetcher, MockRenderer::new(), generator, store)
}

#[tokio::test]
async fn test_train_once_extract_many() {
    let fetcher = MockFetcher::new()
        .with_page("https://news.example.com/a/1", ARTICLE_ONE)
        .with_page("https://news.example.com/a/2", ARTICLE_TWO);
    let generator = MockSelectorGenerator::new().with_mapping(old_mapping());
    let engine = engine_for(fetcher, generator.clone(), MemoryTemplateStore::new());

    let trained = engine
        .train_template("https://news.example.com/a/1", &schema())
        .await
        .unwrap();

    // A unique title selector and a multi-node content selector both
    // count as fully resolved
    assert!((trained.template.confidence_score - 1.0).abs() < 1e-9);
    assert_eq!(trained.template.domain, "news.example.com");

    let result = engine
        .scrape_url("https://news.example.com/a/2", OutputFormat::Plaintext)
        .await;

    assert!(result.success);
    assert_eq!(result.template_used, TemplateUsed::Template(trained.template.id));
    assert_eq!(
        result.field_values.get("title").map(String::as_str),
        Some("Second Article, Same Layout")
    );
    assert_eq!(
        result.field_values.get("author").map(String::as_str),
        Some("John Roe")
    );

    // The AI service was consulted exactly once, during training
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_markdown_output_preserves_inline_image_position() {
    let url = "https://news.example.com/a/1";
    let fetcher = MockFetcher::new().with_page(url, ARTICLE_ONE);
    let generator = MockSelectorGenerator::new().with_mapping(old_mapping());
    let engine = engine_for(fetcher, generator, MemoryTemplateStore::new());

    engine.train_template(url, &schema()).await.unwrap();
    let result = engine.scrape_url(url, OutputFormat::Markdown).await;

    let content = result.field_values.get("content").unwrap();
    let image = "![Diagram](https://news.example.com/media/diagram.png)";
    assert!(content.contains(image));

    let before = content.find("A middle paragraph").unwrap();
    let image_at = content.find(image).unwrap();
    let after = content.find("figure placed between").unwrap();
    assert!(before < image_at && image_at < after);

    // Plaintext drops the image entirely
    let plain = engine.scrape_url(url, OutputFormat::Plaintext).await;
    assert!(!plain.field_values.get("content").unwrap().contains("diagram.png"));
}

#[tokio::test]
async fn test_redesign_degrades_then_retrains() {
    let fetcher = MockFetcher::new()
        .with_page("https://news.example.com/a/1", ARTICLE_ONE)
        .with_page("https://news.example.com/a/7", REDESIGNED)
        .with_page("https://news.example.com/a/8", REDESIGNED)
        .with_page("https://news.example.com/a/9", REDESIGNED);
    let generator = MockSelectorGenerator::new()
        .with_mapping(old_mapping())
        .with_mapping(new_mapping());
    let store = MemoryTemplateStore::with_policy(
        StorePolicy::new()
            .with_stale_min_usage(2)
            .with_stale_success_threshold(0.5),
    );
    let engine = engine_for(fetcher, generator, store);

    let trained = engine
        .train_template("https://news.example.com/a/1", &schema())
        .await
        .unwrap();
    let old_id = trained.template.id;

    // Two failed extractions against the redesigned pages push the
    // template below the staleness floor
    for path in ["a/7", "a/8"] {
        let result = engine
            .scrape_url(&format!("https://news.example.com/{path}"), OutputFormat::Plaintext)
            .await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::SelectorResolution));
    }

    let old = engine.store().get_by_id(old_id).await.unwrap().unwrap();
    assert_eq!(old.status, TemplateStatus::Stale);
    assert_eq!(old.usage_count, 2);

    // With no active template left, the next scrape retrains against
    // the new layout and succeeds
    let result = engine
        .scrape_url("https://news.example.com/a/9", OutputFormat::Plaintext)
        .await;
    assert!(result.success);
    let TemplateUsed::Template(new_id) = result.template_used else {
        panic!("expected a stored template");
    };
    assert_ne!(new_id, old_id);
    assert_eq!(
        result.field_values.get("title").map(String::as_str),
        Some("After The Redesign")
    );

    let active = engine
        .store()
        .get_active("news.example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, new_id);
}

#[tokio::test]
async fn test_single_active_template_survives_competing_trainings() {
    let fetcher = MockFetcher::new().with_page("https://news.example.com/a/1", ARTICLE_ONE);
    let generator = MockSelectorGenerator::new().with_mapping(old_mapping());
    let engine = engine_for(fetcher, generator, MemoryTemplateStore::new());

    for _ in 0..4 {
        engine
            .train_template("https://news.example.com/a/1", &schema())
            .await
            .unwrap();
    }

    let templates = engine
        .store()
        .list_for_domain("news.example.com")
        .await
        .unwrap();
    let active = templates
        .iter()
        .filter(|t| t.status == TemplateStatus::Active)
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn test_batch_returns_one_result_per_url_in_order() {
    let urls: Vec<String> = vec![
        "https://news.example.com/a/1".to_string(),
        "https://news.example.com/missing".to_string(),
        "https://news.example.com/a/2".to_string(),
        "not a url at all".to_string(),
        "https://news.example.com/slow".to_string(),
    ];
    let fetcher = MockFetcher::new()
        .with_page(&urls[0], ARTICLE_ONE)
        .with_error(&urls[1], "404 not found")
        .with_page(&urls[2], ARTICLE_TWO)
        .with_slow_page(&urls[4], ARTICLE_ONE, Duration::from_secs(30));
    let generator = MockSelectorGenerator::new().with_mapping(old_mapping());
    let engine = engine_for(fetcher, generator, MemoryTemplateStore::new());

    engine
        .train_template(&urls[0], &schema())
        .await
        .unwrap();

    let config = BatchConfig::new()
        .with_max_concurrent(2)
        .with_per_task_timeout(Duration::from_millis(200));
    let results = engine
        .scrape_batch(&urls, OutputFormat::Plaintext, &config)
        .await;

    assert_eq!(results.len(), urls.len());
    for (result, url) in results.iter().zip(&urls) {
        assert_eq!(&result.url, url);
    }

    assert!(results[0].success);
    assert_eq!(results[1].error, Some(ErrorKind::Fetch));
    assert!(results[2].success);
    assert_eq!(results[3].error, Some(ErrorKind::Validation));
    assert_eq!(results[4].error, Some(ErrorKind::Timeout));
}

#[tokio::test]
async fn test_scraping_is_idempotent_per_page() {
    let url = "https://news.example.com/a/1";
    let fetcher = MockFetcher::new().with_page(url, ARTICLE_ONE);
    let generator = MockSelectorGenerator::new().with_mapping(old_mapping());
    let engine = engine_for(fetcher, generator, MemoryTemplateStore::new());

    engine.train_template(url, &schema()).await.unwrap();

    let first = engine.scrape_url(url, OutputFormat::Html).await;
    let second = engine.scrape_url(url, OutputFormat::Html).await;

    assert_eq!(first.field_values, second.field_values);
    assert_eq!(first.success, second.success);
    assert_eq!(first.template_used, second.template_used);
}

#[tokio::test]
async fn test_extraction_result_serializes_cleanly() {
    let url = "https://news.example.com/a/1";
    let fetcher = MockFetcher::new().with_page(url, ARTICLE_ONE);
    let generator = MockSelectorGenerator::new().with_mapping(old_mapping());
    let engine = engine_for(fetcher, generator, MemoryTemplateStore::new());

    engine.train_template(url, &schema()).await.unwrap();
    let result = engine.scrape_url(url, OutputFormat::Html).await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["domain"], "news.example.com");
    assert_eq!(json["success"], true);
    assert!(json["field_values"]["content"].as_str().unwrap().contains("<img"));
    // Successful results omit the error field entirely
    assert!(json.get("error").is_none());
}
