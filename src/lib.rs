//! Template-Learning Web Content Extraction
//!
//! Learn a site's layout once, extract from it forever: one sample page
//! and an AI call produce a field-to-CSS-selector template for the
//! domain, and every later page on that site is extracted with plain
//! selector application, no AI on the hot path.
//!
//! # Design Philosophy
//!
//! **"Trust the DOM, not the model"**
//!
//! - The AI only proposes selectors; every proposal is validated
//!   against the live page before anything is stored
//! - Confidence is computed here from what actually matched, never
//!   taken from the model's self-assessment
//! - Extraction calls never raise: failures are folded into a result
//!   with a structured error category
//! - Static fetch first, JavaScript rendering only when the page is
//!   demonstrably thin
//!
//! # Usage
//!
//! ```rust,ignore
//! use sitemold::{Engine, FieldSchema, FieldType, OutputFormat};
//! use sitemold::{FirecrawlRenderer, HttpFetcher, MemoryTemplateStore, OpenAiGenerator};
//!
//! let engine = Engine::new(
//!     HttpFetcher::new(),
//!     FirecrawlRenderer::from_env()?,
//!     OpenAiGenerator::from_env()?,
//!     MemoryTemplateStore::new(),
//! );
//!
//! // Learn the site's layout from one sample page
//! let schema = FieldSchema::new()
//!     .field("title", FieldType::Text)
//!     .field("author", FieldType::Text)
//!     .field("content", FieldType::Html);
//! engine.train_template("https://news.example.com/articles/1", &schema).await?;
//!
//! // Every further page on the domain reuses the stored template
//! let result = engine
//!     .scrape_url("https://news.example.com/articles/2", OutputFormat::Markdown)
//!     .await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Capability traits (Fetcher, Renderer, SelectorGenerator, TemplateRepository)
//! - [`types`] - Templates, schemas, results, and configuration
//! - [`engine`] - The extraction facade
//! - [`trainer`] - Template training and candidate validation
//! - [`batch`] - Bounded-concurrency batch extraction
//! - [`dom`] - Selector application and fragment collection
//! - [`normalize`] - Fragment-to-output-format rendering
//! - [`stores`] - Template repository implementations
//! - [`fetchers`] - Production fetch and render implementations
//! - [`ai`] - AI selector-generation implementations
//! - [`testing`] - Deterministic mocks for the capability traits

pub mod ai;
pub mod batch;
pub mod dom;
pub mod engine;
pub mod error;
pub mod fetchers;
pub mod normalize;
pub mod stores;
pub mod testing;
pub mod trainer;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use ai::OpenAiGenerator;
pub use engine::{Engine, PagePreview};
pub use error::{ErrorKind, Result, ScrapeError};
pub use fetchers::{FirecrawlRenderer, HttpFetcher};
pub use stores::MemoryTemplateStore;
pub use trainer::TrainedTemplate;
pub use traits::{
    fetcher::{FetchedPage, Fetcher},
    generator::{CandidateMapping, GenerationFeedback, SelectorGenerator, StructureSummary},
    renderer::{RenderPool, Renderer},
    store::{TemplateRepository, UpsertOutcome},
};
pub use types::{
    config::{BatchConfig, EngineConfig, ReplacePolicy, StorePolicy, TrainerConfig},
    fragment::Fragment,
    result::{ExtractionResult, OutputFormat, TemplateUsed},
    schema::{FieldSchema, FieldType, CONTENT_FIELD},
    template::{normalize_domain, Template, TemplateStatus},
};
