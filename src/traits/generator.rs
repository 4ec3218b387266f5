//! SelectorGenerator trait for the external AI mapping service.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::schema::FieldSchema;

/// A condensed view of a rendered document, small enough to ship to the
/// AI service. Built by the trainer from the fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSummary {
    /// The page's URL
    pub url: String,

    /// Normalized domain
    pub domain: String,

    /// Cleaned, truncated document markup (scripts/styles/comments
    /// stripped, whitespace collapsed)
    pub outline: String,
}

impl StructureSummary {
    /// Create a structure summary.
    pub fn new(
        url: impl Into<String>,
        domain: impl Into<String>,
        outline: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            outline: outline.into(),
        }
    }
}

/// Candidate selectors proposed by the AI service, per field.
///
/// Each field maps to an ordered list of alternatives; validation picks
/// the first that parses and matches the live DOM. A field the service
/// could not map is simply absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateMapping {
    #[serde(flatten)]
    candidates: IndexMap<String, Vec<String>>,
}

impl CandidateMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single candidate selector for a field.
    pub fn with_selector(mut self, field: impl Into<String>, selector: impl Into<String>) -> Self {
        self.candidates
            .entry(field.into())
            .or_default()
            .push(selector.into());
        self
    }

    /// Add an ordered list of alternatives for a field.
    pub fn with_alternatives(
        mut self,
        field: impl Into<String>,
        selectors: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.candidates
            .entry(field.into())
            .or_default()
            .extend(selectors.into_iter().map(|s| s.into()));
        self
    }

    /// Candidate selectors for a field, in preference order.
    pub fn candidates_for(&self, field: &str) -> &[String] {
        self.candidates.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the service mapped no fields at all.
    pub fn is_empty(&self) -> bool {
        self.candidates.values().all(Vec::is_empty)
    }

    /// Iterate fields that received at least one candidate.
    pub fn mapped_fields(&self) -> impl Iterator<Item = &str> {
        self.candidates
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
    }
}

/// Validation results fed back to the service for a targeted follow-up
/// proposal.
#[derive(Debug, Clone, Default)]
pub struct GenerationFeedback {
    /// Fields no candidate resolved for
    pub unresolved: Vec<String>,

    /// Candidates that were tried and rejected, per field
    pub rejected: IndexMap<String, Vec<String>>,
}

/// External AI selector-generation capability.
///
/// Untrusted and non-deterministic: callers must validate every
/// candidate against the live DOM and recompute confidence themselves.
/// Nothing the service reports about its own confidence is used.
#[async_trait]
pub trait SelectorGenerator: Send + Sync {
    /// Propose selector expressions for each field in the schema.
    async fn generate(
        &self,
        summary: &StructureSummary,
        schema: &FieldSchema,
    ) -> Result<CandidateMapping>;

    /// Propose replacements for fields a previous proposal failed to
    /// resolve, given what was tried and rejected. The default
    /// implementation repeats a plain generation.
    async fn refine(
        &self,
        summary: &StructureSummary,
        schema: &FieldSchema,
        feedback: &GenerationFeedback,
    ) -> Result<CandidateMapping> {
        let _ = feedback;
        self.generate(summary, schema).await
    }

    /// Implementation name, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
