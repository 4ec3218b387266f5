//! Extraction results and output formats.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Requested representation for normalized field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Minimal markup: paragraphs and bare `<img>` tags
    #[default]
    Html,
    /// Paragraphs separated by blank lines, `![alt](url)` images
    Markdown,
    /// Newline-joined text, images dropped
    Plaintext,
}

/// Which mapping an extraction was performed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateUsed {
    /// A stored or freshly trained template, by id
    Template(Uuid),
    /// The built-in heuristic fallback (no template available)
    Auto,
}

impl Serialize for TemplateUsed {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Template(id) => serializer.serialize_str(&id.to_string()),
            Self::Auto => serializer.serialize_str("auto"),
        }
    }
}

impl<'de> Deserialize<'de> for TemplateUsed {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "auto" {
            Ok(Self::Auto)
        } else {
            Uuid::parse_str(&s)
                .map(Self::Template)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// The outcome of extracting one URL.
///
/// Always returned with an explicit `success` flag; failures carry one
/// structured [`ErrorKind`], never a raw transport error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// The URL that was scraped
    pub url: String,

    /// Normalized domain of the URL
    pub domain: String,

    /// Template the extraction ran with
    pub template_used: TemplateUsed,

    /// When the extraction completed
    pub scraped_at: DateTime<Utc>,

    /// Field name to normalized value, in template order
    pub field_values: IndexMap<String, String>,

    /// True only if every required field resolved to a non-empty value
    pub success: bool,

    /// Failure category when `success` is false and a hard error occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ExtractionResult {
    /// Build a failed result with no extracted fields.
    pub fn failed(url: impl Into<String>, domain: impl Into<String>, error: ErrorKind) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            template_used: TemplateUsed::Auto,
            scraped_at: Utc::now(),
            field_values: IndexMap::new(),
            success: false,
            error: Some(error),
        }
    }
}
