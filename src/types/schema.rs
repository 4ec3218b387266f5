//! Field schemas describing the desired extraction shape.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the rich-content field. This is the one field whose value is
/// collected as ordered fragments and normalized to the requested
/// output format; every other field extracts as a single text value.
pub const CONTENT_FIELD: &str = "content";

/// Semantic type of an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Plain text (titles, author names)
    Text,
    /// Numeric value
    Number,
    /// Publication date or timestamp
    Date,
    /// A link target
    Url,
    /// Rich content preserving inline structure (body text with images)
    Html,
}

/// Ordered mapping of field name to semantic type.
///
/// Supplied by the caller when training a template. Field order is
/// preserved and carried through to extraction results.
///
/// # Example
///
/// ```rust,ignore
/// let schema = FieldSchema::new()
///     .field("title", FieldType::Text)
///     .field("author", FieldType::Text)
///     .field("content", FieldType::Html);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(flatten)]
    fields: IndexMap<String, FieldType>,
}

impl FieldSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The generic fallback schema used for auto-training: title and body content.
    pub fn default_auto() -> Self {
        Self::new()
            .field("title", FieldType::Text)
            .field(CONTENT_FIELD, FieldType::Html)
    }

    /// Add a field to the schema.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Get a field's type, if present.
    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    /// Iterate over fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether this schema can produce a usable template.
    ///
    /// A template needs at minimum `title` and `content` fields.
    pub fn is_usable(&self) -> bool {
        self.fields.contains_key("title") && self.fields.contains_key(CONTENT_FIELD)
    }
}
