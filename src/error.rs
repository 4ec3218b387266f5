//! Typed errors for the scraping library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during training and extraction operations.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network retrieval failed (connection, HTTP status, blocked)
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// JavaScript-rendered fetch failed (render timeout, browser crash)
    #[error("render failed for {url}: {reason}")]
    Render { url: String, reason: String },

    /// Fetch or render exceeded its deadline
    #[error("timeout for {url}")]
    Timeout { url: String },

    /// AI selector-generation service failed or returned a malformed payload
    #[error("selector generation failed: {0}")]
    SelectorGeneration(String),

    /// A selector matched zero nodes at use time
    #[error("selector {selector:?} for field {field:?} matched no nodes")]
    SelectorResolution { field: String, selector: String },

    /// Missing template/schema, or zero fields resolved during training
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Render pool exhausted or shut down
    #[error("render capacity unavailable: {reason}")]
    Capacity { reason: String },

    /// URL could not be parsed or has no host
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Template repository operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ScrapeError {
    /// Build a fetch error from a URL and any displayable cause.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a render error from a URL and any displayable cause.
    pub fn render(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Render {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Serializable error category carried on an [`ExtractionResult`].
///
/// Extraction calls never raise transport errors to the caller; the failure
/// category is folded into the result instead.
///
/// [`ExtractionResult`]: crate::types::result::ExtractionResult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Render,
    Timeout,
    SelectorGeneration,
    SelectorResolution,
    Validation,
    Capacity,
}

impl From<&ScrapeError> for ErrorKind {
    fn from(err: &ScrapeError) -> Self {
        match err {
            ScrapeError::Fetch { .. } => ErrorKind::Fetch,
            ScrapeError::Render { .. } => ErrorKind::Render,
            ScrapeError::Timeout { .. } => ErrorKind::Timeout,
            ScrapeError::SelectorGeneration(_) => ErrorKind::SelectorGeneration,
            ScrapeError::SelectorResolution { .. } => ErrorKind::SelectorResolution,
            ScrapeError::Validation { .. } => ErrorKind::Validation,
            ScrapeError::Capacity { .. } => ErrorKind::Capacity,
            ScrapeError::InvalidUrl { .. } => ErrorKind::Validation,
            ScrapeError::Storage(_) => ErrorKind::Validation,
        }
    }
}

/// Result type alias for scraping operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;
