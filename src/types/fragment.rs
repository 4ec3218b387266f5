//! Atomic ordered content units for format-independent assembly.

use serde::{Deserialize, Serialize};

/// One content unit produced while reading a matched container in
/// document order. Order is significant: interleaving of text runs and
/// inline images must survive normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fragment {
    /// A run of text
    Text { value: String },

    /// An inline image; `src` is already resolved to an absolute URL
    Image { src: String, alt: String },
}

impl Fragment {
    /// Create a text fragment.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    /// Create an image fragment.
    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self::Image {
            src: src.into(),
            alt: alt.into(),
        }
    }

    /// Whether this fragment carries no content.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { value } => value.trim().is_empty(),
            Self::Image { src, .. } => src.is_empty(),
        }
    }
}
