//! Learned scraping templates and their lifecycle.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, ScrapeError};

/// Lifecycle state of a template.
///
/// ```text
/// draft -> active -> stale -> deleted
/// ```
///
/// `active -> active` happens implicitly when a higher-or-equal-confidence
/// template replaces the current one for a domain (the displaced template
/// moves to `stale`). Any live state may transition directly to `deleted`
/// on manual removal; no other transition skips `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    Draft,
    Active,
    Stale,
    Deleted,
}

impl TemplateStatus {
    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition(self, next: TemplateStatus) -> bool {
        use TemplateStatus::*;
        match (self, next) {
            (Draft, Active) => true,
            (Active, Stale) => true,
            (Stale, Deleted) => true,
            // Manual removal is allowed from any live state
            (Draft, Deleted) | (Active, Deleted) => true,
            _ => false,
        }
    }
}

/// A learned field-to-selector mapping for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Unique template id
    pub id: Uuid,

    /// Normalized domain this template applies to (lowercase, no "www.")
    pub domain: String,

    /// Field name to CSS selector expression, in schema order
    pub selectors: IndexMap<String, String>,

    /// Independently computed confidence, 0.0 to 1.0
    pub confidence_score: f64,

    /// Lifecycle state
    pub status: TemplateStatus,

    /// Number of extractions attempted with this template
    pub usage_count: u64,

    /// Streaming average of reported outcomes, 0.0 to 1.0
    pub success_rate: f64,

    /// When the template was trained
    pub created_at: DateTime<Utc>,
}

impl Template {
    /// Create a new draft template for a domain.
    pub fn new(domain: impl Into<String>, selectors: IndexMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            selectors,
            confidence_score: 0.0,
            status: TemplateStatus::Draft,
            usage_count: 0,
            success_rate: 1.0,
            created_at: Utc::now(),
        }
    }

    /// Set the confidence score.
    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = score.clamp(0.0, 1.0);
        self
    }

    /// Set the lifecycle status.
    pub fn with_status(mut self, status: TemplateStatus) -> Self {
        self.status = status;
        self
    }

    /// Get the selector for a field.
    pub fn selector(&self, field: &str) -> Option<&str> {
        self.selectors.get(field).map(String::as_str)
    }

    /// Fold one extraction outcome into the usage statistics.
    ///
    /// `usage_count` is monotone non-decreasing; `success_rate` is the
    /// incremental average `rate + (outcome - rate) / count`.
    pub fn record_outcome(&mut self, success: bool) {
        self.usage_count += 1;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate += (outcome - self.success_rate) / self.usage_count as f64;
    }
}

/// Normalize a URL's host into a template lookup key.
///
/// Lowercases the host and strips a leading `www.` so that
/// `https://WWW.Example.com/a` and `https://example.com/b` share a template.
pub fn normalize_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| ScrapeError::InvalidUrl {
        url: url.to_string(),
    })?;

    let host = parsed.host_str().ok_or_else(|| ScrapeError::InvalidUrl {
        url: url.to_string(),
    })?;

    let host = host.to_ascii_lowercase();
    Ok(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(
            normalize_domain("https://WWW.Example.com/article/1").unwrap(),
            "example.com"
        );
        assert_eq!(
            normalize_domain("http://news.example.org/x").unwrap(),
            "news.example.org"
        );
        assert!(normalize_domain("not a url").is_err());
    }

    #[test]
    fn test_status_transitions() {
        use TemplateStatus::*;
        assert!(Draft.can_transition(Active));
        assert!(Active.can_transition(Stale));
        assert!(Stale.can_transition(Deleted));
        assert!(Active.can_transition(Deleted));
        assert!(!Draft.can_transition(Stale));
        assert!(!Stale.can_transition(Active));
        assert!(!Deleted.can_transition(Active));
    }

    #[test]
    fn test_record_outcome_incremental_average() {
        let mut t = Template::new("example.com", IndexMap::new());
        t.record_outcome(true);
        assert_eq!(t.usage_count, 1);
        assert!((t.success_rate - 1.0).abs() < 1e-9);

        t.record_outcome(false);
        assert_eq!(t.usage_count, 2);
        assert!((t.success_rate - 0.5).abs() < 1e-9);

        t.record_outcome(true);
        t.record_outcome(true);
        assert_eq!(t.usage_count, 4);
        assert!((t.success_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped() {
        let t = Template::new("example.com", IndexMap::new()).with_confidence(1.7);
        assert!((t.confidence_score - 1.0).abs() < 1e-9);
    }
}
