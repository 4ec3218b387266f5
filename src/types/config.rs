//! Configuration types for training, extraction, batching, and storage.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the extraction engine.
///
/// The static-to-rendered escalation threshold is site-dependent and
/// deliberately exposed here rather than hardcoded.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for plain network fetches
    pub fetch_timeout: Duration,

    /// Timeout for JavaScript-rendered fetches
    pub render_timeout: Duration,

    /// Escalate to a rendered fetch when the static page's visible text
    /// is shorter than this many characters
    pub min_static_text_len: usize,

    /// Fields that must resolve non-empty for `success = true`
    pub required_fields: Vec<String>,

    /// Concurrent render slots (minimum 1)
    pub render_slots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
            min_static_text_len: 256,
            required_fields: vec!["title".to_string(), "content".to_string()],
            render_slots: 2,
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the static fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the rendered fetch timeout.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Set the escalation threshold on visible text length.
    pub fn with_min_static_text_len(mut self, len: usize) -> Self {
        self.min_static_text_len = len;
        self
    }

    /// Set the number of concurrent render slots.
    pub fn with_render_slots(mut self, slots: usize) -> Self {
        self.render_slots = slots.max(1);
        self
    }

    /// Override which fields are required for success.
    pub fn with_required_fields(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.required_fields = fields.into_iter().map(|f| f.into()).collect();
        self
    }
}

/// Configuration for template training.
///
/// Training is off the hot extraction path, so the AI timeout may be
/// generous.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Retry budget for the selector-generation service
    pub generation_retries: usize,

    /// Maximum length of the page structure summary sent to the AI service
    pub max_summary_len: usize,

    /// Escalate the sample fetch to a rendered fetch below this visible
    /// text length
    pub min_static_text_len: usize,

    /// Fields whose failure to resolve statically justifies a rendered
    /// re-fetch of the sample page
    pub required_fields: Vec<String>,

    /// Timeout for the sample page fetch
    pub fetch_timeout: Duration,

    /// Timeout for the escalated rendered fetch
    pub render_timeout: Duration,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            generation_retries: 2,
            max_summary_len: 12_000,
            min_static_text_len: 256,
            required_fields: vec!["title".to_string(), "content".to_string()],
            fetch_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
        }
    }
}

impl TrainerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the AI retry budget.
    pub fn with_generation_retries(mut self, retries: usize) -> Self {
        self.generation_retries = retries;
        self
    }

    /// Set the structure summary length cap.
    pub fn with_max_summary_len(mut self, len: usize) -> Self {
        self.max_summary_len = len;
        self
    }

    /// Set the escalation threshold on visible text length.
    pub fn with_min_static_text_len(mut self, len: usize) -> Self {
        self.min_static_text_len = len;
        self
    }

    /// Override which fields justify render escalation when unresolved.
    pub fn with_required_fields(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.required_fields = fields.into_iter().map(|f| f.into()).collect();
        self
    }
}

/// Configuration for batch extraction.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum in-flight extractions (minimum 1)
    pub max_concurrent: usize,

    /// Per-URL deadline; exceeding it cancels only that URL's task
    pub per_task_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            per_task_timeout: Duration::from_secs(90),
        }
    }
}

impl BatchConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Set the per-URL timeout.
    pub fn with_per_task_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout = timeout;
        self
    }
}

/// Conflict policy when a new template is upserted for a domain that
/// already has an active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Replace when the new confidence is greater than or equal to the
    /// stored one (default)
    #[default]
    GreaterOrEqual,
    /// Replace only on strictly greater confidence
    Greater,
}

impl ReplacePolicy {
    /// Whether a candidate with `new` confidence displaces `current`.
    pub fn replaces(self, new: f64, current: f64) -> bool {
        match self {
            Self::GreaterOrEqual => new >= current,
            Self::Greater => new > current,
        }
    }
}

/// Lifecycle policy for a template store.
#[derive(Debug, Clone)]
pub struct StorePolicy {
    /// Active-template replacement rule
    pub replace: ReplacePolicy,

    /// Minimum usage count before a template can go stale
    pub stale_min_usage: u64,

    /// Success-rate floor; an active template at or below the minimum
    /// usage never goes stale, below the floor afterwards it does
    pub stale_success_threshold: f64,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            replace: ReplacePolicy::default(),
            stale_min_usage: 10,
            stale_success_threshold: 0.5,
        }
    }
}

impl StorePolicy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the replacement rule.
    pub fn with_replace(mut self, replace: ReplacePolicy) -> Self {
        self.replace = replace;
        self
    }

    /// Set the minimum usage before staleness applies.
    pub fn with_stale_min_usage(mut self, min: u64) -> Self {
        self.stale_min_usage = min;
        self
    }

    /// Set the success-rate floor.
    pub fn with_stale_success_threshold(mut self, threshold: f64) -> Self {
        self.stale_success_threshold = threshold;
        self
    }

    /// Whether a template with these stats should be demoted to stale.
    pub fn is_stale(&self, usage_count: u64, success_rate: f64) -> bool {
        usage_count >= self.stale_min_usage && success_rate < self.stale_success_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_policy() {
        assert!(ReplacePolicy::GreaterOrEqual.replaces(0.8, 0.8));
        assert!(!ReplacePolicy::Greater.replaces(0.8, 0.8));
        assert!(ReplacePolicy::Greater.replaces(0.9, 0.8));
        assert!(!ReplacePolicy::GreaterOrEqual.replaces(0.7, 0.8));
    }

    #[test]
    fn test_stale_policy_requires_min_usage() {
        let policy = StorePolicy::new()
            .with_stale_min_usage(5)
            .with_stale_success_threshold(0.5);

        assert!(!policy.is_stale(4, 0.0));
        assert!(policy.is_stale(5, 0.4));
        assert!(!policy.is_stale(100, 0.5));
    }

    #[test]
    fn test_batch_config_floors_concurrency() {
        let config = BatchConfig::new().with_max_concurrent(0);
        assert_eq!(config.max_concurrent, 1);
    }
}
